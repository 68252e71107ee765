use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::broker::subscriber::{Subscriber, SubscriberId};
use crate::utils::{BrokerError, Result};

/// Outcome of [`Registry::register`].
#[derive(Debug, Clone)]
pub enum Registration {
    Created(Arc<Subscriber>),
    /// The identity was already known; its entry is returned untouched.
    Existing(Arc<Subscriber>),
}

impl Registration {
    pub fn subscriber(&self) -> &Arc<Subscriber> {
        match self {
            Registration::Created(s) | Registration::Existing(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// Maps subscriber identities to their records.
///
/// The lock guards the map only. Buffers carry their own lock, so dispatch
/// loops draining them never touch this one.
#[derive(Debug)]
pub struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, Arc<Subscriber>>>,
    buffer_capacity: usize,
}

impl Registry {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer_capacity,
        }
    }

    /// Registers `identity`, or returns the existing entry if it is already
    /// known. Re-registration never resets the buffer or the topic.
    pub fn register(&self, identity: &str, address: SocketAddr, topic: &str) -> Registration {
        let mut subscribers = self.lock();
        if let Some(existing) = subscribers.get(identity) {
            return Registration::Existing(Arc::clone(existing));
        }

        let subscriber = Arc::new(Subscriber::new(
            identity,
            address,
            topic,
            self.buffer_capacity,
        ));
        subscribers.insert(identity.to_string(), Arc::clone(&subscriber));
        Registration::Created(subscriber)
    }

    pub fn lookup(&self, identity: &str) -> Result<Arc<Subscriber>> {
        self.lock()
            .get(identity)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(identity.to_string()))
    }

    /// Removes `identity` and marks it inactive so its dispatch loop winds down.
    pub fn unregister(&self, identity: &str) -> Result<Arc<Subscriber>> {
        let removed = self
            .lock()
            .remove(identity)
            .ok_or_else(|| BrokerError::NotFound(identity.to_string()))?;
        removed.deactivate();
        Ok(removed)
    }

    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.lock().values().cloned().collect()
    }

    /// Subscribers registered under exactly `topic`.
    pub fn matching(&self, topic: &str) -> Vec<Arc<Subscriber>> {
        self.lock()
            .values()
            .filter(|s| s.topic == topic)
            .cloned()
            .collect()
    }

    /// Runs `f` over a snapshot, so `f` may call back into the registry.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Subscriber>)) {
        for subscriber in self.snapshot() {
            f(&subscriber);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<Subscriber>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
