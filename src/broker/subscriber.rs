use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::broker::buffer::OutboundBuffer;
use crate::transport::Envelope;

pub type SubscriberId = String;

/// Registry key of a client: its `ip:port` as seen by the broker.
pub fn subscriber_id(addr: &SocketAddr) -> SubscriberId {
    addr.to_string()
}

/// Server-side record of one registered client.
///
/// Owned by the [`Registry`](crate::broker::Registry); dispatch loops hold a
/// shared reference. `dispatching` is claimed with a compare-and-swap so the
/// supervisory scan can never spawn two loops for the same subscriber.
#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub address: SocketAddr,
    /// Empty when the client only wants broadcasts.
    pub topic: String,
    pub registered_at: DateTime<Utc>,
    pub buffer: OutboundBuffer<Envelope>,
    dispatching: AtomicBool,
    active: AtomicBool,
}

/// Point-in-time view of a subscriber, logged when its dispatch loop starts.
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub address: SocketAddr,
    pub topic: String,
    pub registered_at: DateTime<Utc>,
    pub buffered: usize,
    pub dispatching: bool,
}

impl Subscriber {
    pub fn new(
        id: impl Into<SubscriberId>,
        address: SocketAddr,
        topic: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            id: id.into(),
            address,
            topic: topic.into(),
            registered_at: Utc::now(),
            buffer: OutboundBuffer::new(capacity),
            dispatching: AtomicBool::new(false),
            active: AtomicBool::new(true),
        }
    }

    /// Returns true if the caller now owns this subscriber's dispatch loop.
    pub fn try_begin_dispatch(&self) -> bool {
        self.dispatching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_dispatch(&self) {
        self.dispatching.store(false, Ordering::Release);
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::Acquire)
    }

    /// False once the subscriber was removed from the registry.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.id.clone(),
            address: self.address,
            topic: self.topic.clone(),
            registered_at: self.registered_at,
            buffered: self.buffer.len(),
            dispatching: self.is_dispatching(),
        }
    }
}
