use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::utils::{BrokerError, Result};

pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Callback = dyn Fn(&str, &str, &Value) -> CallbackResult + Send + Sync;

/// Application callback bound to a set of event names.
///
/// The callback receives `(topic, event_name, payload)` where `payload` is
/// the raw payload of the event envelope.
#[derive(Clone)]
pub struct EventProcessor {
    events: HashSet<String>,
    callback: Arc<Callback>,
}

impl EventProcessor {
    pub fn new<I, S, F>(events: I, callback: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str, &str, &Value) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            events: events.into_iter().map(Into::into).collect(),
            callback: Arc::new(callback),
        }
    }

    pub fn handles(&self, event: &str) -> bool {
        self.events.contains(event)
    }
}

impl fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventProcessor")
            .field("events", &self.events)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorSet {
    processors: Vec<EventProcessor>,
}

impl ProcessorSet {
    pub fn new(processors: Vec<EventProcessor>) -> Self {
        Self { processors }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// True when at least one processor listens for some event.
    pub fn has_events(&self) -> bool {
        self.processors.iter().any(|p| !p.events.is_empty())
    }

    /// Invokes every processor whose event set contains `event`.
    ///
    /// A failing callback is logged and the remaining processors still run.
    /// Returns how many processors were invoked.
    pub fn dispatch(&self, topic: &str, event: &str, payload: &Value) -> Result<usize> {
        if !self.has_events() {
            return Err(BrokerError::EmptyProcessorSet);
        }

        let mut invoked = 0;
        for processor in self.processors.iter().filter(|p| p.handles(event)) {
            invoked += 1;
            if let Err(e) = (processor.callback)(topic, event, payload) {
                error!(topic, event, error = %e, "processor error");
            }
        }
        if invoked == 0 {
            debug!(topic, event, "no processor for event");
        }
        Ok(invoked)
    }
}

impl From<Vec<EventProcessor>> for ProcessorSet {
    fn from(processors: Vec<EventProcessor>) -> Self {
        Self::new(processors)
    }
}
