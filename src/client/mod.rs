//! The `client` module is the subscriber side of the system.
//!
//! A [`SubscriberClient`] registers a topic with the broker and routes every
//! inbound event to the [`EventProcessor`]s whose event set names it.

pub mod processor;
pub mod pubsub_client;

pub use processor::{CallbackResult, EventProcessor, ProcessorSet};
pub use pubsub_client::{ClientState, SubscriberClient};

#[cfg(test)]
mod tests;
