//! # udpsub
//!
//! `udpsub` is a lightweight publish/subscribe broker running over UDP.
//! Clients register interest in a topic, the broker buffers published events
//! per subscriber and fans them out, and clients route inbound events to the
//! callbacks registered for each event name. Delivery is best-effort.
//!
//! ## Core Modules
//!
//! - `broker`: outbound buffers, the subscriber registry and the UDP server.
//! - `client`: the subscriber client and its event processors.
//! - `config`: loads server, broker, client and logging settings.
//! - `transport`: the envelope carried in every datagram and its codec.
//! - `utils`: error type, logging setup, delivery ids and stop signals.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::BrokerServer;
pub use client::{EventProcessor, SubscriberClient};
pub use utils::{BrokerError, Result};
