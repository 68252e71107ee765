//! The `broker` module is the server side of the system: the outbound
//! buffers, the subscriber registry and the UDP server that ties them
//! together.

pub mod buffer;
pub mod engine;
pub mod registry;
pub mod subscriber;

pub use buffer::OutboundBuffer;
pub use engine::{BrokerServer, ServerState};
pub use registry::{Registration, Registry};
pub use subscriber::{Subscriber, SubscriberId, SubscriberInfo, subscriber_id};
