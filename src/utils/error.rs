//! The `error` module defines the error type used within the `udpsub` broker.
//!
//! Per-datagram faults (`Decode`, `UnknownCommand`, `SendFailure`) are
//! absorbed and logged by the loops that hit them. Everything else is
//! returned to the immediate caller.

use std::io;

/// Result type alias
pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Malformed envelope or payload
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unknown command")]
    UnknownCommand,

    /// Outbound buffer reached its capacity
    #[error("buffer full")]
    BufferFull,

    #[error("buffer empty")]
    BufferEmpty,

    #[error("buffer is not initialized")]
    Uninitialized,

    #[error("subscriber not found: {0}")]
    NotFound(String),

    #[error("send failure: {0}")]
    SendFailure(#[source] io::Error),

    /// The client could not deliver its registration to the broker
    #[error("registration failure: {0}")]
    RegistrationFailure(#[source] io::Error),

    #[error("no subscriber found for topic '{0}'")]
    NoSubscriber(String),

    #[error("topic is empty, broadcast with publish_event_to_all")]
    EmptyTopic,

    #[error("payload is empty")]
    NilPayload,

    #[error("encoded envelope is {size} bytes, max is {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("server is already listening")]
    AlreadyListening,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("no event processor has any event registered")]
    EmptyProcessorSet,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
