//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `udpsub` broker.
//!
//! It centralizes the error type, the logging setup, the delivery identifier
//! source and the stop signal shared by every long running loop.

pub mod error;
pub mod id;
pub mod logging;
pub mod signal;

pub use error::{BrokerError, Result};
