//! The `transport` module defines the envelope exchanged in every UDP
//! datagram between the broker and its subscriber clients.
//!
//! Decoding is two-phase: [`decode`] yields an [`Envelope`] whose payload is
//! still an untyped JSON value, and the router then re-decodes the payload
//! against the schema its [`Command`] implies.

pub mod message;

pub use message::{
    Command, Envelope, EventPayload, MAX_DATAGRAM_SIZE, RegisterPayload, decode, encode,
};

#[cfg(test)]
mod tests;
