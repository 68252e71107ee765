use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::id::new_delivery_id;
use crate::utils::{BrokerError, Result};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Note attached to the acknowledgement of a registration.
pub const REGISTRATION_SUCCESS: &str = "registration success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Register,
    Unregister,
    Info,
    Event,
    /// Any tag this build does not know about.
    #[serde(other)]
    Unknown,
}

/// The unit of wire exchange, one per datagram.
///
/// ```json
/// {"cmd": "event", "msg": "order placed", "data": {"event": "NEW_ORDER", "uuid": "..."}}
/// ```
///
/// `msg` is free text for diagnostics and `data` is left untyped until the
/// receiver knows which payload `cmd` implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "cmd")]
    pub command: Command,
    #[serde(rename = "msg", default)]
    pub note: String,
    #[serde(rename = "data", default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: String,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EventPayload {
    /// Builds a payload for `event` with a fresh delivery id.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            uuid: new_delivery_id(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl Envelope {
    pub fn register(topic: impl Into<String>) -> Result<Self> {
        Self::with_payload(
            Command::Register,
            "client do registration",
            &RegisterPayload {
                topic: topic.into(),
            },
        )
    }

    pub fn unregister() -> Self {
        Self {
            command: Command::Unregister,
            note: "client stop listening".to_string(),
            payload: Value::Null,
        }
    }

    pub fn info(note: impl Into<String>) -> Self {
        Self {
            command: Command::Info,
            note: note.into(),
            payload: Value::Null,
        }
    }

    pub fn event(note: impl Into<String>, payload: &EventPayload) -> Result<Self> {
        Self::with_payload(Command::Event, note, payload)
    }

    fn with_payload<T: Serialize>(
        command: Command,
        note: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        Ok(Self {
            command,
            note: note.into(),
            payload: serde_json::to_value(payload).map_err(BrokerError::Encode)?,
        })
    }

    /// Second decoding phase: reads the untyped payload as `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(BrokerError::Decode)
    }

    /// A Register without `data` registers for broadcasts only.
    pub fn register_payload(&self) -> Result<RegisterPayload> {
        if self.payload.is_null() {
            return Ok(RegisterPayload::default());
        }
        self.payload_as()
    }

    pub fn event_payload(&self) -> Result<EventPayload> {
        self.payload_as()
    }

    /// Delivery id of an event envelope, used for log correlation.
    pub fn delivery_id(&self) -> Option<&str> {
        self.payload.get("uuid").and_then(Value::as_str)
    }
}

pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(BrokerError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    serde_json::from_slice(bytes).map_err(BrokerError::Decode)
}
