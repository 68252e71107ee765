use serde_json::json;

use super::message::REGISTRATION_SUCCESS;
use super::{Command, Envelope, EventPayload, decode, encode};
use crate::utils::BrokerError;

#[test]
fn test_register_envelope_wire_shape() {
    let envelope = Envelope::register("ORDER").unwrap();
    let bytes = encode(&envelope).unwrap();
    let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(raw["cmd"], "register");
    assert_eq!(raw["data"]["topic"], "ORDER");
}

#[test]
fn test_decode_register_then_payload() {
    let bytes = json!({
        "cmd": "register",
        "msg": "hello",
        "data": { "topic": "ORDER" }
    })
    .to_string();

    let envelope = decode(bytes.as_bytes()).unwrap();
    assert_eq!(envelope.command, Command::Register);
    assert_eq!(envelope.note, "hello");
    assert_eq!(envelope.register_payload().unwrap().topic, "ORDER");
}

#[test]
fn test_decode_event_payload() {
    let payload = EventPayload::new("NEW_ORDER_VERIFIED");
    let envelope = Envelope::event("test", &payload).unwrap();

    let decoded = decode(&encode(&envelope).unwrap()).unwrap();
    let event = decoded.event_payload().unwrap();
    assert_eq!(event.event, "NEW_ORDER_VERIFIED");
    assert_eq!(event.uuid, payload.uuid);
    assert_eq!(event.data, None);
    assert_eq!(decoded.delivery_id(), Some(payload.uuid.as_str()));
}

#[test]
fn test_missing_note_and_payload_default() {
    let envelope = decode(br#"{"cmd":"info"}"#).unwrap();
    assert_eq!(envelope.command, Command::Info);
    assert_eq!(envelope.note, "");
    assert!(envelope.payload.is_null());
}

#[test]
fn test_register_without_data_is_broadcast_only() {
    let envelope = decode(br#"{"cmd":"register"}"#).unwrap();
    assert_eq!(envelope.command, Command::Register);
    assert_eq!(envelope.register_payload().unwrap().topic, "");
}

#[test]
fn test_unknown_fields_are_ignored() {
    let bytes = json!({
        "cmd": "event",
        "msg": "",
        "data": { "event": "PING", "uuid": "abc", "priority": 3 },
        "version": 2
    })
    .to_string();

    let event = decode(bytes.as_bytes()).unwrap().event_payload().unwrap();
    assert_eq!(event.event, "PING");
    assert_eq!(event.uuid, "abc");
}

#[test]
fn test_unknown_command_decodes_as_unknown() {
    let envelope = decode(br#"{"cmd":"[RET]","msg":"retry"}"#).unwrap();
    assert_eq!(envelope.command, Command::Unknown);
}

#[test]
fn test_truncated_input_is_decode_error() {
    let bytes = encode(&Envelope::info(REGISTRATION_SUCCESS)).unwrap();
    let truncated = &bytes[..bytes.len() / 2];

    assert!(matches!(decode(truncated), Err(BrokerError::Decode(_))));
    assert!(matches!(decode(b""), Err(BrokerError::Decode(_))));
    assert!(matches!(decode(b"[REG]:127.0.0.1"), Err(BrokerError::Decode(_))));
    assert!(matches!(decode(&[0xff, 0xfe, 0x00]), Err(BrokerError::Decode(_))));
}

#[test]
fn test_payload_shape_mismatch_is_decode_error() {
    let envelope = decode(br#"{"cmd":"event","data":{"topic":"ORDER"}}"#).unwrap();
    assert!(matches!(
        envelope.event_payload(),
        Err(BrokerError::Decode(_))
    ));
}

#[test]
fn test_event_data_is_carried() {
    let payload = EventPayload::new("BROADCAST").with_data(json!({"id": 7}));
    let envelope = Envelope::event("", &payload).unwrap();
    let event = decode(&encode(&envelope).unwrap())
        .unwrap()
        .event_payload()
        .unwrap();
    assert_eq!(event.data, Some(json!({"id": 7})));
}
