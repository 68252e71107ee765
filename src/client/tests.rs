use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use super::{ClientState, EventProcessor, ProcessorSet, SubscriberClient};
use crate::transport::{Envelope, EventPayload, encode};
use crate::utils::BrokerError;
use crate::utils::signal::stop_channel;

fn counting(events: &[&str], hits: &Arc<AtomicUsize>) -> EventProcessor {
    let hits = Arc::clone(hits);
    EventProcessor::new(events.iter().copied(), move |_, _, _| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_dispatch_fans_out_to_every_match() {
    let order_hits = Arc::new(AtomicUsize::new(0));
    let audit_hits = Arc::new(AtomicUsize::new(0));
    let reject_hits = Arc::new(AtomicUsize::new(0));
    let set = ProcessorSet::new(vec![
        counting(&["NEW_ORDER_VERIFIED", "NEW_ORDER_WAITING"], &order_hits),
        counting(&["NEW_ORDER_VERIFIED"], &audit_hits),
        counting(&["REJECT_BY_SELLER"], &reject_hits),
    ]);

    let invoked = set
        .dispatch("ORDER", "NEW_ORDER_VERIFIED", &Value::Null)
        .unwrap();

    assert_eq!(invoked, 2);
    assert_eq!(order_hits.load(Ordering::SeqCst), 1);
    assert_eq!(audit_hits.load(Ordering::SeqCst), 1);
    assert_eq!(reject_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dispatch_passes_topic_event_and_payload() {
    let seen: Arc<Mutex<Vec<(String, String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let set = ProcessorSet::new(vec![EventProcessor::new(["PING"], move |topic, event, payload| {
        sink.lock()
            .unwrap()
            .push((topic.to_string(), event.to_string(), payload.clone()));
        Ok(())
    })]);

    set.dispatch("HEALTH", "PING", &json!({"event": "PING"}))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "HEALTH");
    assert_eq!(seen[0].1, "PING");
    assert_eq!(seen[0].2["event"], "PING");
}

#[test]
fn test_failing_callback_does_not_stop_others() {
    let hits = Arc::new(AtomicUsize::new(0));
    let set = ProcessorSet::new(vec![
        EventProcessor::new(["PING"], |_, _, _| Err("boom".into())),
        counting(&["PING"], &hits),
    ]);

    assert_eq!(set.dispatch("HEALTH", "PING", &Value::Null).unwrap(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unmatched_event_invokes_nothing() {
    let hits = Arc::new(AtomicUsize::new(0));
    let set = ProcessorSet::new(vec![counting(&["PING"], &hits)]);

    assert_eq!(set.dispatch("HEALTH", "PONG", &Value::Null).unwrap(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_processor_set_is_an_error() {
    let empty = ProcessorSet::default();
    assert!(matches!(
        empty.dispatch("ORDER", "NEW_ORDER_VERIFIED", &Value::Null),
        Err(BrokerError::EmptyProcessorSet)
    ));

    let no_events = ProcessorSet::new(vec![EventProcessor::new(
        Vec::<String>::new(),
        |_, _, _| Ok(()),
    )]);
    assert!(!no_events.has_events());
    assert!(matches!(
        no_events.dispatch("ORDER", "NEW_ORDER_VERIFIED", &Value::Null),
        Err(BrokerError::EmptyProcessorSet)
    ));
}

#[tokio::test]
async fn test_client_routes_event_datagram() {
    let hits = Arc::new(AtomicUsize::new(0));
    let client = SubscriberClient::connect(
        "127.0.0.1",
        9,
        "ORDER",
        vec![counting(&["NEW_ORDER_VERIFIED"], &hits)],
    )
    .await
    .unwrap();
    assert_eq!(client.state(), ClientState::Idle);
    assert_eq!(client.topic(), "ORDER");

    let event = Envelope::event("", &EventPayload::new("NEW_ORDER_VERIFIED")).unwrap();
    client.handle_datagram(&encode(&event).unwrap()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let info = Envelope::info("registration success");
    client.handle_datagram(&encode(&info).unwrap()).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(matches!(
        client.handle_datagram(b"{\"cmd\":\"event\""),
        Err(BrokerError::Decode(_))
    ));
    assert!(matches!(
        client.handle_datagram(br#"{"cmd":"[EVT]"}"#),
        Err(BrokerError::UnknownCommand)
    ));
}

#[tokio::test]
async fn test_client_stops_and_refuses_restart() {
    let client = SubscriberClient::connect("127.0.0.1", 9, "ORDER", ProcessorSet::default())
        .await
        .unwrap();
    let (stop, rx) = stop_channel();
    stop.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), client.start_listen(rx.clone()))
        .await
        .expect("stops promptly")
        .unwrap();
    assert_eq!(client.state(), ClientState::Stopped);

    assert!(matches!(
        client.start_listen(rx).await,
        Err(BrokerError::AlreadyListening)
    ));
}
