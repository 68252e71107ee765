use uuid::Uuid;

/// Fresh opaque token attached to every published event.
///
/// Used for tracing a delivery through the logs only; receivers never
/// deduplicate on it.
pub fn new_delivery_id() -> String {
    Uuid::new_v4().to_string()
}
