use livesync_types::warehouse::{OrderSynced, events};
use livesync_types::{Error, EventId, InboundEvent};
use serde_json::json;
use std::str::FromStr;

// ── EventId ───────────────────────────────────────────────────────

#[test]
fn event_id_unique() {
    assert_ne!(EventId::new(), EventId::new());
}

#[test]
fn event_id_display_roundtrip() {
    let id = EventId::new();
    let parsed: EventId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn event_id_from_str_invalid() {
    assert!(EventId::from_str("bad").is_err());
}

// ── InboundEvent ──────────────────────────────────────────────────

#[test]
fn redelivery_gets_a_fresh_delivery_id() {
    let payload = json!({"orderId": "o1", "status": "SHIPPED"});
    let first = InboundEvent::new(events::ORDER_SYNCED, payload.clone());
    let second = InboundEvent::new(events::ORDER_SYNCED, payload);
    assert_ne!(first.id, second.id);
    assert_eq!(first.payload, second.payload);
}

#[test]
fn payload_as_decodes_typed_payload() {
    let event = InboundEvent::new(
        events::ORDER_SYNCED,
        json!({"orderId": "o1", "status": "SHIPPED"}),
    );
    let synced: OrderSynced = event.payload_as().unwrap();
    assert_eq!(synced.order_id, "o1");
    assert_eq!(synced.status, "SHIPPED");
}

#[test]
fn payload_as_reports_event_name_on_failure() {
    let event = InboundEvent::new(events::ORDER_SYNCED, json!({"status": 5}));
    match event.payload_as::<OrderSynced>() {
        Err(Error::InvalidPayload { event, .. }) => assert_eq!(event, "order:synced"),
        other => panic!("expected InvalidPayload, got {other:?}"),
    }
}

#[test]
fn str_field_reads_top_level_strings_only() {
    let event = InboundEvent::new("x", json!({"a": "b", "n": 1, "o": {"a": "c"}}));
    assert_eq!(event.str_field("a"), Some("b"));
    assert_eq!(event.str_field("n"), None);
    assert_eq!(event.str_field("missing"), None);
}

#[test]
fn transport_id_is_omitted_when_absent() {
    let event = InboundEvent::new("x", json!(null));
    let value = serde_json::to_value(&event).unwrap();
    assert!(value.get("transport_id").is_none());

    let tagged = event.with_transport_id("42");
    let value = serde_json::to_value(&tagged).unwrap();
    assert_eq!(value["transport_id"], "42");
}

#[test]
fn inbound_event_serde_roundtrip() {
    let event = InboundEvent::new("return:created", json!({"returnId": "r1"})).with_transport_id("7");
    let json = serde_json::to_string(&event).unwrap();
    let parsed: InboundEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}
