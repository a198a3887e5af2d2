use livesync_types::{EntityKey, SubscriptionId};
use std::collections::HashSet;
use std::str::FromStr;

// ── EntityKey ─────────────────────────────────────────────────────

#[test]
fn entity_key_display_matches_input() {
    let key = EntityKey::new("o-1001");
    assert_eq!(key.to_string(), "o-1001");
    assert_eq!(key.as_str(), "o-1001");
}

#[test]
fn entity_key_from_str_never_fails() {
    let key = EntityKey::from_str("anything goes").unwrap();
    assert_eq!(key.as_str(), "anything goes");
}

#[test]
fn entity_key_conversions_agree() {
    let a = EntityKey::from("p-7");
    let b = EntityKey::from("p-7".to_string());
    assert_eq!(a, b);
    assert_eq!(a.into_inner(), "p-7");
}

#[test]
fn entity_key_serializes_as_plain_string() {
    let key = EntityKey::new("r-3");
    let json = serde_json::to_string(&key).unwrap();
    assert_eq!(json, r#""r-3""#);
    let parsed: EntityKey = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, key);
}

#[test]
fn entity_key_borrows_as_str_for_lookups() {
    let mut set: HashSet<EntityKey> = HashSet::new();
    set.insert(EntityKey::new("o-1"));
    assert!(set.contains("o-1"));
    assert!(!set.contains("o-2"));
}

// ── SubscriptionId ────────────────────────────────────────────────

#[test]
fn subscription_id_new_is_unique() {
    let a = SubscriptionId::new();
    let b = SubscriptionId::new();
    assert_ne!(a, b);
}

#[test]
fn subscription_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = SubscriptionId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn subscription_id_display_and_parse() {
    let id = SubscriptionId::new();
    let parsed = SubscriptionId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
    let from_str: SubscriptionId = id.to_string().parse().unwrap();
    assert_eq!(id, from_str);
}

#[test]
fn subscription_id_parse_invalid() {
    assert!(SubscriptionId::parse("not-a-uuid").is_err());
    assert!(SubscriptionId::from_str("garbage").is_err());
}

#[test]
fn subscription_id_hash_and_eq() {
    let id = SubscriptionId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}
