use livesync::{FetchError, LifecycleState, SubscriptionView};
use livesync_types::warehouse::Order;

#[test]
fn default_state_is_uninitialized() {
    assert_eq!(LifecycleState::default(), LifecycleState::Uninitialized);
}

#[test]
fn only_unmounted_is_terminal() {
    for state in [
        LifecycleState::Uninitialized,
        LifecycleState::Fetching,
        LifecycleState::Live,
        LifecycleState::Degraded,
    ] {
        assert!(!state.is_terminal(), "{state}");
    }
    assert!(LifecycleState::Unmounted.is_terminal());
}

#[test]
fn snapshot_states() {
    assert!(LifecycleState::Live.has_snapshot());
    assert!(LifecycleState::Degraded.has_snapshot());
    assert!(!LifecycleState::Fetching.has_snapshot());
}

#[test]
fn state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&LifecycleState::Degraded).unwrap(),
        "\"degraded\""
    );
    let parsed: LifecycleState = serde_json::from_str("\"unmounted\"").unwrap();
    assert_eq!(parsed, LifecycleState::Unmounted);
    assert_eq!(LifecycleState::Live.to_string(), "live");
}

#[test]
fn default_view_is_empty() {
    let view: SubscriptionView<Order> = SubscriptionView::default();
    assert!(view.snapshot.is_none());
    assert_eq!(view.entity_count(), 0);
    assert_eq!(view.fetch_count, 0);
    assert!(!view.is_loading);
}

#[test]
fn fetch_error_retryability() {
    assert!(FetchError::Timeout.is_retryable());
    assert!(FetchError::Network("reset".into()).is_retryable());
    assert!(FetchError::Status { status: 503, body: String::new() }.is_retryable());
    assert!(FetchError::Status { status: 429, body: String::new() }.is_retryable());
    assert!(!FetchError::Status { status: 404, body: String::new() }.is_retryable());
    assert!(!FetchError::Decode("bad".into()).is_retryable());
    assert!(!FetchError::Cancelled.is_retryable());
}
