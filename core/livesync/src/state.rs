//! Subscription lifecycle and the view published to consumers.

use crate::error::FetchError;
use crate::snapshot::Snapshot;
use livesync_types::{Entity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a subscription is in its life.
///
/// ```text
/// Uninitialized -> Fetching -> Live <-> Degraded
///        \____________\__________\________\____> Unmounted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Created, first fetch not started.
    #[default]
    Uninitialized,
    /// First fetch in flight or failed; no snapshot yet.
    Fetching,
    /// Snapshot present, push transport delivering.
    Live,
    /// Snapshot present, push transport reported a disconnect.
    Degraded,
    /// Torn down. Nothing mutates the snapshot any more.
    Unmounted,
}

impl LifecycleState {
    /// Returns true once the subscription is torn down.
    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Unmounted
    }

    /// Returns true if a snapshot has been established.
    pub fn has_snapshot(self) -> bool {
        matches!(self, LifecycleState::Live | LifecycleState::Degraded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Fetching => "fetching",
            LifecycleState::Live => "live",
            LifecycleState::Degraded => "degraded",
            LifecycleState::Unmounted => "unmounted",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a consumer sees of one subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionView<E> {
    /// The current snapshot; `None` until the first fetch succeeds.
    pub snapshot: Option<Arc<Snapshot<E>>>,
    pub state: LifecycleState,
    /// True while a fetch is in flight.
    pub is_loading: bool,
    /// Error of the most recent failed fetch, cleared by the next success.
    pub last_error: Option<FetchError>,
    /// Completion time of the most recent successful fetch.
    pub last_fetched_at: Option<Timestamp>,
    /// Number of successful fetches so far.
    pub fetch_count: u64,
}

impl<E> Default for SubscriptionView<E> {
    fn default() -> Self {
        Self {
            snapshot: None,
            state: LifecycleState::Uninitialized,
            is_loading: false,
            last_error: None,
            last_fetched_at: None,
            fetch_count: 0,
        }
    }
}

impl<E: Entity> SubscriptionView<E> {
    /// Number of entities in the current snapshot, zero if absent.
    pub fn entity_count(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.len())
    }
}
