//! Merge and filter functions applied to inbound events.
//!
//! A merge either produces the next snapshot or answers
//! [`MergeOutcome::Unknown`], meaning it cannot positively identify what the
//! event changed. The engine never guesses on `Unknown`: it reasserts ground
//! truth by refetching.

use crate::snapshot::Snapshot;
use livesync_types::Entity;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};

/// Result of applying one event payload to a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome<E> {
    /// The event was applied; this is the next snapshot.
    Patched(Snapshot<E>),
    /// The event cannot be applied safely. A full refetch is required.
    Unknown,
}

impl<E> MergeOutcome<E> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, MergeOutcome::Unknown)
    }
}

impl<E> From<Option<Snapshot<E>>> for MergeOutcome<E> {
    fn from(value: Option<Snapshot<E>>) -> Self {
        value.map_or(MergeOutcome::Unknown, MergeOutcome::Patched)
    }
}

/// Applies an event payload to the current snapshot.
pub trait Merge<E>: Send + Sync {
    fn merge(&self, current: &Snapshot<E>, payload: &Value) -> MergeOutcome<E>;
}

impl<E, F> Merge<E> for F
where
    F: Fn(&Snapshot<E>, &Value) -> MergeOutcome<E> + Send + Sync,
{
    fn merge(&self, current: &Snapshot<E>, payload: &Value) -> MergeOutcome<E> {
        self(current, payload)
    }
}

/// Decides whether an event is relevant to this subscription at all.
pub trait EventFilter: Send + Sync {
    fn accept(&self, payload: &Value) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn accept(&self, payload: &Value) -> bool {
        self(payload)
    }
}

/// Pins a closure's signature so it can be passed where a [`Merge`] is
/// expected without annotating every argument.
pub fn merge_fn<E, F>(f: F) -> F
where
    F: Fn(&Snapshot<E>, &Value) -> MergeOutcome<E> + Send + Sync,
{
    f
}

/// Same as [`merge_fn`] for filters.
pub fn filter_fn<F>(f: F) -> F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    f
}

/// A merge that never patches. Every accepted event triggers a refetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRefetch;

/// Returns the always-refetch merge.
pub fn always_refetch() -> AlwaysRefetch {
    AlwaysRefetch
}

impl<E: Entity> Merge<E> for AlwaysRefetch {
    fn merge(&self, _current: &Snapshot<E>, _payload: &Value) -> MergeOutcome<E> {
        MergeOutcome::Unknown
    }
}

/// Patches one entity located by a key field of the payload.
///
/// Answers `Unknown` when the payload lacks the key field, when the key is
/// not in the snapshot, or when the patch function declines (returns false).
pub struct PatchByKey<F> {
    field: String,
    patch: F,
}

/// Builds a [`PatchByKey`] merge reading the entity key from `payload[field]`.
pub fn patch_by_key<E, F>(field: impl Into<String>, patch: F) -> PatchByKey<F>
where
    E: Entity,
    F: Fn(&mut E, &Value) -> bool + Send + Sync,
{
    PatchByKey {
        field: field.into(),
        patch,
    }
}

impl<E, F> Merge<E> for PatchByKey<F>
where
    E: Entity,
    F: Fn(&mut E, &Value) -> bool + Send + Sync,
{
    fn merge(&self, current: &Snapshot<E>, payload: &Value) -> MergeOutcome<E> {
        let Some(key) = payload.get(&self.field).and_then(Value::as_str) else {
            return MergeOutcome::Unknown;
        };
        let mut applied = false;
        let next = current.patched(key, |entity| applied = (self.patch)(entity, payload));
        match next {
            Some(snapshot) if applied => MergeOutcome::Patched(snapshot),
            _ => MergeOutcome::Unknown,
        }
    }
}

/// Runs a merge, treating a panic as `Unknown` so a buggy merge can never
/// leave the snapshot half-written.
pub(crate) fn guarded_merge<E>(
    merge: &dyn Merge<E>,
    current: &Snapshot<E>,
    payload: &Value,
) -> Result<MergeOutcome<E>, String> {
    panic::catch_unwind(AssertUnwindSafe(|| merge.merge(current, payload))).map_err(|cause| {
        cause
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| cause.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string())
    })
}

/// Runs a filter under the same panic guard. A panicking filter rejects.
pub(crate) fn guarded_filter(filter: &dyn EventFilter, payload: &Value) -> Result<bool, String> {
    panic::catch_unwind(AssertUnwindSafe(|| filter.accept(payload)))
        .map_err(|_| "filter panicked".to_string())
}
