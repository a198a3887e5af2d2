//! Reconciliation engine: one authoritative snapshot per subscription.
//!
//! The engine owns a single collection snapshot and applies inbound events to
//! it with the merge-or-refetch rule: an event is either merged by a merge
//! function that can positively identify what changed, or it triggers a full
//! refetch. Nothing is ever guessed.
//!
//! # Concurrency
//!
//! Every mutation (event merge, refetch) runs inside one async mutex, the
//! *gate*, which is held across the fetch itself. Events that arrive while a
//! fetch is in flight queue on the gate and apply on top of its result.
//! Readers never take the gate: the current state is published through a
//! `tokio::sync::watch` channel, and each publish swaps whole values.
//!
//! # Teardown
//!
//! [`ReconciliationEngine::teardown`] flips an `unmounted` flag and signals
//! in-flight fetches to abandon their result. Every publish re-checks the
//! flag inside the watch channel's write lock, so a fetch that completes after
//! teardown can neither change the snapshot nor raise a notice.

use crate::error::{FetchError, FetchResult};
use crate::fetch::SnapshotFetcher;
use crate::merge::{guarded_filter, guarded_merge, EventFilter, Merge, MergeOutcome};
use crate::notify::{NoticeReason, Notifier, UpdateNotice};
use crate::scheduler::{RefetchCause, Resync};
use crate::snapshot::Snapshot;
use crate::state::{LifecycleState, SubscriptionView};
use async_trait::async_trait;
use livesync_types::{Entity, InboundEvent, SubscriptionId, Timestamp};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// What `apply_event` decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The filter rejected the event. Nothing changed.
    Filtered,
    /// No snapshot yet, nothing to merge into.
    Dropped,
    /// The merge produced the next snapshot.
    Patched,
    /// The merge answered `Unknown`; a refetch replaced the snapshot.
    Resynced,
    /// The merge answered `Unknown`, but a fetch that started after the event
    /// arrived had already completed, so no new fetch was needed.
    Coalesced,
    /// The merge answered `Unknown` and the refetch failed. The previous
    /// snapshot is kept.
    Failed(FetchError),
    /// The engine is torn down.
    Ignored,
}

/// Mutable bookkeeping guarded by the gate.
#[derive(Debug, Default)]
struct Gate {
    /// Whether the most recent fetch completed and succeeded. Cleared when a
    /// fetch starts, so an abandoned fetch counts as a failure.
    last_fetch_ok: bool,
}

/// Keeps one snapshot consistent with a stream of events.
pub struct ReconciliationEngine<E: Entity> {
    id: SubscriptionId,
    label: String,
    fetcher: Arc<dyn SnapshotFetcher<E>>,
    notifier: Option<Arc<dyn Notifier>>,
    notify_on_update: bool,
    gate: Mutex<Gate>,
    view: watch::Sender<SubscriptionView<E>>,
    shutdown: watch::Sender<bool>,
    unmounted: AtomicBool,
    /// Set by an explicit disconnect, cleared by a reconnect.
    link_down: AtomicBool,
    /// Number of fetches started so far. Only incremented under the gate.
    fetches_started: AtomicU64,
}

impl<E: Entity> ReconciliationEngine<E> {
    /// Creates an engine with no notifier.
    pub fn new(label: impl Into<String>, fetcher: Arc<dyn SnapshotFetcher<E>>) -> Self {
        let (view, _) = watch::channel(SubscriptionView::default());
        let (shutdown, _) = watch::channel(false);
        Self {
            id: SubscriptionId::new(),
            label: label.into(),
            fetcher,
            notifier: None,
            notify_on_update: false,
            gate: Mutex::new(Gate::default()),
            view,
            shutdown,
            unmounted: AtomicBool::new(false),
            link_down: AtomicBool::new(false),
            fetches_started: AtomicU64::new(0),
        }
    }

    /// Attaches a notifier. Notices are only raised when `notify_on_update`
    /// is set.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, notify_on_update: bool) -> Self {
        self.notifier = Some(notifier);
        self.notify_on_update = notify_on_update;
        self
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// A copy of the current view.
    pub fn view(&self) -> SubscriptionView<E> {
        self.view.borrow().clone()
    }

    /// A receiver that observes every published change.
    pub fn watch(&self) -> watch::Receiver<SubscriptionView<E>> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot<E>>> {
        self.view.borrow().snapshot.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.view.borrow().state
    }

    pub fn is_torn_down(&self) -> bool {
        self.unmounted.load(Ordering::SeqCst)
    }

    /// Number of fetches started so far, successful or not.
    pub fn fetches_started(&self) -> u64 {
        self.fetches_started.load(Ordering::SeqCst)
    }

    /// Performs the first fetch.
    ///
    /// On failure no snapshot is stored, the error is recorded and the state
    /// stays `Fetching` so a later refetch can retry.
    pub async fn initialize(&self) -> FetchResult<Arc<Snapshot<E>>> {
        let mut gate = self.gate.lock().await;
        self.fetch_and_replace(&mut gate, RefetchCause::Initial).await
    }

    /// Fetches again and unconditionally replaces the snapshot on success.
    /// On failure the previous snapshot is kept.
    pub async fn refetch(&self) -> FetchResult<Arc<Snapshot<E>>> {
        self.refetch_for(RefetchCause::Manual).await
    }

    pub(crate) async fn refetch_for(&self, cause: RefetchCause) -> FetchResult<Arc<Snapshot<E>>> {
        let mut gate = self.gate.lock().await;
        self.fetch_and_replace(&mut gate, cause).await
    }

    /// Applies one inbound event with the merge-or-refetch rule.
    pub async fn apply_event(
        &self,
        event: &InboundEvent,
        merge: &dyn Merge<E>,
        filter: Option<&dyn EventFilter>,
    ) -> ApplyOutcome {
        if self.is_torn_down() {
            return ApplyOutcome::Ignored;
        }
        let seen = self.fetches_started.load(Ordering::SeqCst);
        let mut gate = self.gate.lock().await;
        if self.is_torn_down() {
            return ApplyOutcome::Ignored;
        }

        if let Some(filter) = filter {
            match guarded_filter(filter, &event.payload) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(subscription = %self.id, event = %event.name, "event filtered out");
                    return ApplyOutcome::Filtered;
                }
                Err(cause) => {
                    warn!(subscription = %self.id, event = %event.name, %cause, "event filter panicked");
                    return ApplyOutcome::Filtered;
                }
            }
        }

        let Some(current) = self.snapshot() else {
            debug!(subscription = %self.id, event = %event.name, "no snapshot yet, dropping event");
            return ApplyOutcome::Dropped;
        };

        let outcome = match guarded_merge(merge, &current, &event.payload) {
            Ok(outcome) => outcome,
            Err(cause) => {
                warn!(
                    subscription = %self.id,
                    label = %self.label,
                    event = %event.name,
                    %cause,
                    "merge panicked, falling back to refetch"
                );
                MergeOutcome::Unknown
            }
        };

        match outcome {
            MergeOutcome::Patched(next) => {
                let next = Arc::new(next);
                let count = next.len();
                if !self.publish(|view| view.snapshot = Some(next)) {
                    return ApplyOutcome::Ignored;
                }
                debug!(subscription = %self.id, event = %event.name, "event merged");
                self.notify(&event.name, NoticeReason::Patched, count);
                ApplyOutcome::Patched
            }
            MergeOutcome::Unknown => {
                if self.fetches_started.load(Ordering::SeqCst) > seen && gate.last_fetch_ok {
                    debug!(subscription = %self.id, event = %event.name, "refetch already covered this event");
                    return ApplyOutcome::Coalesced;
                }
                debug!(subscription = %self.id, event = %event.name, "merge ambiguous, refetching");
                match self.fetch_and_replace(&mut gate, RefetchCause::Event).await {
                    Ok(snapshot) => {
                        self.notify(&event.name, NoticeReason::Resynced, snapshot.len());
                        ApplyOutcome::Resynced
                    }
                    Err(FetchError::Cancelled) => ApplyOutcome::Ignored,
                    Err(err) => ApplyOutcome::Failed(err),
                }
            }
        }
    }

    /// Records the transport's link state. Moves `Live` to `Degraded` on a
    /// disconnect and back on a reconnect.
    pub fn set_transport_connected(&self, connected: bool) {
        self.link_down.store(!connected, Ordering::SeqCst);
        self.publish_if(|view| match (view.state, connected) {
            (LifecycleState::Live, false) => {
                view.state = LifecycleState::Degraded;
                true
            }
            (LifecycleState::Degraded, true) => {
                view.state = LifecycleState::Live;
                true
            }
            _ => false,
        });
    }

    /// Transitions to `Unmounted`. Any fetch still in flight is abandoned and
    /// every later call becomes a no-op. Safe to call more than once.
    pub fn teardown(&self) {
        if self.unmounted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        self.view.send_modify(|view| {
            view.state = LifecycleState::Unmounted;
            view.is_loading = false;
        });
        info!(subscription = %self.id, label = %self.label, "subscription torn down");
    }

    /// Runs one fetch under the gate and publishes the result.
    async fn fetch_and_replace(
        &self,
        gate: &mut Gate,
        cause: RefetchCause,
    ) -> FetchResult<Arc<Snapshot<E>>> {
        if self.is_torn_down() {
            return Err(FetchError::Cancelled);
        }
        // Until this fetch completes, nothing vouches for the current data.
        gate.last_fetch_ok = false;
        self.fetches_started.fetch_add(1, Ordering::SeqCst);
        let mut in_flight = InFlight::new(self);
        self.publish(|view| {
            view.is_loading = true;
            if view.state == LifecycleState::Uninitialized {
                view.state = LifecycleState::Fetching;
            }
        });
        debug!(subscription = %self.id, label = %self.label, ?cause, "fetching snapshot");

        let result = tokio::select! {
            result = self.fetcher.fetch_all() => result,
            _ = stopped(self.shutdown.subscribe()) => Err(FetchError::Cancelled),
        };
        in_flight.finish();

        match result {
            Ok(items) => {
                gate.last_fetch_ok = true;
                let snapshot = Arc::new(Snapshot::from_vec(items));
                let settled = if self.link_down.load(Ordering::SeqCst) {
                    LifecycleState::Degraded
                } else {
                    LifecycleState::Live
                };
                let committed = self.publish(|view| {
                    view.snapshot = Some(Arc::clone(&snapshot));
                    view.state = settled;
                    view.is_loading = false;
                    view.last_error = None;
                    view.last_fetched_at = Some(Timestamp::now());
                    view.fetch_count += 1;
                });
                if !committed {
                    return Err(FetchError::Cancelled);
                }
                debug!(
                    subscription = %self.id,
                    label = %self.label,
                    ?cause,
                    count = snapshot.len(),
                    "snapshot replaced"
                );
                Ok(snapshot)
            }
            Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
            Err(err) => {
                gate.last_fetch_ok = false;
                warn!(
                    subscription = %self.id,
                    label = %self.label,
                    ?cause,
                    error = %err,
                    "snapshot fetch failed, keeping previous data"
                );
                let recorded = err.clone();
                self.publish(|view| {
                    view.is_loading = false;
                    view.last_error = Some(recorded);
                });
                Err(err)
            }
        }
    }

    /// Publishes a change unless torn down. Returns false if rejected.
    fn publish(&self, change: impl FnOnce(&mut SubscriptionView<E>)) -> bool {
        self.publish_if(|view| {
            change(view);
            true
        })
    }

    /// Publishes a change the closure reports as real, unless torn down.
    fn publish_if(&self, change: impl FnOnce(&mut SubscriptionView<E>) -> bool) -> bool {
        self.view.send_if_modified(|view| {
            if self.unmounted.load(Ordering::SeqCst) {
                return false;
            }
            change(view)
        })
    }

    fn notify(&self, event_name: &str, reason: NoticeReason, entity_count: usize) {
        if !self.notify_on_update || self.is_torn_down() {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify(&UpdateNotice {
                subscription: self.id,
                label: self.label.clone(),
                event_name: event_name.to_string(),
                reason,
                entity_count,
            });
        }
    }
}

/// Clears `is_loading` when a fetch future is dropped before its fetch
/// returns, e.g. a caller's timeout around `refetch()`.
struct InFlight<'a, E: Entity> {
    engine: &'a ReconciliationEngine<E>,
    finished: bool,
}

impl<'a, E: Entity> InFlight<'a, E> {
    fn new(engine: &'a ReconciliationEngine<E>) -> Self {
        Self {
            engine,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl<E: Entity> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(subscription = %self.engine.id, label = %self.engine.label, "fetch abandoned");
        self.engine.publish(|view| view.is_loading = false);
    }
}

/// Resolves once teardown has been signalled.
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopped| *stopped).await;
}

#[async_trait]
impl<E: Entity> Resync for ReconciliationEngine<E> {
    async fn resync(&self, cause: RefetchCause) {
        // Failures are already recorded in the view.
        let _ = self.refetch_for(cause).await;
    }
}
