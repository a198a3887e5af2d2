//! Consumer surface: one live subscription to one entity kind.
//!
//! [`Subscription::start`] wires a fetcher, a set of event bindings and a
//! transport into a running [`ReconciliationEngine`] plus its
//! [`FallbackScheduler`]. The returned [`SubscriptionHandle`] owns every
//! resource involved; dropping it releases them on every exit path.

use crate::config::{LiveSyncConfig, DEFAULT_FALLBACK_INTERVAL_SECS};
use crate::engine::{ApplyOutcome, ReconciliationEngine};
use crate::error::{ConfigError, FetchError, FetchResult, SubscribeError};
use crate::fetch::SnapshotFetcher;
use crate::merge::{EventFilter, Merge};
use crate::notify::Notifier;
use crate::scheduler::{FallbackScheduler, Resync};
use crate::snapshot::Snapshot;
use crate::state::{LifecycleState, SubscriptionView};
use crate::transport::{DisconnectReason, TransportClient, Unsubscribe};
use livesync_types::{Entity, InboundEvent, SubscriptionId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One event name and the merge applied when it arrives.
pub struct EventBinding<E> {
    pub name: String,
    pub merge: Arc<dyn Merge<E>>,
}

impl<E> Clone for EventBinding<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            merge: Arc::clone(&self.merge),
        }
    }
}

/// Everything needed to start a subscription.
pub struct SubscriptionConfig<E> {
    pub fetcher: Arc<dyn SnapshotFetcher<E>>,
    pub bindings: Vec<EventBinding<E>>,
    /// Applied to every event before its merge.
    pub filter: Option<Arc<dyn EventFilter>>,
    pub notify_on_update: bool,
    pub notifier: Option<Arc<dyn Notifier>>,
    /// Polling period while the transport is disconnected.
    pub fallback_interval: Duration,
    /// Entity kind name used in logs and notices.
    pub label: String,
}

impl<E: Entity> SubscriptionConfig<E> {
    /// Creates a config listening to one event.
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher<E>>,
        event_name: impl Into<String>,
        merge: impl Merge<E> + 'static,
    ) -> Self {
        Self {
            fetcher,
            bindings: vec![EventBinding {
                name: event_name.into(),
                merge: Arc::new(merge),
            }],
            filter: None,
            notify_on_update: false,
            notifier: None,
            fallback_interval: Duration::from_secs(DEFAULT_FALLBACK_INTERVAL_SECS),
            label: "subscription".to_string(),
        }
    }

    /// Also listens to `event_name`, applying `merge` to it.
    pub fn also_on(mut self, event_name: impl Into<String>, merge: impl Merge<E> + 'static) -> Self {
        self.bindings.push(EventBinding {
            name: event_name.into(),
            merge: Arc::new(merge),
        });
        self
    }

    pub fn with_filter(mut self, filter: impl EventFilter + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn notify_on_update(mut self, enabled: bool) -> Self {
        self.notify_on_update = enabled;
        self
    }

    /// Sets the notifier and turns notification on.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self.notify_on_update = true;
        self
    }

    pub fn with_fallback_interval(mut self, interval: Duration) -> Self {
        self.fallback_interval = interval;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Takes the fallback interval and notification default from a
    /// process-level config.
    pub fn apply_defaults(mut self, config: &LiveSyncConfig) -> Self {
        self.fallback_interval = config.fallback_interval();
        self.notify_on_update = config.notify_on_update;
        self
    }

    /// Event names this config listens to, in binding order.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bindings.is_empty() {
            return Err(ConfigError::NoEvents);
        }
        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if binding.name.trim().is_empty() {
                return Err(ConfigError::EmptyEventName);
            }
            if !seen.insert(binding.name.as_str()) {
                return Err(ConfigError::DuplicateEvent(binding.name.clone()));
            }
        }
        if self.fallback_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("fallback_interval"));
        }
        Ok(())
    }
}

/// What the transport handlers forward to the driver task.
enum Signal {
    Event(InboundEvent),
    Connected,
    Disconnected(DisconnectReason),
}

/// Entry point for starting subscriptions.
pub struct Subscription;

impl Subscription {
    /// Starts a subscription on a shared transport. Must be called inside a
    /// Tokio runtime.
    ///
    /// The first fetch runs on the driver task; observe progress through the
    /// handle. If the transport is already connected, no extra refetch is
    /// forced for that initial connection.
    pub fn start<E: Entity>(
        config: SubscriptionConfig<E>,
        transport: Arc<dyn TransportClient>,
    ) -> Result<SubscriptionHandle<E>, SubscribeError> {
        config.validate()?;
        let SubscriptionConfig {
            fetcher,
            bindings,
            filter,
            notify_on_update,
            notifier,
            fallback_interval,
            label,
        } = config;

        let mut engine = ReconciliationEngine::new(label, fetcher);
        if let Some(notifier) = notifier {
            engine = engine.with_notifier(notifier, notify_on_update);
        }
        let engine = Arc::new(engine);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut guards = Vec::with_capacity(bindings.len() + 2);
        for binding in &bindings {
            let tx = tx.clone();
            guards.push(transport.subscribe(
                &binding.name,
                Arc::new(move |event| {
                    let _ = tx.send(Signal::Event(event));
                }),
            ));
        }
        let connect_tx = tx.clone();
        guards.push(transport.on_connect(Arc::new(move || {
            let _ = connect_tx.send(Signal::Connected);
        })));
        guards.push(transport.on_disconnect(Arc::new(move |reason| {
            let _ = tx.send(Signal::Disconnected(reason));
        })));

        // Read after registering so a connect in between is not lost.
        let already_connected = transport.is_connected();

        let scheduler = FallbackScheduler::new(
            Arc::clone(&engine) as Arc<dyn Resync>,
            fallback_interval,
        );
        let merges = bindings
            .into_iter()
            .map(|b| (b.name, b.merge))
            .collect::<HashMap<_, _>>();

        info!(
            subscription = %engine.id(),
            label = %engine.label(),
            events = ?merges.keys().collect::<Vec<_>>(),
            already_connected,
            "subscription started"
        );

        let task = tokio::spawn(drive(
            Arc::clone(&engine),
            scheduler,
            merges,
            filter,
            rx,
            already_connected,
        ));

        Ok(SubscriptionHandle {
            engine,
            guards,
            task: Some(task),
        })
    }
}

async fn drive<E: Entity>(
    engine: Arc<ReconciliationEngine<E>>,
    mut scheduler: FallbackScheduler,
    merges: HashMap<String, Arc<dyn Merge<E>>>,
    filter: Option<Arc<dyn EventFilter>>,
    mut signals: mpsc::UnboundedReceiver<Signal>,
    already_connected: bool,
) {
    if already_connected {
        scheduler.assume_connected();
    }
    if let Err(err) = engine.initialize().await {
        debug!(subscription = %engine.id(), error = %err, "initial fetch did not complete");
    }

    while let Some(signal) = signals.recv().await {
        if engine.is_torn_down() {
            break;
        }
        match signal {
            Signal::Event(event) => {
                let Some(merge) = merges.get(&event.name) else {
                    continue;
                };
                let outcome = engine
                    .apply_event(&event, merge.as_ref(), filter.as_deref())
                    .await;
                if let ApplyOutcome::Failed(err) = &outcome {
                    warn!(
                        subscription = %engine.id(),
                        event = %event.name,
                        error = %err,
                        "resync after event failed"
                    );
                }
            }
            Signal::Connected => {
                engine.set_transport_connected(true);
                scheduler.on_transport_connected().await;
            }
            Signal::Disconnected(reason) => {
                debug!(subscription = %engine.id(), %reason, "transport disconnected");
                engine.set_transport_connected(false);
                scheduler.on_transport_disconnected();
            }
        }
    }
    scheduler.stop();
}

/// A running subscription.
///
/// Dropping the handle tears the subscription down: the engine stops
/// accepting changes, handlers are deregistered from the transport and the
/// driver task (with its fallback timer) is aborted.
pub struct SubscriptionHandle<E: Entity> {
    engine: Arc<ReconciliationEngine<E>>,
    guards: Vec<Unsubscribe>,
    task: Option<JoinHandle<()>>,
}

impl<E: Entity> SubscriptionHandle<E> {
    pub fn id(&self) -> SubscriptionId {
        self.engine.id()
    }

    pub fn label(&self) -> &str {
        self.engine.label()
    }

    /// The current snapshot, `None` until the first fetch succeeds.
    pub fn snapshot(&self) -> Option<Arc<Snapshot<E>>> {
        self.engine.snapshot()
    }

    pub fn is_loading(&self) -> bool {
        self.engine.view().is_loading
    }

    pub fn last_error(&self) -> Option<FetchError> {
        self.engine.view().last_error
    }

    pub fn state(&self) -> LifecycleState {
        self.engine.state()
    }

    pub fn view(&self) -> SubscriptionView<E> {
        self.engine.view()
    }

    pub fn watch(&self) -> watch::Receiver<SubscriptionView<E>> {
        self.engine.watch()
    }

    /// Fetches again and replaces the snapshot on success.
    pub async fn refetch(&self) -> FetchResult<Arc<Snapshot<E>>> {
        self.engine.refetch().await
    }

    /// Access to the underlying engine.
    pub fn engine(&self) -> &Arc<ReconciliationEngine<E>> {
        &self.engine
    }

    /// Tears down and waits for the driver task to finish.
    pub async fn shutdown(mut self) {
        self.engine.teardown();
        self.guards.clear();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<E: Entity> Drop for SubscriptionHandle<E> {
    fn drop(&mut self) {
        self.engine.teardown();
        self.guards.clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
