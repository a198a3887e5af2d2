//! Disconnection fallback scheduler.
//!
//! While the push transport is down, events are not arriving and the
//! snapshot would go stale. The scheduler polls the target at a fixed period
//! for as long as the transport is disconnected, and forces exactly one
//! refetch when it comes back, because events may have been missed in the
//! gap. It only ever reacts to explicit connect/disconnect signals; silence
//! from a transport that never connected starts nothing.
//!
//! Each subscription owns its own scheduler. A process with many
//! subscriptions runs as many independent timers.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Why a refetch was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefetchCause {
    /// First fetch after mount.
    Initial,
    /// Caller asked for a refresh.
    Manual,
    /// An event could not be merged.
    Event,
    /// Fallback polling tick while disconnected.
    Fallback,
    /// Transport reconnected.
    Reconnect,
}

/// Something the scheduler can ask to resynchronize.
#[async_trait]
pub trait Resync: Send + Sync {
    async fn resync(&self, cause: RefetchCause);
}

/// What the scheduler last heard from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No signal yet.
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

/// Polls a [`Resync`] target while the transport is disconnected.
pub struct FallbackScheduler {
    target: Arc<dyn Resync>,
    interval: Duration,
    link: LinkState,
    timer: Option<JoinHandle<()>>,
}

impl FallbackScheduler {
    /// Creates a scheduler. Nothing runs until a disconnect is reported.
    pub fn new(target: Arc<dyn Resync>, interval: Duration) -> Self {
        Self {
            target,
            interval,
            link: LinkState::Unknown,
            timer: None,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true while a fallback timer is active.
    pub fn is_polling(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Records that the transport was already connected when the listeners
    /// were attached. No refetch is forced: nothing can have been missed yet.
    pub fn assume_connected(&mut self) {
        if self.link == LinkState::Unknown {
            self.link = LinkState::Connected;
        }
    }

    /// The transport reported a disconnect. Starts the fallback timer unless
    /// one is already running. Returns true if a timer was started.
    pub fn on_transport_disconnected(&mut self) -> bool {
        self.link = LinkState::Disconnected;
        if self.is_polling() {
            debug!("fallback timer already running");
            return false;
        }
        info!(interval_secs = self.interval.as_secs_f64(), "transport down, starting fallback polling");
        self.timer = Some(spawn_timer(Arc::clone(&self.target), self.interval));
        true
    }

    /// The transport reported a (re)connect. Cancels the fallback timer, if
    /// any, and forces one refetch. A repeated connect signal while already
    /// connected does nothing. Returns true if a refetch was issued.
    pub async fn on_transport_connected(&mut self) -> bool {
        if self.link == LinkState::Connected {
            debug!("duplicate connect signal ignored");
            return false;
        }
        self.cancel_timer();
        self.link = LinkState::Connected;
        info!("transport connected, forcing refetch");
        self.target.resync(RefetchCause::Reconnect).await;
        true
    }

    /// Cancels any active timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.cancel_timer();
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("fallback timer cancelled");
        }
    }
}

impl Drop for FallbackScheduler {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn spawn_timer(target: Arc<dyn Resync>, period: Duration) -> JoinHandle<()> {
    // First tick one full period after the disconnect, not after the task
    // first gets polled.
    let start = Instant::now() + period;
    tokio::spawn(async move {
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("fallback tick");
            target.resync(RefetchCause::Fallback).await;
        }
    })
}
