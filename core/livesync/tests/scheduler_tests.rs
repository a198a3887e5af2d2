use async_trait::async_trait;
use livesync::{FallbackScheduler, LinkState, RefetchCause, Resync};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Recorder {
    causes: Mutex<Vec<RefetchCause>>,
}

impl Recorder {
    fn causes(&self) -> Vec<RefetchCause> {
        self.causes.lock().unwrap().clone()
    }

    fn count(&self, cause: RefetchCause) -> usize {
        self.causes().into_iter().filter(|c| *c == cause).count()
    }
}

#[async_trait]
impl Resync for Recorder {
    async fn resync(&self, cause: RefetchCause) {
        self.causes.lock().unwrap().push(cause);
    }
}

fn scheduler() -> (FallbackScheduler, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let scheduler = FallbackScheduler::new(recorder.clone(), PERIOD);
    (scheduler, recorder)
}

/// Lets spawned timer tasks run after the clock moved.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}

// ── Silence ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn nothing_runs_without_a_signal() {
    let (scheduler, recorder) = scheduler();

    advance(PERIOD * 10).await;

    assert_eq!(scheduler.link_state(), LinkState::Unknown);
    assert!(!scheduler.is_polling());
    assert!(recorder.causes().is_empty());
}

// ── Disconnected ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn disconnect_polls_once_per_period() {
    let (mut scheduler, recorder) = scheduler();

    assert!(scheduler.on_transport_disconnected());
    assert!(scheduler.is_polling());

    advance(PERIOD - Duration::from_secs(1)).await;
    assert_eq!(recorder.count(RefetchCause::Fallback), 0);

    advance(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(RefetchCause::Fallback), 1);

    advance(PERIOD).await;
    advance(PERIOD).await;
    assert_eq!(recorder.count(RefetchCause::Fallback), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_disconnect_starts_one_timer() {
    let (mut scheduler, recorder) = scheduler();

    assert!(scheduler.on_transport_disconnected());
    assert!(!scheduler.on_transport_disconnected());
    assert!(!scheduler.on_transport_disconnected());

    advance(PERIOD).await;
    assert_eq!(recorder.count(RefetchCause::Fallback), 1);
    advance(PERIOD).await;
    assert_eq!(recorder.count(RefetchCause::Fallback), 2);
}

// ── Connected ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconnect_cancels_timer_and_forces_one_refetch() {
    let (mut scheduler, recorder) = scheduler();
    scheduler.on_transport_disconnected();
    advance(PERIOD).await;

    assert!(scheduler.on_transport_connected().await);
    assert!(!scheduler.is_polling());
    assert_eq!(scheduler.link_state(), LinkState::Connected);

    // Duplicate connect signal.
    assert!(!scheduler.on_transport_connected().await);

    advance(PERIOD * 5).await;
    assert_eq!(
        recorder.causes(),
        vec![RefetchCause::Fallback, RefetchCause::Reconnect]
    );
}

#[tokio::test(start_paused = true)]
async fn first_connect_forces_refetch() {
    let (mut scheduler, recorder) = scheduler();

    assert!(scheduler.on_transport_connected().await);

    assert_eq!(recorder.causes(), vec![RefetchCause::Reconnect]);
}

#[tokio::test(start_paused = true)]
async fn assumed_connection_is_not_refetched() {
    let (mut scheduler, recorder) = scheduler();

    scheduler.assume_connected();
    assert!(!scheduler.on_transport_connected().await);

    assert!(recorder.causes().is_empty());
    assert_eq!(scheduler.link_state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn flapping_link_keeps_a_single_timer() {
    let (mut scheduler, recorder) = scheduler();

    scheduler.on_transport_disconnected();
    scheduler.on_transport_connected().await;
    scheduler.on_transport_disconnected();
    scheduler.on_transport_connected().await;
    scheduler.on_transport_disconnected();

    advance(PERIOD).await;
    assert_eq!(recorder.count(RefetchCause::Reconnect), 2);
    assert_eq!(recorder.count(RefetchCause::Fallback), 1);
}

// ── Stop ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_cancels_timer() {
    let (mut scheduler, recorder) = scheduler();
    scheduler.on_transport_disconnected();

    scheduler.stop();
    scheduler.stop();
    advance(PERIOD * 3).await;

    assert!(!scheduler.is_polling());
    assert!(recorder.causes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn drop_cancels_timer() {
    let (mut scheduler, recorder) = scheduler();
    scheduler.on_transport_disconnected();

    drop(scheduler);
    advance(PERIOD * 3).await;

    assert!(recorder.causes().is_empty());
}
