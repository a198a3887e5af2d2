//! Notification side-channel.
//!
//! The engine decides *whether* an update is worth telling the user about and
//! hands over a short summary. How (or if) it is shown is up to the consumer.

use livesync_types::SubscriptionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// How the snapshot changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeReason {
    /// An event was merged in place.
    Patched,
    /// An event forced a full refetch.
    Resynced,
}

/// Summary of one event-driven snapshot change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotice {
    pub subscription: SubscriptionId,
    /// Entity kind label of the subscription (e.g. "orders").
    pub label: String,
    /// Name of the event that caused the change.
    pub event_name: String,
    pub reason: NoticeReason,
    /// Size of the snapshot after the change.
    pub entity_count: usize,
}

impl UpdateNotice {
    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        let noun = if self.entity_count == 1 { "entry" } else { "entries" };
        format!(
            "{} updated ({}, {} {noun})",
            self.label, self.event_name, self.entity_count
        )
    }
}

/// Receives update notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &UpdateNotice);
}

impl<F> Notifier for F
where
    F: Fn(&UpdateNotice) + Send + Sync,
{
    fn notify(&self, notice: &UpdateNotice) {
        self(notice)
    }
}

/// Logs every notice at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &UpdateNotice) {
        info!(
            subscription = %notice.subscription,
            label = %notice.label,
            event = %notice.event_name,
            reason = ?notice.reason,
            "{}",
            notice.summary()
        );
    }
}

/// Forwards notices into an unbounded channel, for consumers that render
/// them on their own task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<UpdateNotice>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UpdateNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: &UpdateNotice) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(notice.clone());
    }
}
