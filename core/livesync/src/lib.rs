//! Real-time snapshot reconciliation for the warehouse dashboard.
//!
//! Keeps an in-memory view of one server-side collection (orders, products,
//! returns) consistent with a continuously changing backend.
//!
//! # Architecture
//!
//! - **Fetcher**: returns the authoritative collection (`GET /api/orders`).
//! - **Transport**: a push connection delivering named events and
//!   connect/disconnect signals (SSE in production, a mock in tests).
//! - **Engine**: owns the snapshot and applies events with the
//!   merge-or-refetch rule.
//! - **Scheduler**: polls while the transport is down and forces one refetch
//!   when it comes back.
//! - **Subscription**: wires the above together and owns their lifetimes.
//!
//! ## Merge-or-refetch
//!
//! An event is either merged by a function that positively identifies the
//! entity it changes, or the whole collection is refetched. The engine never
//! guesses, which makes it correct under redelivery and reordering: a patch
//! is idempotent and anything else resynchronizes to ground truth.
//!
//! # Example
//!
//! ```no_run
//! use livesync::transport::mock::MockTransport;
//! use livesync::{fetch, kinds, FetchResult, Subscription};
//! use livesync_types::warehouse::Order;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = fetch::from_fn(|| async {
//!     FetchResult::Ok(vec![Order::new("o1", "PENDING")])
//! });
//! let transport = Arc::new(MockTransport::connected());
//! let handle = Subscription::start(kinds::orders(Arc::new(fetcher)), transport)?;
//! let _snapshot = handle.snapshot();
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod fetch;
pub mod kinds;
pub mod merge;
mod notify;
pub mod scheduler;
mod snapshot;
pub mod sse;
mod state;
mod subscription;
pub mod transport;

pub use config::{LiveSyncConfig, DEFAULT_FALLBACK_INTERVAL_SECS};
pub use engine::{ApplyOutcome, ReconciliationEngine};
pub use error::{
    ConfigError, FetchError, FetchResult, SubscribeError, TransportError, TransportResult,
};
pub use fetch::{HttpFetcher, HttpFetcherConfig, ResponseShape, SnapshotFetcher};
pub use merge::{always_refetch, patch_by_key, EventFilter, Merge, MergeOutcome};
pub use notify::{ChannelNotifier, NoticeReason, Notifier, TracingNotifier, UpdateNotice};
pub use scheduler::{FallbackScheduler, LinkState, RefetchCause, Resync};
pub use snapshot::Snapshot;
pub use sse::{SseConfig, SseTransport};
pub use state::{LifecycleState, SubscriptionView};
pub use subscription::{EventBinding, Subscription, SubscriptionConfig, SubscriptionHandle};
pub use transport::{DisconnectReason, TransportClient, Unsubscribe};
