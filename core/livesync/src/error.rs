//! Error types for the reconciliation layer.
//!
//! Only fetch failures ever reach a consumer, and then only as a non-fatal
//! `last_error` next to the last good snapshot. An ambiguous merge is not an
//! error at all (see [`crate::MergeOutcome::Unknown`]) and a transport drop is
//! a state transition handled by the fallback scheduler.

use thiserror::Error;

/// Result type for snapshot fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for transport lifecycle operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// The snapshot fetcher failed.
///
/// Cloneable so the same error can sit in every observer's view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network error (connection refused, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected collection.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request exceeded the fetcher's timeout.
    #[error("fetch timed out")]
    Timeout,

    /// The subscription was torn down while the fetch was in flight.
    #[error("fetch cancelled by teardown")]
    Cancelled,

    /// The fetcher is misconfigured.
    #[error("invalid fetcher configuration: {0}")]
    Config(String),
}

impl FetchError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode(_) | FetchError::Cancelled | FetchError::Config(_) => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// The push transport failed to start, stop or stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not open the event stream.
    #[error("connect failed: {0}")]
    Connect(String),

    /// `start` was called on a running transport.
    #[error("transport already running")]
    AlreadyRunning,

    /// `stop` was called on a stopped transport.
    #[error("transport not running")]
    NotRunning,
}

/// A configuration value is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An event name was empty.
    #[error("event name must not be empty")]
    EmptyEventName,

    /// The subscription listens to no events.
    #[error("subscription must listen to at least one event")]
    NoEvents,

    /// A duration that drives a timer was zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    /// The reconnect backoff ceiling is below its starting delay.
    #[error("max_reconnect_delay_ms must be at least reconnect_delay_ms")]
    BackoffRange,

    /// Two bindings listen to the same event name.
    #[error("event {0} is bound more than once")]
    DuplicateEvent(String),
}

/// Starting a subscription failed. Nothing is left registered on the
/// transport when this is returned.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("invalid subscription config: {0}")]
    Config(#[from] ConfigError),
}
