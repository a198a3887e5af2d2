//! Process-level tuning knobs.
//!
//! Per-subscription wiring (fetcher, events, merge) lives in
//! [`crate::SubscriptionConfig`]; this struct carries the durations and
//! defaults shared by every subscription in a process.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default fallback polling period while the transport is down.
pub const DEFAULT_FALLBACK_INTERVAL_SECS: u64 = 60;

/// Configuration shared by subscriptions, fetchers and transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSyncConfig {
    /// How often to refetch while the push transport is disconnected (seconds).
    pub fallback_interval_secs: u64,
    /// Request timeout for HTTP snapshot fetches (ms).
    pub fetch_timeout_ms: u64,
    /// First reconnect delay after the event stream drops (ms).
    pub reconnect_delay_ms: u64,
    /// Upper bound for the doubling reconnect delay (ms).
    pub max_reconnect_delay_ms: u64,
    /// Whether event-driven updates raise a notice by default.
    pub notify_on_update: bool,
}

impl Default for LiveSyncConfig {
    fn default() -> Self {
        Self {
            fallback_interval_secs: DEFAULT_FALLBACK_INTERVAL_SECS,
            fetch_timeout_ms: 30_000,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
            notify_on_update: false,
        }
    }
}

impl LiveSyncConfig {
    /// Checks that every timer-driving value is non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("fallback_interval_secs"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("fetch_timeout_ms"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::ZeroInterval("reconnect_delay_ms"));
        }
        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return Err(ConfigError::BackoffRange);
        }
        Ok(())
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}
