//! Core type definitions for livesync.
//!
//! This crate defines the plain data shared by the reconciliation layer and
//! its consumers:
//! - Identifiers (entity keys, subscription and delivery ids)
//! - Wall-clock timestamps for fetches and deliveries
//! - The inbound event envelope delivered by a push transport
//! - The `Entity` trait, the identity-key extractor for mirrored records
//! - Warehouse records (orders, products, returns) and their event payloads
//!
//! Nothing here performs I/O. The engine itself lives in the `livesync` crate.

mod entity;
mod event;
mod ids;
mod timestamp;
pub mod warehouse;

pub use entity::Entity;
pub use event::{EventId, InboundEvent};
pub use ids::{EntityKey, SubscriptionId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An event payload did not match the expected structure.
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },
}
