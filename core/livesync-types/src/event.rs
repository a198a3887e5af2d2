//! The inbound event envelope.
//!
//! Events arrive from the push transport as a name plus an opaque JSON
//! payload. Delivery is at-least-once and unordered: the same payload may
//! show up twice, and an update may arrive before the create it depends on.
//! Each delivery gets a fresh local [`EventId`] so duplicates can still be
//! told apart in logs.

use crate::{Error, Result, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for one delivery of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new event ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named event delivered by the push transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Local delivery identifier.
    pub id: EventId,

    /// Event name as published by the server (e.g. `order:synced`).
    pub name: String,

    /// Opaque payload. Only merge and filter functions look inside.
    pub payload: serde_json::Value,

    /// When the transport handed this event over.
    pub received_at: Timestamp,

    /// Server-assigned id, when the transport carries one (SSE `id:` field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<String>,
}

impl InboundEvent {
    /// Creates an event received now.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            name: name.into(),
            payload,
            received_at: Timestamp::now(),
            transport_id: None,
        }
    }

    /// Attaches the server-assigned id.
    #[must_use]
    pub fn with_transport_id(mut self, id: impl Into<String>) -> Self {
        self.transport_id = Some(id.into());
        self
    }

    /// Decodes the payload into a typed structure.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone()).map_err(|e| Error::InvalidPayload {
            event: self.name.clone(),
            reason: e.to_string(),
        })
    }

    /// Reads a top-level string field of the payload.
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(serde_json::Value::as_str)
    }
}
