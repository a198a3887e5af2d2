//! Warehouse records mirrored by the dashboard and the events that touch them.
//!
//! Only the fields the reconciliation layer needs are typed. Everything else
//! the backend sends is kept verbatim in `extra` so a patched record
//! serializes back to what the server produced.

use crate::Entity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event names published by the backend.
pub mod events {
    /// An order's status was synchronized from the fulfillment system.
    pub const ORDER_SYNCED: &str = "order:synced";
    /// A new order was imported from a commerce platform.
    pub const ORDER_CREATED: &str = "order:created";
    /// An order changed in a way that needs a full reload.
    pub const ORDER_UPDATED: &str = "order:updated";
    /// A product was created.
    pub const PRODUCT_CREATED: &str = "product:created";
    /// A product's stock or catalog data changed.
    pub const PRODUCT_UPDATED: &str = "product:updated";
    /// A return was opened.
    pub const RETURN_CREATED: &str = "return:created";
    /// A return changed status.
    pub const RETURN_UPDATED: &str = "return:updated";
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Creates an order with no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            extra: Map::new(),
        }
    }
}

impl Entity for Order {
    fn key(&self) -> &str {
        &self.id
    }
}

/// A catalog product with warehouse stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub sku: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Creates a product with no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            extra: Map::new(),
        }
    }
}

impl Entity for Product {
    fn key(&self) -> &str {
        &self.id
    }
}

/// A customer return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReturnRequest {
    /// Creates a return with no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order_id: None,
            status: status.into(),
            extra: Map::new(),
        }
    }
}

impl Entity for ReturnRequest {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Payload of [`events::ORDER_SYNCED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSynced {
    pub order_id: String,
    pub status: String,
}
