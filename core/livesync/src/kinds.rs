//! Ready-made subscription configs for the warehouse entity kinds.
//!
//! Only `order:synced` carries enough to patch in place (the order id and its
//! new status). Every other event names an entity whose full server-side
//! state the client cannot reconstruct, so those always resync.

use crate::fetch::SnapshotFetcher;
use crate::merge::{always_refetch, MergeOutcome};
use crate::snapshot::Snapshot;
use crate::subscription::SubscriptionConfig;
use livesync_types::warehouse::{events, Order, OrderSynced, Product, ReturnRequest};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const ORDERS: &str = "orders";
pub const PRODUCTS: &str = "products";
pub const RETURNS: &str = "returns";

/// Patches the status of a known order. An unknown order id, or a payload
/// that is not an `OrderSynced`, answers `Unknown`.
pub fn merge_order_synced(current: &Snapshot<Order>, payload: &Value) -> MergeOutcome<Order> {
    let Ok(synced) = OrderSynced::deserialize(payload) else {
        return MergeOutcome::Unknown;
    };
    current
        .patched(&synced.order_id, |order| order.status = synced.status.clone())
        .into()
}

/// Orders: patched on `order:synced`, resynced on create and update.
pub fn orders(fetcher: Arc<dyn SnapshotFetcher<Order>>) -> SubscriptionConfig<Order> {
    SubscriptionConfig::new(fetcher, events::ORDER_SYNCED, merge_order_synced)
        .also_on(events::ORDER_CREATED, always_refetch())
        .also_on(events::ORDER_UPDATED, always_refetch())
        .with_label(ORDERS)
}

/// Products: every change resyncs.
pub fn products(fetcher: Arc<dyn SnapshotFetcher<Product>>) -> SubscriptionConfig<Product> {
    SubscriptionConfig::new(fetcher, events::PRODUCT_UPDATED, always_refetch())
        .also_on(events::PRODUCT_CREATED, always_refetch())
        .with_label(PRODUCTS)
}

/// Returns: every change resyncs.
pub fn returns(
    fetcher: Arc<dyn SnapshotFetcher<ReturnRequest>>,
) -> SubscriptionConfig<ReturnRequest> {
    SubscriptionConfig::new(fetcher, events::RETURN_CREATED, always_refetch())
        .also_on(events::RETURN_UPDATED, always_refetch())
        .with_label(RETURNS)
}
