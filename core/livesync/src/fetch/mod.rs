//! Snapshot fetchers.
//!
//! A fetcher returns the current authoritative collection of one entity kind.
//! It must be idempotent: the engine calls it on mount, on ambiguous events,
//! on every fallback tick and on reconnect.

pub mod http;

use crate::error::FetchResult;
use async_trait::async_trait;
use std::future::Future;

pub use http::{HttpFetcher, HttpFetcherConfig, ResponseShape};

/// Fetches the full collection of one entity kind.
#[async_trait]
pub trait SnapshotFetcher<E>: Send + Sync {
    async fn fetch_all(&self) -> FetchResult<Vec<E>>;
}

/// A fetcher backed by an async closure.
pub struct FnFetcher<F>(F);

/// Wraps an async closure as a [`SnapshotFetcher`].
pub fn from_fn<E, F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = FetchResult<Vec<E>>> + Send + 'static,
{
    FnFetcher(f)
}

#[async_trait]
impl<E, F, Fut> SnapshotFetcher<E> for FnFetcher<F>
where
    E: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = FetchResult<Vec<E>>> + Send + 'static,
{
    async fn fetch_all(&self) -> FetchResult<Vec<E>> {
        (self.0)().await
    }
}
