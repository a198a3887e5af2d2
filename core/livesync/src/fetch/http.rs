//! REST snapshot fetcher.
//!
//! Issues `GET {base_url}{path}` and decodes the body as a JSON array of
//! entities, optionally wrapped in an envelope object.

use super::SnapshotFetcher;
use crate::config::LiveSyncConfig;
use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Where the entity array sits in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// The body is the array.
    #[default]
    Array,
    /// The body is an object holding the array under this field.
    Field(String),
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpFetcherConfig {
    /// API base (e.g. `https://wms.example.com`).
    pub base_url: String,
    /// Collection path (e.g. `/api/orders`).
    pub path: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Request timeout (ms).
    pub timeout_ms: u64,
    #[serde(default)]
    pub shape: ResponseShape,
}

impl HttpFetcherConfig {
    /// Creates a config using the timeout from `config`.
    pub fn new(base_url: impl Into<String>, path: impl Into<String>, config: &LiveSyncConfig) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            bearer_token: None,
            timeout_ms: config.fetch_timeout_ms,
            shape: ResponseShape::Array,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// The full collection URL.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Fetches a collection over HTTP.
pub struct HttpFetcher<E> {
    config: HttpFetcherConfig,
    client: Client,
    _entity: PhantomData<fn() -> E>,
}

impl<E> HttpFetcher<E> {
    /// Creates a fetcher with its own HTTP client.
    pub fn new(config: HttpFetcherConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| FetchError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Creates a fetcher sharing an existing client.
    pub fn with_client(config: HttpFetcherConfig, client: Client) -> Self {
        Self {
            config,
            client,
            _entity: PhantomData,
        }
    }

    pub fn config(&self) -> &HttpFetcherConfig {
        &self.config
    }
}

#[async_trait]
impl<E> SnapshotFetcher<E> for HttpFetcher<E>
where
    E: DeserializeOwned + Send + 'static,
{
    async fn fetch_all(&self) -> FetchResult<Vec<E>> {
        let url = self.config.url();
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(|e| FetchError::Decode(e.to_string()))?;
        let items = match &self.config.shape {
            ResponseShape::Array => body,
            ResponseShape::Field(field) => match body {
                Value::Object(mut map) => map
                    .remove(field)
                    .ok_or_else(|| FetchError::Decode(format!("response has no `{field}` field")))?,
                _ => return Err(FetchError::Decode("expected an object envelope".to_string())),
            },
        };

        let entities: Vec<E> = serde_json::from_value(items)?;
        debug!(url = %url, count = entities.len(), "fetched collection");
        Ok(entities)
    }
}
