//! Warehouse collection watcher
//!
//! Mirrors one dashboard collection (orders, products or returns) from the
//! backend, keeps it current over the event stream, and serves the result
//! over a small read-only HTTP API.
//!
//! Usage:
//!   livesync-watch --api-base https://wms.example.com \
//!       --events-url https://wms.example.com/api/events --kind orders

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use livesync::{
    kinds, HttpFetcher, HttpFetcherConfig, LiveSyncConfig, ResponseShape, SnapshotFetcher,
    SseConfig, SseTransport, Subscription, SubscriptionConfig, TracingNotifier, TransportClient,
    DEFAULT_FALLBACK_INTERVAL_SECS,
};
use livesync_types::Entity;
use livesync_watch::{build_router, Mirror};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Orders,
    Products,
    Returns,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Orders => kinds::ORDERS,
            Kind::Products => kinds::PRODUCTS,
            Kind::Returns => kinds::RETURNS,
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            Kind::Orders => "/api/orders",
            Kind::Products => "/api/products",
            Kind::Returns => "/api/returns",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "livesync-watch")]
#[command(about = "Mirror a warehouse collection and serve it over HTTP")]
struct Args {
    /// Backend API base URL
    #[arg(long)]
    api_base: String,

    /// Server-sent events endpoint
    #[arg(long)]
    events_url: String,

    /// Collection to mirror
    #[arg(short, long, value_enum, default_value = "orders")]
    kind: Kind,

    /// Override the collection path (defaults per kind)
    #[arg(long)]
    path: Option<String>,

    /// Bearer token for both the API and the event stream
    #[arg(long, env = "LIVESYNC_TOKEN")]
    token: Option<String>,

    /// HTTP API port for the status endpoint
    #[arg(long, default_value = "4080")]
    http_port: u16,

    /// Polling period while the event stream is down (seconds)
    #[arg(long, default_value_t = DEFAULT_FALLBACK_INTERVAL_SECS)]
    fallback_secs: u64,

    /// Field holding the entity array when the API wraps its response
    #[arg(long)]
    envelope: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = LiveSyncConfig {
        fallback_interval_secs: args.fallback_secs,
        ..LiveSyncConfig::default()
    };
    config.validate().context("Invalid configuration")?;

    info!("Watching {} from {}", args.kind.name(), args.api_base);

    let mut sse_config = SseConfig::from_config(&args.events_url, &config);
    if let Some(token) = &args.token {
        sse_config = sse_config.with_bearer_token(token);
    }
    let transport = Arc::new(SseTransport::new(sse_config).context("Invalid events URL")?);
    transport.start().context("Failed to start event stream")?;

    let result = match args.kind {
        Kind::Orders => serve(&args, &config, transport.clone(), kinds::orders).await,
        Kind::Products => serve(&args, &config, transport.clone(), kinds::products).await,
        Kind::Returns => serve(&args, &config, transport.clone(), kinds::returns).await,
    };

    if transport.is_running() {
        transport.stop().context("Failed to stop event stream")?;
    }
    info!("Watcher stopped");
    result
}

async fn serve<E>(
    args: &Args,
    config: &LiveSyncConfig,
    transport: Arc<SseTransport>,
    build: fn(Arc<dyn SnapshotFetcher<E>>) -> SubscriptionConfig<E>,
) -> Result<()>
where
    E: Entity + Serialize + serde::de::DeserializeOwned,
{
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| args.kind.default_path().to_string());
    let mut fetcher_config = HttpFetcherConfig::new(&args.api_base, path, config);
    if let Some(token) = &args.token {
        fetcher_config = fetcher_config.with_bearer_token(token);
    }
    if let Some(field) = &args.envelope {
        fetcher_config = fetcher_config.with_shape(ResponseShape::Field(field.clone()));
    }
    let fetcher: Arc<dyn SnapshotFetcher<E>> =
        Arc::new(HttpFetcher::new(fetcher_config).context("Failed to build HTTP client")?);

    let subscription = build(fetcher)
        .apply_defaults(config)
        .with_notifier(Arc::new(TracingNotifier));
    let transport: Arc<dyn TransportClient> = transport;
    let handle = Subscription::start(subscription, transport)
        .context("Failed to start subscription")?;

    let mirror = Arc::new(Mirror::new(args.kind.name(), handle.watch()));
    let app = build_router(mirror);
    let addr = format!("0.0.0.0:{}", args.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP API on {}", addr))?;
    info!("HTTP API listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP API failed");

    handle.shutdown().await;
    served
}
