//! SSE push transport.
//!
//! Keeps one long-lived `GET` open against the event endpoint through
//! [`reqwest_eventsource::EventSource`] and hands each message to the handlers
//! registered for its event name. The event source resumes with
//! `Last-Event-ID`, honours the server's `retry:` field and backs off
//! exponentially between attempts; this module maps its open, message and
//! error items onto connect, dispatch and disconnect signals.

use crate::config::LiveSyncConfig;
use crate::error::{TransportError, TransportResult};
use crate::transport::{
    ConnectHandler, DisconnectHandler, DisconnectReason, EventHandler, HandlerRegistry,
    TransportClient, Unsubscribe,
};
use futures::StreamExt;
use livesync_types::InboundEvent;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use reqwest_eventsource::retry::ExponentialBackoff;
use reqwest_eventsource::{Error as SourceError, Event, EventSource};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for [`SseTransport`].
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Event stream endpoint.
    pub url: String,
    pub bearer_token: Option<String>,
    /// First reconnect delay; doubles after each failed attempt.
    pub reconnect_delay: Duration,
    /// Ceiling for the reconnect delay.
    pub max_reconnect_delay: Duration,
}

impl SseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(url, &LiveSyncConfig::default())
    }

    /// Takes the backoff settings from `config`.
    pub fn from_config(url: impl Into<String>, config: &LiveSyncConfig) -> Self {
        Self {
            url: url.into(),
            bearer_token: None,
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_delay: config.max_reconnect_delay(),
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

struct Shared {
    client: Client,
    config: SseConfig,
    registry: HandlerRegistry,
    connected: AtomicBool,
}

/// Push transport reading a `text/event-stream` endpoint.
pub struct SseTransport {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    /// Creates a stopped transport.
    pub fn new(config: SseConfig) -> TransportResult<Self> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(TransportError::Connect(format!(
                "unsupported event stream url: {}",
                config.url
            )));
        }
        // No overall timeout: the response body is meant to stay open.
        let client = Client::builder()
            .connect_timeout(config.max_reconnect_delay.max(Duration::from_secs(5)))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                config,
                registry: HandlerRegistry::new(),
                connected: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        })
    }

    /// Starts the connection loop. Must be called inside a Tokio runtime.
    pub fn start(&self) -> TransportResult<()> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(TransportError::AlreadyRunning);
        }
        let source = self.shared.open()?;
        info!(url = %self.shared.config.url, "starting event stream");
        *task = Some(tokio::spawn(run(Arc::clone(&self.shared), source)));
        Ok(())
    }

    /// Stops the connection loop. Listeners see a `Stopped` disconnect if
    /// the stream was open.
    pub fn stop(&self) -> TransportResult<()> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TransportError::NotRunning)?;
        task.abort();
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            self.shared
                .registry
                .dispatch_disconnect(&DisconnectReason::Stopped);
        }
        info!(url = %self.shared.config.url, "event stream stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn config(&self) -> &SseConfig {
        &self.shared.config
    }
}

impl TransportClient for SseTransport {
    fn subscribe(&self, event_name: &str, handler: EventHandler) -> Unsubscribe {
        self.shared.registry.add_event(event_name, handler)
    }

    fn on_connect(&self, handler: ConnectHandler) -> Unsubscribe {
        self.shared.registry.add_connect(handler)
    }

    fn on_disconnect(&self, handler: DisconnectHandler) -> Unsubscribe {
        self.shared.registry.add_disconnect(handler)
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Pumps the event source until it gives up or the task is aborted.
async fn run(shared: Arc<Shared>, mut source: EventSource) {
    while let Some(item) = source.next().await {
        match item {
            Ok(Event::Open) => {
                if !shared.connected.swap(true, Ordering::SeqCst) {
                    info!(url = %shared.config.url, "event stream connected");
                    shared.registry.dispatch_connect();
                }
            }
            Ok(Event::Message(message)) => shared.deliver(message.event, message.data, message.id),
            Err(err) => {
                let reason = match err {
                    SourceError::StreamEnded => DisconnectReason::ServerClosed,
                    other => DisconnectReason::Error(other.to_string()),
                };
                if shared.connected.swap(false, Ordering::SeqCst) {
                    warn!(url = %shared.config.url, %reason, "event stream disconnected");
                    shared.registry.dispatch_disconnect(&reason);
                } else {
                    debug!(url = %shared.config.url, %reason, "event stream connect attempt failed");
                }
            }
        }
    }
    if shared.connected.swap(false, Ordering::SeqCst) {
        shared
            .registry
            .dispatch_disconnect(&DisconnectReason::ServerClosed);
    }
    warn!(url = %shared.config.url, "event stream closed for good");
}

impl Shared {
    fn open(&self) -> TransportResult<EventSource> {
        let mut request = self
            .client
            .get(&self.config.url)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }
        let mut source =
            EventSource::new(request).map_err(|e| TransportError::Connect(e.to_string()))?;
        source.set_retry_policy(Box::new(ExponentialBackoff::new(
            self.config.reconnect_delay,
            2.0,
            Some(self.config.max_reconnect_delay),
            None,
        )));
        Ok(source)
    }

    /// Dispatches one message. Data that is not JSON is passed on as a
    /// string; the server's `id:` becomes the event's transport id.
    fn deliver(&self, name: String, data: String, id: String) {
        let payload = serde_json::from_str(&data).unwrap_or(Value::String(data));
        let mut event = InboundEvent::new(name, payload);
        if !id.is_empty() {
            event = event.with_transport_id(id);
        }
        let handled = self.registry.dispatch_event(&event);
        if handled == 0 {
            debug!(event = %event.name, "no handler for event");
        }
    }
}
