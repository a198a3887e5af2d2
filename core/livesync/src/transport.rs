//! Transport layer abstraction.
//!
//! A push transport delivers named events and reports connection changes. The
//! engine never talks to the network for events itself; it registers handlers
//! here and drops them on teardown. The [`mock`] module provides an in-memory
//! transport driven by tests.

use livesync_types::InboundEvent;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Called for every event with the subscribed name.
pub type EventHandler = Arc<dyn Fn(InboundEvent) + Send + Sync>;
/// Called when the transport (re)connects.
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;
/// Called when the transport loses its connection.
pub type DisconnectHandler = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Why a transport reported a disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server ended the stream.
    ServerClosed,
    /// The connection failed.
    Error(String),
    /// The transport was stopped locally.
    Stopped,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ServerClosed => f.write_str("server closed the stream"),
            DisconnectReason::Error(e) => write!(f, "connection error: {e}"),
            DisconnectReason::Stopped => f.write_str("stopped"),
        }
    }
}

/// A push transport the engine can listen to.
///
/// Registration methods return an [`Unsubscribe`] guard; the handler stays
/// registered exactly as long as the guard lives.
pub trait TransportClient: Send + Sync {
    /// Registers a handler for events named `event_name`.
    fn subscribe(&self, event_name: &str, handler: EventHandler) -> Unsubscribe;

    /// Registers a connect listener.
    fn on_connect(&self, handler: ConnectHandler) -> Unsubscribe;

    /// Registers a disconnect listener.
    fn on_disconnect(&self, handler: DisconnectHandler) -> Unsubscribe;

    /// Returns whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Deregisters a handler when dropped or when [`Unsubscribe::unsubscribe`]
/// is called.
#[must_use = "dropping the guard deregisters the handler immediately"]
pub struct Unsubscribe {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard that releases nothing.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Deregisters now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Handlers {
    next_id: u64,
    events: Vec<(u64, String, EventHandler)>,
    connect: Vec<(u64, ConnectHandler)>,
    disconnect: Vec<(u64, DisconnectHandler)>,
}

impl Handlers {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Handler bookkeeping shared by transport implementations.
///
/// Dispatch clones the matching handlers out of the lock before calling them,
/// so a handler may register or deregister without deadlocking.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<Handlers>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, event_name: &str, handler: EventHandler) -> Unsubscribe {
        let id = {
            let mut handlers = self.write();
            let id = handlers.next_id();
            handlers.events.push((id, event_name.to_string(), handler));
            id
        };
        self.release_with(move |h| h.events.retain(|(i, _, _)| *i != id))
    }

    pub fn add_connect(&self, handler: ConnectHandler) -> Unsubscribe {
        let id = {
            let mut handlers = self.write();
            let id = handlers.next_id();
            handlers.connect.push((id, handler));
            id
        };
        self.release_with(move |h| h.connect.retain(|(i, _)| *i != id))
    }

    pub fn add_disconnect(&self, handler: DisconnectHandler) -> Unsubscribe {
        let id = {
            let mut handlers = self.write();
            let id = handlers.next_id();
            handlers.disconnect.push((id, handler));
            id
        };
        self.release_with(move |h| h.disconnect.retain(|(i, _)| *i != id))
    }

    /// Delivers an event to every handler registered for its name. Returns
    /// the number of handlers called.
    pub fn dispatch_event(&self, event: &InboundEvent) -> usize {
        let targets: Vec<EventHandler> = self
            .read()
            .events
            .iter()
            .filter(|(_, name, _)| *name == event.name)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();
        for handler in &targets {
            handler(event.clone());
        }
        targets.len()
    }

    pub fn dispatch_connect(&self) -> usize {
        let targets: Vec<ConnectHandler> =
            self.read().connect.iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in &targets {
            handler();
        }
        targets.len()
    }

    pub fn dispatch_disconnect(&self, reason: &DisconnectReason) -> usize {
        let targets: Vec<DisconnectHandler> =
            self.read().disconnect.iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in &targets {
            handler(reason.clone());
        }
        targets.len()
    }

    /// Number of handlers registered for `event_name`.
    pub fn event_listeners(&self, event_name: &str) -> usize {
        self.read()
            .events
            .iter()
            .filter(|(_, name, _)| name == event_name)
            .count()
    }

    /// Total number of registered handlers of any kind.
    pub fn listener_count(&self) -> usize {
        let handlers = self.read();
        handlers.events.len() + handlers.connect.len() + handlers.disconnect.len()
    }

    fn release_with(&self, remove: impl FnOnce(&mut Handlers) + Send + Sync + 'static) -> Unsubscribe {
        let weak: Weak<RwLock<Handlers>> = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut handlers = inner.write().unwrap_or_else(PoisonError::into_inner);
                remove(&mut handlers);
            }
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Handlers> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Handlers> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Mock transport for testing.
pub mod mock {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// An in-memory transport. Tests drive connection changes and emit
    /// events by hand.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        registry: HandlerRegistry,
        connected: AtomicBool,
        /// Last server id handed out by `emit`.
        sequence: AtomicU64,
    }

    impl MockTransport {
        /// Creates a transport in the disconnected state that has never
        /// connected.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a transport that is already connected. No connect
        /// notification is ever sent for this initial state.
        pub fn connected() -> Self {
            let transport = Self::default();
            transport.connected.store(true, Ordering::SeqCst);
            transport
        }

        /// Marks the transport connected and notifies connect listeners.
        /// Does nothing if already connected.
        pub fn connect(&self) -> usize {
            if self.connected.swap(true, Ordering::SeqCst) {
                return 0;
            }
            self.registry.dispatch_connect()
        }

        /// Marks the transport disconnected and notifies disconnect
        /// listeners. Does nothing if already disconnected.
        pub fn disconnect(&self, reason: DisconnectReason) -> usize {
            if !self.connected.swap(false, Ordering::SeqCst) {
                return 0;
            }
            self.registry.dispatch_disconnect(&reason)
        }

        /// Delivers an event to its subscribers, numbered the way a server
        /// numbers its stream (`1`, `2`, ...). Events emitted while
        /// disconnected are lost, like on a real connection, but still use up
        /// a number.
        pub fn emit(&self, event_name: &str, payload: Value) -> usize {
            let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.is_connected() {
                return 0;
            }
            let event = InboundEvent::new(event_name, payload).with_transport_id(id.to_string());
            self.deliver(event)
        }

        /// Delivers a prepared event regardless of connection state. Used to
        /// replay a specific event (same id) more than once.
        pub fn deliver(&self, event: InboundEvent) -> usize {
            self.registry.dispatch_event(&event)
        }

        pub fn listener_count(&self) -> usize {
            self.registry.listener_count()
        }

        pub fn event_listeners(&self, event_name: &str) -> usize {
            self.registry.event_listeners(event_name)
        }
    }

    impl TransportClient for MockTransport {
        fn subscribe(&self, event_name: &str, handler: EventHandler) -> Unsubscribe {
            self.registry.add_event(event_name, handler)
        }

        fn on_connect(&self, handler: ConnectHandler) -> Unsubscribe {
            self.registry.add_connect(handler)
        }

        fn on_disconnect(&self, handler: DisconnectHandler) -> Unsubscribe {
            self.registry.add_disconnect(handler)
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }
}
