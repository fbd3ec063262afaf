//! Registry of multiplexed WebSocket connections.
//!
//! Manages many logical connections keyed by [`ConnectionId`]. Callers create
//! an entry with its handler, connect it to a URL, send frames, and destroy
//! it. All socket activity flows back through one dispatcher task per
//! registry, which applies state transitions and invokes handlers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │            ConnectionRegistry             │
//! │  1 → Connection { state, socket, .. }     │
//! │  2 → Connection { state, socket, .. }     │
//! └──────┬─────────────────────────▲──────────┘
//!        │ SocketCommand           │ state transitions
//!  ┌─────▼─────────┐  SocketEvent  ┌┴───────────┐
//!  │ socket tasks  ├──────────────►│ dispatcher │
//!  └───────────────┘               └─────┬──────┘
//!                                        ▼
//!                      on_open / on_message / on_close
//! ```
//!
//! # Operations by State
//!
//! | Operation | Unknown id | Undefined | Connecting | Connected | Disconnected |
//! |-----------|------------|-----------|------------|-----------|--------------|
//! | `connect` | not found | starts | invalid state | invalid state | invalid state |
//! | `send` | not found | not connected | queued | written | closed |
//! | `disconnect` | not found | not connected | closes | closes | no-op |
//! | `destroy` | no-op | removes | closes, removes | closes, removes | removes |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::close_code;
use super::connection::{SocketEvent, SocketEventKind, SocketHandle};
use super::handler::ConnectionHandler;
use super::options::ConnectionOptions;
use super::state::ConnectionState;

// ============================================================================
// Connection
// ============================================================================

/// Registry record for one logical connection.
struct Connection {
    /// URL passed to `connect`, if any.
    url: Option<Url>,
    /// Current lifecycle state.
    state: ConnectionState,
    /// Handler registered at creation.
    handler: Arc<dyn ConnectionHandler>,
    /// Socket task, present once `connect` succeeded.
    socket: Option<SocketHandle>,
}

// ============================================================================
// RegistryInner
// ============================================================================

struct Table {
    connections: FxHashMap<ConnectionId, Connection>,
    next_id: ConnectionId,
}

struct RegistryInner {
    table: RwLock<Table>,
    /// Runtime the dispatcher and socket tasks run on.
    runtime: Handle,
    options: ConnectionOptions,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
}

impl RegistryInner {
    /// Moves a connecting entry to `Connected`.
    ///
    /// Returns `true` if the entry still exists.
    fn mark_open(&self, id: ConnectionId) -> bool {
        let mut table = self.table.write();
        let Some(connection) = table.connections.get_mut(&id) else {
            return false;
        };

        if connection.state == ConnectionState::Connecting {
            connection.state = ConnectionState::Connected;
        }

        true
    }

    /// Moves an entry to `Disconnected` if it still exists.
    fn mark_closed(&self, id: ConnectionId) {
        if let Some(connection) = self.table.write().connections.get_mut(&id) {
            connection.state = ConnectionState::Disconnected;
        }
    }

    fn contains(&self, id: ConnectionId) -> bool {
        self.table.read().connections.contains_key(&id)
    }
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Handle to a set of multiplexed WebSocket connections.
///
/// Cheap to clone; clones share the same connections. Thread-safe, and
/// every operation is non-blocking. Dropping the last handle closes all
/// sockets.
///
/// # Example
///
/// ```ignore
/// let registry = ConnectionRegistry::new()?;
/// let (handler, mut events) = EventChannel::new();
///
/// let id = registry.create(handler);
/// registry.connect(id, "ws://127.0.0.1:46657/queryws")?;
///
/// while let Some((id, event)) = events.recv().await {
///     if event == ConnectionEvent::Opened {
///         registry.send(id, b"hello".to_vec())?;
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

// ============================================================================
// ConnectionRegistry - Constructor
// ============================================================================

impl ConnectionRegistry {
    /// Creates a registry with default [`ConnectionOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_options(ConnectionOptions::default())
    }

    /// Creates a registry whose sockets use `options`.
    ///
    /// Captures the current runtime. The dispatcher and every socket task
    /// run on it, so the registry can be used from threads outside it.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::Config`] if called outside a Tokio runtime
    pub fn with_options(options: ConnectionOptions) -> Result<Self> {
        options.validate()?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("ConnectionRegistry requires a Tokio runtime"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(RegistryInner {
            table: RwLock::new(Table {
                connections: FxHashMap::default(),
                next_id: ConnectionId::FIRST,
            }),
            runtime,
            options,
            events_tx,
        });

        inner
            .runtime
            .spawn(dispatch(Arc::downgrade(&inner), events_rx));

        debug!("ConnectionRegistry started");

        Ok(Self { inner })
    }
}

// ============================================================================
// ConnectionRegistry - Public API
// ============================================================================

impl ConnectionRegistry {
    /// Registers a new connection in `Undefined` state.
    ///
    /// IDs are assigned in increasing order and never reused.
    pub fn create(&self, handler: impl ConnectionHandler) -> ConnectionId {
        let mut table = self.inner.table.write();

        let id = table.next_id;
        table.next_id = id.next();

        table.connections.insert(
            id,
            Connection {
                url: None,
                state: ConnectionState::Undefined,
                handler: Arc::new(handler),
                socket: None,
            },
        );

        debug!(connection_id = %id, "Connection created");
        id
    }

    /// Opens a socket to `url` for connection `id`.
    ///
    /// Returns once the handshake has started. The outcome arrives as
    /// `on_open` or `on_close`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not a `ws://` or `wss://` URL
    /// - [`Error::ConnectionNotFound`] if `id` is unknown
    /// - [`Error::InvalidState`] if the connection is not `Undefined`
    pub fn connect(&self, id: ConnectionId, url: &str) -> Result<()> {
        let url = parse_ws_url(url)?;

        let mut table = self.inner.table.write();
        let connection = table
            .connections
            .get_mut(&id)
            .ok_or_else(|| Error::connection_not_found(id))?;

        if connection.state != ConnectionState::Undefined {
            return Err(Error::invalid_state(
                id,
                connection.state,
                ConnectionState::Undefined,
            ));
        }

        let socket = SocketHandle::spawn(
            &self.inner.runtime,
            id,
            url.clone(),
            self.inner.options.to_ws_config(),
            Arc::clone(&connection.handler),
            self.inner.events_tx.clone(),
        );

        info!(connection_id = %id, url = %url, "Connecting");

        connection.socket = Some(socket);
        connection.state = ConnectionState::Connecting;
        connection.url = Some(url);

        Ok(())
    }

    /// Sends a binary frame on connection `id`.
    ///
    /// Frames sent while `Connecting` are written once the socket opens,
    /// and dropped if it never does.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionNotFound`] if `id` is unknown
    /// - [`Error::NotConnected`] if `connect` was never called
    /// - [`Error::ConnectionClosed`] if the socket has terminated
    pub fn send(&self, id: ConnectionId, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = payload.into();
        self.with_socket(id, payload.len(), |socket| socket.send(payload))
    }

    /// Sends a text frame on connection `id`.
    ///
    /// Same semantics as [`ConnectionRegistry::send`].
    ///
    /// # Errors
    ///
    /// See [`ConnectionRegistry::send`].
    pub fn send_text(&self, id: ConnectionId, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.with_socket(id, text.len(), |socket| socket.send_text(text))
    }

    fn with_socket<F>(&self, id: ConnectionId, len: usize, send: F) -> Result<()>
    where
        F: FnOnce(&SocketHandle) -> Result<()>,
    {
        let table = self.inner.table.read();
        let connection = table
            .connections
            .get(&id)
            .ok_or_else(|| Error::connection_not_found(id))?;

        let socket = connection
            .socket
            .as_ref()
            .ok_or_else(|| Error::not_connected(id))?;

        trace!(connection_id = %id, len, state = %connection.state, "Sending frame");
        send(socket)
    }

    /// Requests the socket of connection `id` to close.
    ///
    /// The entry stays registered and moves to `Disconnecting`. Its handler
    /// receives `on_close` when the socket terminates.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionNotFound`] if `id` is unknown
    /// - [`Error::NotConnected`] if `connect` was never called
    pub fn disconnect(&self, id: ConnectionId) -> Result<()> {
        let mut table = self.inner.table.write();
        let connection = table
            .connections
            .get_mut(&id)
            .ok_or_else(|| Error::connection_not_found(id))?;

        match connection.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                connection.state = ConnectionState::Disconnecting;
                if let Some(socket) = &connection.socket {
                    socket.close();
                }
                debug!(connection_id = %id, "Disconnect requested");
                Ok(())
            }
            ConnectionState::Undefined => Err(Error::not_connected(id)),
            _ => Ok(()),
        }
    }

    /// Closes and removes connection `id`. Unknown IDs are ignored.
    ///
    /// The handler still receives the final `on_close`.
    pub fn destroy(&self, id: ConnectionId) {
        let removed = self.inner.table.write().connections.remove(&id);

        if let Some(connection) = removed {
            if let Some(socket) = &connection.socket {
                socket.close();
            }
            debug!(connection_id = %id, state = %connection.state, "Connection destroyed");
        }
    }

    /// Returns the state of connection `id`.
    ///
    /// Unknown IDs report [`ConnectionState::NotApplicable`].
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        self.inner
            .table
            .read()
            .connections
            .get(&id)
            .map_or(ConnectionState::NotApplicable, |c| c.state)
    }

    /// Returns the URL connection `id` was connected to.
    #[must_use]
    pub fn url(&self, id: ConnectionId) -> Option<Url> {
        self.inner
            .table
            .read()
            .connections
            .get(&id)
            .and_then(|c| c.url.clone())
    }

    /// Returns `true` if connection `id` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.contains(id)
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.table.read().connections.len()
    }

    /// Returns the options sockets are opened with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }
}

// ============================================================================
// ConnectionRegistry - Lifecycle
// ============================================================================

impl ConnectionRegistry {
    /// Closes and removes every connection.
    pub fn shutdown(&self) {
        info!("ConnectionRegistry shutting down");

        let connections: Vec<_> = {
            let mut table = self.inner.table.write();
            table.connections.drain().collect()
        };

        for (id, connection) in connections {
            if let Some(socket) = &connection.socket {
                socket.close();
            }
            debug!(connection_id = %id, "Connection closed during shutdown");
        }

        info!("ConnectionRegistry shutdown complete");
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connection_count())
            .field("options", &self.inner.options)
            .finish()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Applies socket events to the table and invokes handlers.
///
/// Runs until the registry is dropped and every socket task has finished.
async fn dispatch(inner: Weak<RegistryInner>, mut events_rx: mpsc::UnboundedReceiver<SocketEvent>) {
    trace!("Dispatcher started");

    while let Some(SocketEvent { id, handler, kind }) = events_rx.recv().await {
        match kind {
            SocketEventKind::Opened => {
                let known = inner.upgrade().is_some_and(|inner| inner.mark_open(id));
                if known {
                    handler.on_open(id);
                } else {
                    trace!(connection_id = %id, "Open for removed connection ignored");
                }
            }

            SocketEventKind::Message(payload) => {
                let known = inner.upgrade().is_some_and(|inner| inner.contains(id));
                if known {
                    handler.on_message(id, payload);
                } else {
                    trace!(connection_id = %id, "Message for removed connection dropped");
                }
            }

            SocketEventKind::Closed { code, reason } => {
                if let Some(inner) = inner.upgrade() {
                    inner.mark_closed(id);
                }

                let error = close_code::translate(code, Some(reason.as_str()));
                debug!(connection_id = %id, code, error = ?error, "Connection closed");
                handler.on_close(id, error);
            }
        }
    }

    trace!("Dispatcher terminated");
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_ws_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_url(raw, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::invalid_url(
            raw,
            format!("unsupported scheme '{other}', expected ws or wss"),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================
