//! Connection event delivery.
//!
//! The registry reports socket activity through a [`ConnectionHandler`]
//! registered at creation time. Handlers run on the registry's dispatcher
//! task one call at a time, so they should return quickly. For async
//! consumers, [`EventChannel`] forwards every event into an `mpsc` channel.
//!
//! Per connection, events arrive in this order:
//!
//! - `on_open` at most once
//! - `on_message` once per inbound frame, in arrival order
//! - `on_close` exactly once for every connection that was connected

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ConnectionId;

use super::close_code::ConnectionError;

// ============================================================================
// ConnectionHandler
// ============================================================================

/// Observer for one connection's socket events.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// The socket opened.
    fn on_open(&self, _id: ConnectionId) {}

    /// A text or binary frame arrived.
    fn on_message(&self, _id: ConnectionId, _payload: Vec<u8>) {}

    /// The socket closed. `error` is `None` for a normal closure.
    fn on_close(&self, _id: ConnectionId, _error: Option<ConnectionError>) {}
}

impl<T> ConnectionHandler for Arc<T>
where
    T: ConnectionHandler + ?Sized,
{
    fn on_open(&self, id: ConnectionId) {
        (**self).on_open(id);
    }

    fn on_message(&self, id: ConnectionId, payload: Vec<u8>) {
        (**self).on_message(id, payload);
    }

    fn on_close(&self, id: ConnectionId, error: Option<ConnectionError>) {
        (**self).on_close(id, error);
    }
}

/// Handler that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl ConnectionHandler for NoopHandler {}

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Owned form of a handler callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// See [`ConnectionHandler::on_open`].
    Opened,
    /// See [`ConnectionHandler::on_message`].
    Message(Vec<u8>),
    /// See [`ConnectionHandler::on_close`].
    Closed(Option<ConnectionError>),
}

// ============================================================================
// EventChannel
// ============================================================================

/// Handler that forwards events into an unbounded channel.
///
/// One channel can serve several connections; each item carries its ID.
#[derive(Debug, Clone)]
pub struct EventChannel {
    tx: mpsc::UnboundedSender<(ConnectionId, ConnectionEvent)>,
}

impl EventChannel {
    /// Creates a handler and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ConnectionId, ConnectionEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, id: ConnectionId, event: ConnectionEvent) {
        if self.tx.send((id, event)).is_err() {
            trace!(connection_id = %id, "Event receiver dropped");
        }
    }
}

impl ConnectionHandler for EventChannel {
    fn on_open(&self, id: ConnectionId) {
        self.forward(id, ConnectionEvent::Opened);
    }

    fn on_message(&self, id: ConnectionId, payload: Vec<u8>) {
        self.forward(id, ConnectionEvent::Message(payload));
    }

    fn on_close(&self, id: ConnectionId, error: Option<ConnectionError>) {
        self.forward(id, ConnectionEvent::Closed(error));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::close_code;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw).expect("valid id")
    }

    #[test]
    fn test_event_channel_forwards_in_order() {
        let (handler, mut rx) = EventChannel::new();

        handler.on_open(id(1));
        handler.on_message(id(1), b"A".to_vec());
        handler.on_close(id(1), close_code::translate(1006, None));

        assert_eq!(rx.try_recv().ok(), Some((id(1), ConnectionEvent::Opened)));
        assert_eq!(
            rx.try_recv().ok(),
            Some((id(1), ConnectionEvent::Message(b"A".to_vec())))
        );
        let (_, closed) = rx.try_recv().expect("closed event");
        match closed {
            ConnectionEvent::Closed(Some(err)) => assert_eq!(err.message, "Abnormal disconnection."),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_channel_survives_dropped_receiver() {
        let (handler, rx) = EventChannel::new();
        drop(rx);
        handler.on_open(id(1));
    }

    #[test]
    fn test_arc_handler_delegates() {
        let (handler, mut rx) = EventChannel::new();
        let shared: Arc<dyn ConnectionHandler> = Arc::new(handler);
        shared.on_open(id(9));
        assert_eq!(rx.try_recv().ok(), Some((id(9), ConnectionEvent::Opened)));
    }
}
