//! Per-connection socket task.
//!
//! Every connected registry entry owns one spawned task that drives its
//! WebSocket. The registry talks to the task through [`SocketHandle`] and
//! the task reports back through [`SocketEvent`]s that the registry's
//! dispatcher consumes.
//!
//! # Task Lifecycle
//!
//! 1. Handshake. `Send` commands are queued and `Close` aborts.
//! 2. Emit `Opened`, flush the queue.
//! 3. Event loop over inbound frames and outbound commands.
//! 4. Close the command channel, then emit exactly one `Closed`.
//!
//! # Close Codes Reported
//!
//! | Situation | Code |
//! |-----------|------|
//! | Local close after open | 1000 |
//! | Peer close frame | frame code, or 1005 without one |
//! | Handshake failed or aborted | 1006 |
//! | Stream ended or errored | 1006 |
//! | Inbound message over the size limit | 1009 |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::close_code;
use super::handler::ConnectionHandler;

// ============================================================================
// Types
// ============================================================================

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Writer = SplitSink<Stream, Message>;

/// Code and reason the task terminated with.
type Termination = (u16, String);

// ============================================================================
// SocketEvent
// ============================================================================

/// Activity reported by a socket task to the registry dispatcher.
pub(crate) struct SocketEvent {
    /// Connection the event belongs to.
    pub id: ConnectionId,
    /// Handler registered for the connection at creation time.
    pub handler: Arc<dyn ConnectionHandler>,
    /// What happened.
    pub kind: SocketEventKind,
}

/// Kind of [`SocketEvent`].
#[derive(Debug)]
pub(crate) enum SocketEventKind {
    /// Handshake completed.
    Opened,
    /// Inbound text or binary frame.
    Message(Vec<u8>),
    /// Socket terminated.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

// ============================================================================
// SocketCommand
// ============================================================================

/// Commands from the registry to a socket task.
#[derive(Debug)]
enum SocketCommand {
    /// Write a data frame.
    Send(Message),
    /// Close the socket.
    Close,
}

// ============================================================================
// SocketHandle
// ============================================================================

/// Registry-side handle to a running socket task.
///
/// Dropping the handle closes the socket.
#[derive(Debug)]
pub(crate) struct SocketHandle {
    command_tx: mpsc::UnboundedSender<SocketCommand>,
}

impl SocketHandle {
    /// Spawns the socket task for `id` on `runtime` and starts the handshake.
    ///
    /// Callable from any thread, inside or outside the runtime.
    pub(crate) fn spawn(
        runtime: &Handle,
        id: ConnectionId,
        url: Url,
        config: WebSocketConfig,
        handler: Arc<dyn ConnectionHandler>,
        events_tx: mpsc::UnboundedSender<SocketEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let emitter = Emitter {
            id,
            handler,
            events_tx,
        };

        runtime.spawn(run_socket(url, config, command_rx, emitter));

        Self { command_tx }
    }

    /// Queues a binary frame.
    ///
    /// Frames sent before the handshake completes are written once it does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the task has terminated.
    pub(crate) fn send(&self, payload: Vec<u8>) -> Result<()> {
        self.send_message(Message::Binary(payload.into()))
    }

    /// Queues a text frame. Same semantics as [`SocketHandle::send`].
    pub(crate) fn send_text(&self, text: String) -> Result<()> {
        self.send_message(Message::Text(text.into()))
    }

    fn send_message(&self, message: Message) -> Result<()> {
        self.command_tx
            .send(SocketCommand::Send(message))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Requests the socket to close. No-op if the task has terminated.
    pub(crate) fn close(&self) {
        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// Emitter
// ============================================================================

/// Sends events for one connection to the dispatcher.
struct Emitter {
    id: ConnectionId,
    handler: Arc<dyn ConnectionHandler>,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
}

impl Emitter {
    fn emit(&self, kind: SocketEventKind) {
        let event = SocketEvent {
            id: self.id,
            handler: Arc::clone(&self.handler),
            kind,
        };

        if self.events_tx.send(event).is_err() {
            trace!(connection_id = %self.id, "Dispatcher gone, event dropped");
        }
    }
}

// ============================================================================
// Socket Task
// ============================================================================

async fn run_socket(
    url: Url,
    config: WebSocketConfig,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    emitter: Emitter,
) {
    let id = emitter.id;

    let (code, reason) = match handshake(id, &url, config, &mut command_rx).await {
        Some((stream, queued)) => {
            debug!(connection_id = %id, url = %url, "WebSocket opened");
            emitter.emit(SocketEventKind::Opened);
            run_event_loop(id, stream, queued, &mut command_rx, &emitter).await
        }
        None => (close_code::ABNORMAL, String::new()),
    };

    // Sends after this point fail with ConnectionClosed.
    command_rx.close();

    debug!(connection_id = %id, code, "Socket task terminated");
    emitter.emit(SocketEventKind::Closed { code, reason });
}

/// Runs the opening handshake while buffering sends.
///
/// Returns `None` if the handshake failed or a close was requested.
async fn handshake(
    id: ConnectionId,
    url: &Url,
    config: WebSocketConfig,
    command_rx: &mut mpsc::UnboundedReceiver<SocketCommand>,
) -> Option<(Stream, Vec<Message>)> {
    let connect = connect_async_with_config(url.as_str(), Some(config), false);
    tokio::pin!(connect);

    let mut queued = Vec::new();

    loop {
        tokio::select! {
            result = &mut connect => {
                return match result {
                    Ok((stream, _response)) => Some((stream, queued)),
                    Err(e) => {
                        warn!(connection_id = %id, url = %url, error = %e, "WebSocket handshake failed");
                        None
                    }
                };
            }

            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(message)) => {
                        trace!(connection_id = %id, len = message.len(), "Queued frame until open");
                        queued.push(message);
                    }

                    Some(SocketCommand::Close) | None => {
                        debug!(connection_id = %id, dropped = queued.len(), "Handshake aborted");
                        return None;
                    }
                }
            }
        }
    }
}

/// Event loop that handles WebSocket I/O after the handshake.
async fn run_event_loop(
    id: ConnectionId,
    stream: Stream,
    queued: Vec<Message>,
    command_rx: &mut mpsc::UnboundedReceiver<SocketCommand>,
    emitter: &Emitter,
) -> Termination {
    let (mut ws_write, mut ws_read) = stream.split();

    for message in queued {
        if let Err(e) = write_frame(id, &mut ws_write, message).await {
            return terminate_on_error(id, &e);
        }
    }

    loop {
        tokio::select! {
            // Inbound frames
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        emitter.emit(SocketEventKind::Message(text.as_bytes().to_vec()));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        emitter.emit(SocketEventKind::Message(data.to_vec()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let termination = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (close_code::NO_STATUS, String::new()),
                        };
                        debug!(connection_id = %id, code = termination.0, "WebSocket closed by remote");

                        // Flushes the close reply queued by the protocol layer.
                        let _ = ws_write.close().await;
                        return termination;
                    }

                    Some(Err(e)) => {
                        return terminate_on_error(id, &e);
                    }

                    None => {
                        debug!(connection_id = %id, "WebSocket stream ended");
                        return (close_code::ABNORMAL, String::new());
                    }

                    // Ping, Pong, raw frames
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the registry
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(message)) => {
                        if let Err(e) = write_frame(id, &mut ws_write, message).await {
                            return terminate_on_error(id, &e);
                        }
                    }

                    Some(SocketCommand::Close) | None => {
                        debug!(connection_id = %id, "Close requested");
                        close_normally(&mut ws_write).await;
                        return (close_code::NORMAL, String::new());
                    }
                }
            }
        }
    }
}

async fn write_frame(
    id: ConnectionId,
    ws_write: &mut Writer,
    message: Message,
) -> std::result::Result<(), WsError> {
    let len = message.len();
    ws_write.send(message).await?;
    trace!(connection_id = %id, len, "Frame sent");
    Ok(())
}

async fn close_normally(ws_write: &mut Writer) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: Utf8Bytes::from_static(""),
    };

    if ws_write.send(Message::Close(Some(frame))).await.is_ok() {
        let _ = ws_write.close().await;
    }
}

fn terminate_on_error(id: ConnectionId, error: &WsError) -> Termination {
    match error {
        WsError::Capacity(e) => {
            warn!(connection_id = %id, error = %e, "Inbound message too large");
            (close_code::TOO_BIG, String::new())
        }
        other => {
            warn!(connection_id = %id, error = %other, "WebSocket error");
            (close_code::ABNORMAL, String::new())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
