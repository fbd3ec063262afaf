//! JSON-RPC client over a registry connection.
//!
//! Requests go out as text frames and are correlated with responses by
//! UUID. Event notifications are fanned out to every [`Subscription`]. The
//! client implements [`ChainClient`], so it can back a
//! [`NonceMiddleware`](crate::middleware::NonceMiddleware) directly, and
//! [`RpcClient::commit_tx`] submits the chain's output.
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectionRegistry::new()?;
//! let client = Arc::new(
//!     RpcClient::connect(&registry, "ws://127.0.0.1:46657/queryws", RpcClientOptions::default())
//!         .await?,
//! );
//!
//! let chain = MiddlewareChain::builder()
//!     .nonce(NonceMiddleware::new(&public_key, client.clone()))
//!     .signed(SignatureMiddleware::new(private_key))
//!     .build();
//!
//! let result = client.commit_tx(&chain.handle(&tx).await?).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId};
use crate::middleware::ChainClient;
use crate::transport::{ConnectionError, ConnectionHandler, ConnectionRegistry, ConnectionState};

use super::message::{
    BroadcastTxResult, ChainEvent, NonceParams, NonceValue, RpcRequest, RpcResponse,
    SubscribeParams, encode_base64,
};
use super::options::RpcClientOptions;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

/// Map of subscription keys to event channels.
type SubscriberMap = FxHashMap<u64, mpsc::UnboundedSender<ChainEvent>>;

// ============================================================================
// RpcHandler
// ============================================================================

/// Connection handler that resolves the open waiter, routes responses and
/// fans events out to subscribers.
struct RpcHandler {
    /// Correlation map (shared with the client).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event subscribers (shared with the client).
    subscribers: Arc<Mutex<SubscriberMap>>,
    /// Resolved on the first open or close.
    opened: Mutex<Option<oneshot::Sender<Result<()>>>>,
}

impl ConnectionHandler for RpcHandler {
    fn on_open(&self, _id: ConnectionId) {
        if let Some(tx) = self.opened.lock().take() {
            let _ = tx.send(Ok(()));
        }
    }

    fn on_message(&self, id: ConnectionId, payload: Vec<u8>) {
        let response = match serde_json::from_slice::<RpcResponse>(&payload) {
            Ok(response) => response,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Failed to parse JSON-RPC message");
                return;
            }
        };

        if response.is_event() {
            self.route_event(id, response);
            return;
        }

        let Some(request_id) = response.request_id() else {
            trace!(connection_id = %id, "Ignoring message without request id");
            return;
        };

        let tx = self.correlation.lock().remove(&request_id);

        match tx {
            Some(tx) => {
                let _ = tx.send(response.into_result());
            }
            None => {
                warn!(connection_id = %id, %request_id, "Response for unknown request");
            }
        }
    }

    fn on_close(&self, id: ConnectionId, error: Option<ConnectionError>) {
        if let Some(tx) = self.opened.lock().take() {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        let pending: Vec<_> = self.correlation.lock().drain().collect();
        let count = pending.len();

        // Ends every subscription stream.
        self.subscribers.lock().clear();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        match error {
            Some(error) => {
                warn!(connection_id = %id, code = error.code, error = %error, failed = count, "RPC connection lost");
            }
            None => {
                debug!(connection_id = %id, failed = count, "RPC connection closed");
            }
        }
    }
}

impl RpcHandler {
    fn route_event(&self, id: ConnectionId, response: RpcResponse) {
        let result = match response.into_result() {
            Ok(result) => result,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Event notification carried an error");
                return;
            }
        };

        let event = match serde_json::from_value::<ChainEvent>(result) {
            Ok(event) => event,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Failed to parse chain event");
                return;
            }
        };

        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            trace!(connection_id = %id, "Event without subscribers dropped");
            return;
        }

        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        trace!(connection_id = %id, subscribers = subscribers.len(), "Event delivered");
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Stream of chain events returned by [`RpcClient::subscribe`].
///
/// Ends when the connection closes. Pass it to
/// [`RpcClient::unsubscribe`] to stop delivery.
#[derive(Debug)]
pub struct Subscription {
    key: u64,
    events: mpsc::UnboundedReceiver<ChainEvent>,
}

impl Subscription {
    /// Receives the next event, or `None` once the connection has closed.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        self.events.recv().await
    }
}

// ============================================================================
// RpcClient
// ============================================================================

/// JSON-RPC client bound to one registry connection.
///
/// Dropping the client destroys the connection.
pub struct RpcClient {
    registry: ConnectionRegistry,
    id: ConnectionId,
    correlation: Arc<Mutex<CorrelationMap>>,
    subscribers: Arc<Mutex<SubscriberMap>>,
    next_subscription: AtomicU64,
    options: RpcClientOptions,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("id", &self.id)
            .field("pending", &self.pending_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Opens a connection to `url` in `registry` and waits for it to open.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::InvalidUrl`] if `url` is not a WebSocket URL
    /// - [`Error::ConnectionClosed`] if the socket closed before opening
    /// - [`Error::ConnectionTimeout`] if it did not open within
    ///   `connect_timeout`
    pub async fn connect(
        registry: &ConnectionRegistry,
        url: &str,
        options: RpcClientOptions,
    ) -> Result<Self> {
        options.validate()?;

        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let subscribers = Arc::new(Mutex::new(SubscriberMap::default()));
        let (opened_tx, opened_rx) = oneshot::channel();

        let id = registry.create(RpcHandler {
            correlation: Arc::clone(&correlation),
            subscribers: Arc::clone(&subscribers),
            opened: Mutex::new(Some(opened_tx)),
        });

        if let Err(e) = registry.connect(id, url) {
            registry.destroy(id);
            return Err(e);
        }

        let opened = match timeout(options.connect_timeout, opened_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::connection_timeout(millis(options.connect_timeout))),
        };

        if let Err(e) = opened {
            registry.destroy(id);
            warn!(connection_id = %id, url, error = %e, "RPC connect failed");
            return Err(e);
        }

        info!(connection_id = %id, url, "RPC client connected");

        Ok(Self {
            registry: registry.clone(),
            id,
            correlation,
            subscribers,
            next_subscription: AtomicU64::new(1),
            options,
        })
    }

    /// Calls `method` and decodes its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if too many requests are pending
    /// - [`Error::Rpc`] if the node answered with an error
    /// - [`Error::RequestTimeout`] if no answer arrived within
    ///   `request_timeout`
    /// - [`Error::ConnectionClosed`] if the socket closed first
    /// - [`Error::Json`] if params or result do not (de)serialize
    pub async fn call<P, T>(&self, method: &str, params: P) -> Result<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = RpcRequest::new(method, serde_json::to_value(params)?);
        let request_id = request.id;
        let text = serde_json::to_string(&request)?;

        let (response_tx, response_rx) = oneshot::channel();

        // Check pending request limit, then store correlation before sending
        {
            let mut correlation = self.correlation.lock();
            if correlation.len() >= self.options.max_pending {
                warn!(
                    pending = correlation.len(),
                    max = self.options.max_pending,
                    "Too many pending requests"
                );
                return Err(Error::transport(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    self.options.max_pending
                )));
            }
            correlation.insert(request_id, response_tx);
        }

        if let Err(e) = self.registry.send_text(self.id, text) {
            self.correlation.lock().remove(&request_id);
            return Err(e);
        }

        trace!(connection_id = %self.id, %request_id, method, "Request sent");

        let value = match timeout(self.options.request_timeout, response_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(Error::ConnectionClosed),
            Err(_) => {
                self.correlation.lock().remove(&request_id);
                return Err(Error::request_timeout(
                    request_id,
                    millis(self.options.request_timeout),
                ));
            }
        };

        Ok(serde_json::from_value(value)?)
    }

    /// Submits a signed transaction with `broadcast_tx_commit`.
    ///
    /// `tx` is the output of the middleware chain. It is sent once, with no
    /// retry.
    ///
    /// # Errors
    ///
    /// - [`Error::TxCommit`] if `check_tx` or `deliver_tx` reported a
    ///   non-zero code (see [`Error::is_invalid_nonce`])
    /// - [`Error::Transport`] if the node returned no result
    /// - Any error of [`RpcClient::call`]
    pub async fn commit_tx(&self, tx: &[u8]) -> Result<BroadcastTxResult> {
        let payload = [encode_base64(tx)];

        let result: Option<BroadcastTxResult> = self.call("broadcast_tx_commit", payload).await?;
        let result = result.ok_or_else(|| Error::transport("Empty broadcast_tx_commit result"))?;

        if let Err(e) = result.ensure_committed() {
            warn!(connection_id = %self.id, hash = %result.hash, error = %e, "Transaction rejected");
            return Err(e);
        }

        debug!(connection_id = %self.id, hash = %result.hash, height = ?result.height(), "Transaction committed");
        Ok(result)
    }

    /// Subscribes to chain events with `subevents`.
    ///
    /// An empty `topics` slice receives every event.
    ///
    /// # Errors
    ///
    /// Any error of [`RpcClient::call`]. The subscription is not
    /// registered if the call fails.
    pub async fn subscribe(&self, topics: &[String]) -> Result<Subscription> {
        let key = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let (tx, events) = mpsc::unbounded_channel();

        self.subscribers.lock().insert(key, tx);

        let params = if topics.is_empty() {
            Value::Null
        } else {
            serde_json::to_value(SubscribeParams { topics })?
        };

        if let Err(e) = self.call::<_, Value>("subevents", params).await {
            self.subscribers.lock().remove(&key);
            return Err(e);
        }

        debug!(connection_id = %self.id, subscription = key, ?topics, "Subscribed to events");
        Ok(Subscription { key, events })
    }

    /// Ends `subscription`.
    ///
    /// Sends `unsubevents` once the last subscription is gone.
    ///
    /// # Errors
    ///
    /// Any error of [`RpcClient::call`] for `unsubevents`.
    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<()> {
        let remaining = {
            let mut subscribers = self.subscribers.lock();
            subscribers.remove(&subscription.key);
            subscribers.len()
        };

        debug!(connection_id = %self.id, subscription = subscription.key, remaining, "Unsubscribed from events");

        if remaining == 0 {
            self.call::<_, Value>("unsubevents", Value::Null).await?;
        }

        Ok(())
    }

    /// Returns the number of active subscriptions.
    #[inline]
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns the registry connection this client uses.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the state of the underlying connection.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.registry.state(self.id)
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Closes and removes the connection. Pending calls fail with
    /// [`Error::ConnectionClosed`] and subscriptions end.
    pub fn close(self) {
        debug!(connection_id = %self.id, "RPC client closing");
        self.registry.destroy(self.id);
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.registry.destroy(self.id);
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// ChainClient
// ============================================================================

#[async_trait]
impl ChainClient for RpcClient {
    async fn get_nonce(&self, key: &str) -> Result<u64> {
        let nonce: NonceValue = self.call("nonce", NonceParams { key }).await?;
        nonce.into_u64()
    }
}

// ============================================================================
// Tests
// ============================================================================
