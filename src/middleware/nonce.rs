//! Nonce injection stage.
//!
//! Wraps the incoming bytes in a [`NonceEnvelope`] whose sequence is the
//! chain's current nonce for the signing key plus one.
//!
//! The nonce is fetched fresh for every transaction. Two pipelines running
//! concurrently for the same key can observe the same nonce and produce the
//! same sequence; callers that need distinct sequences must submit one
//! transaction per key at a time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::signer::key_identifier;

use super::TxMiddlewareHandler;
use super::envelope::NonceEnvelope;

// ============================================================================
// ChainClient
// ============================================================================

/// Chain queries needed by the pipeline.
///
/// [`RpcClient`](crate::rpc::RpcClient) implements this over JSON-RPC.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the last nonce the chain has seen for `key`.
    ///
    /// # Errors
    ///
    /// Implementations report network failures as [`Error::Transport`] or a
    /// more specific variant. The error reaches the pipeline caller as-is.
    async fn get_nonce(&self, key: &str) -> Result<u64>;
}

// ============================================================================
// NonceMiddleware
// ============================================================================

/// Stamps transactions with the next nonce for one key.
pub struct NonceMiddleware {
    /// Identifier the chain tracks the nonce under.
    key: String,
    /// Client used for the nonce lookup.
    client: Arc<dyn ChainClient>,
}

impl fmt::Debug for NonceMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceMiddleware")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl NonceMiddleware {
    /// Creates a nonce stage for the given public key.
    ///
    /// The key identifier is the uppercase hex of `public_key`.
    #[must_use]
    pub fn new(public_key: &[u8], client: Arc<dyn ChainClient>) -> Self {
        Self::with_key(key_identifier(public_key), client)
    }

    /// Creates a nonce stage for an already-derived key identifier.
    #[must_use]
    pub fn with_key(key: impl Into<String>, client: Arc<dyn ChainClient>) -> Self {
        Self {
            key: key.into(),
            client,
        }
    }

    /// Returns the key identifier nonces are looked up under.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl TxMiddlewareHandler for NonceMiddleware {
    async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
        let nonce = self.client.get_nonce(&self.key).await?;
        let sequence = nonce.checked_add(1).ok_or_else(|| {
            Error::transport(format!("nonce for key {} is exhausted", self.key))
        })?;

        debug!(key = %self.key, nonce, sequence, "Using nonce for tx");

        Ok(NonceEnvelope::new(tx_data, sequence).to_bytes())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Returns an incrementing nonce and records every key it is asked for.
    struct CountingClient {
        nonce: AtomicU64,
        calls: AtomicUsize,
        keys: Mutex<Vec<String>>,
    }

    impl CountingClient {
        fn new(start: u64) -> Arc<Self> {
            Arc::new(Self {
                nonce: AtomicU64::new(start),
                calls: AtomicUsize::new(0),
                keys: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChainClient for CountingClient {
        async fn get_nonce(&self, key: &str) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().push(key.to_string());
            Ok(self.nonce.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChainClient for FailingClient {
        async fn get_nonce(&self, _key: &str) -> Result<u64> {
            Err(Error::transport("node unreachable"))
        }
    }

    struct FixedClient(u64);

    #[async_trait]
    impl ChainClient for FixedClient {
        async fn get_nonce(&self, _key: &str) -> Result<u64> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_sequence_is_nonce_plus_one() {
        let stage = NonceMiddleware::with_key("KEY", Arc::new(FixedClient(7)));
        let out = stage.handle(b"payload").await.expect("handle");

        let envelope = NonceEnvelope::from_bytes(&out).expect("decode");
        assert_eq!(envelope.sequence, 8);
        assert_eq!(envelope.inner, b"payload");
    }

    #[tokio::test]
    async fn test_every_call_queries_the_chain() {
        let client = CountingClient::new(10);
        let stage = NonceMiddleware::with_key("KEY", client.clone());

        let first = stage.handle(b"a").await.expect("handle");
        let second = stage.handle(b"b").await.expect("handle");

        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(NonceEnvelope::from_bytes(&first).expect("decode").sequence, 11);
        assert_eq!(NonceEnvelope::from_bytes(&second).expect("decode").sequence, 12);
    }

    #[tokio::test]
    async fn test_key_is_uppercase_hex_of_public_key() {
        let client = CountingClient::new(0);
        let stage = NonceMiddleware::new(&[0xde, 0xad, 0xbe, 0xef], client.clone());
        assert_eq!(stage.key(), "DEADBEEF");

        stage.handle(b"x").await.expect("handle");
        assert_eq!(client.keys.lock().as_slice(), ["DEADBEEF".to_string()]);
    }

    #[tokio::test]
    async fn test_client_error_propagates_unchanged() {
        let stage = NonceMiddleware::with_key("KEY", Arc::new(FailingClient));
        let err = stage.handle(b"x").await.unwrap_err();

        assert!(matches!(err, Error::Transport { ref message } if message == "node unreachable"));
    }

    #[tokio::test]
    async fn test_exhausted_nonce_is_an_error() {
        let stage = NonceMiddleware::with_key("KEY", Arc::new(FixedClient(u64::MAX)));
        let err = stage.handle(b"x").await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_input_is_not_modified() {
        let stage = NonceMiddleware::with_key("KEY", Arc::new(FixedClient(0)));
        let input = vec![1u8, 2, 3];
        let _ = stage.handle(&input).await.expect("handle");
        assert_eq!(input, vec![1, 2, 3]);
    }
}
