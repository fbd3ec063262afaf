//! Ordered middleware chain.
//!
//! A [`MiddlewareChain`] runs its stages in the order they were given, feeding
//! each stage the previous stage's output. The first failing stage aborts the
//! run and its error is returned; no partial envelope escapes.
//!
//! # Example
//!
//! ```ignore
//! use dappchain_client::middleware::{MiddlewareChain, NonceMiddleware, SignatureMiddleware};
//!
//! let chain = MiddlewareChain::builder()
//!     .nonce(NonceMiddleware::new(&public_key, client))
//!     .signed(SignatureMiddleware::new(private_key))
//!     .build();
//!
//! let tx = chain.handle(&raw_tx).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::Result;

use super::TxMiddlewareHandler;
use super::nonce::NonceMiddleware;
use super::signed::SignatureMiddleware;

// ============================================================================
// Types
// ============================================================================

/// Shared stage handle.
pub type Stage = Arc<dyn TxMiddlewareHandler>;

// ============================================================================
// MiddlewareChain
// ============================================================================

/// Runs stages in caller-configured order.
///
/// The chain is itself a [`TxMiddlewareHandler`], so chains nest.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    /// Stages in execution order.
    stages: Vec<Stage>,
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stage_count", &self.stages.len())
            .finish()
    }
}

impl MiddlewareChain {
    /// Creates a chain from an already-ordered stage list.
    ///
    /// The order is not checked. Use [`MiddlewareChain::builder`] to get the
    /// nonce-before-signature order enforced at compile time.
    #[inline]
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Creates a typed builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ChainBuilder<Open> {
        ChainBuilder::new()
    }

    /// Returns the number of stages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the chain has no stages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[async_trait]
impl TxMiddlewareHandler for MiddlewareChain {
    async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
        let mut data = tx_data.to_vec();

        for (index, stage) in self.stages.iter().enumerate() {
            data = stage.handle(&data).await.inspect_err(|e| {
                debug!(stage = index, error = %e, "Middleware stage failed, aborting chain");
            })?;
            trace!(stage = index, len = data.len(), "Middleware stage completed");
        }

        Ok(data)
    }
}

// ============================================================================
// Builder States
// ============================================================================

/// Builder state: no nonce stage yet.
#[derive(Debug, Clone, Copy)]
pub struct Open;

/// Builder state: nonce stage added, signature stage allowed.
#[derive(Debug, Clone, Copy)]
pub struct Nonced;

/// Builder state: signature stage added.
#[derive(Debug, Clone, Copy)]
pub struct Signed;

// ============================================================================
// ChainBuilder
// ============================================================================

/// Typed builder for [`MiddlewareChain`].
///
/// `.signed(..)` only exists once `.nonce(..)` has been called, so a chain
/// built here always authenticates the nonce.
pub struct ChainBuilder<S = Open> {
    /// Stages in execution order.
    stages: Vec<Stage>,
    /// Builder state marker.
    state: PhantomData<S>,
}

impl ChainBuilder<Open> {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            state: PhantomData,
        }
    }

    /// Appends the nonce stage.
    #[must_use]
    pub fn nonce(self, stage: NonceMiddleware) -> ChainBuilder<Nonced> {
        self.push(stage).transition()
    }
}

impl Default for ChainBuilder<Open> {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainBuilder<Nonced> {
    /// Appends the signature stage.
    #[must_use]
    pub fn signed(self, stage: SignatureMiddleware) -> ChainBuilder<Signed> {
        self.push(stage).transition()
    }
}

impl<S> ChainBuilder<S> {
    /// Appends a custom stage at the current position.
    #[must_use]
    pub fn stage(self, stage: impl TxMiddlewareHandler + 'static) -> Self {
        self.push(stage)
    }

    /// Finishes the chain.
    #[must_use]
    pub fn build(self) -> MiddlewareChain {
        MiddlewareChain::new(self.stages)
    }

    fn push(mut self, stage: impl TxMiddlewareHandler + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    fn transition<T>(self) -> ChainBuilder<T> {
        ChainBuilder {
            stages: self.stages,
            state: PhantomData,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};

    use crate::error::Error;
    use crate::middleware::envelope::{NonceEnvelope, SignedEnvelope};
    use crate::middleware::nonce::ChainClient;
    use crate::signer::Ed25519Signer;

    const SEED: [u8; 32] = [42u8; 32];

    struct FixedClient(u64);

    #[async_trait]
    impl ChainClient for FixedClient {
        async fn get_nonce(&self, _key: &str) -> Result<u64> {
            Ok(self.0)
        }
    }

    /// Appends a tag byte so stage order is visible in the output.
    struct Tag(u8);

    #[async_trait]
    impl TxMiddlewareHandler for Tag {
        async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
            let mut out = tx_data.to_vec();
            out.push(self.0);
            Ok(out)
        }
    }

    struct Fail;

    #[async_trait]
    impl TxMiddlewareHandler for Fail {
        async fn handle(&self, _tx_data: &[u8]) -> Result<Vec<u8>> {
            Err(Error::transport("stage failed"))
        }
    }

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl TxMiddlewareHandler for Counter {
        async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(tx_data.to_vec())
        }
    }

    fn arc(stage: impl TxMiddlewareHandler + 'static) -> Stage {
        Arc::new(stage)
    }

    fn signing_chain(nonce: u64) -> MiddlewareChain {
        let public_key = Ed25519Signer::public_key(&SEED).expect("public key");
        MiddlewareChain::builder()
            .nonce(NonceMiddleware::new(&public_key, Arc::new(FixedClient(nonce))))
            .signed(SignatureMiddleware::new(SEED))
            .build()
    }

    #[tokio::test]
    async fn test_nonce_then_signature_wraps_nonce_envelope() {
        let chain = signing_chain(7);
        let payload = b"transfer 10 coins".to_vec();

        let out = chain.handle(&payload).await.expect("chain");
        let signed = SignedEnvelope::from_bytes(&out).expect("signed envelope");

        assert_eq!(signed.inner, NonceEnvelope::new(payload.clone(), 8).to_bytes());

        let nonce = NonceEnvelope::from_bytes(&signed.inner).expect("nonce envelope");
        assert_eq!(nonce.inner, payload);
        assert_eq!(nonce.sequence, 8);
    }

    #[tokio::test]
    async fn test_signature_covers_the_nonce() {
        let chain = signing_chain(41);
        let out = chain.handle(b"tx").await.expect("chain");
        let signed = SignedEnvelope::from_bytes(&out).expect("decode");

        let public_key: [u8; 32] = signed.public_key.as_slice().try_into().expect("32 bytes");
        let signature: [u8; 64] = signed.signature.as_slice().try_into().expect("64 bytes");
        let verifying_key = VerifyingKey::from_bytes(&public_key).expect("key");

        assert!(
            verifying_key
                .verify(&signed.inner, &DalekSignature::from_bytes(&signature))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let chain = signing_chain(3);
        let a = chain.handle(b"same").await.expect("chain");
        let b = chain.handle(b"same").await.expect("chain");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_stages_run_in_configured_order() {
        let chain = MiddlewareChain::new(vec![arc(Tag(1)), arc(Tag(2)), arc(Tag(3))]);
        let out = chain.handle(&[0]).await.expect("chain");
        assert_eq!(out, vec![0, 1, 2, 3]);

        let reversed = MiddlewareChain::new(vec![arc(Tag(3)), arc(Tag(2)), arc(Tag(1))]);
        let out = reversed.handle(&[0]).await.expect("chain");
        assert_eq!(out, vec![0, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_stages() {
        let after = Arc::new(Counter::default());
        let chain = MiddlewareChain::new(vec![arc(Tag(1)), arc(Fail), after.clone() as Stage]);

        let err = chain.handle(b"x").await.unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(after.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_retried() {
        let before = Arc::new(Counter::default());
        let chain = MiddlewareChain::new(vec![before.clone() as Stage, arc(Fail)]);

        assert!(chain.handle(b"x").await.is_err());
        assert_eq!(before.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_identity() {
        let chain = MiddlewareChain::default();
        assert!(chain.is_empty());
        assert_eq!(chain.handle(b"raw").await.expect("chain"), b"raw");
    }

    #[tokio::test]
    async fn test_chains_nest() {
        let inner = MiddlewareChain::new(vec![arc(Tag(1)), arc(Tag(2))]);
        let outer = MiddlewareChain::new(vec![arc(inner), arc(Tag(3))]);
        assert_eq!(outer.handle(&[]).await.expect("chain"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_builder_keeps_custom_stage_position() {
        let chain = MiddlewareChain::builder()
            .stage(Tag(9))
            .nonce(NonceMiddleware::with_key("K", Arc::new(FixedClient(0))))
            .build();
        assert_eq!(chain.len(), 2);

        let out = chain.handle(&[5]).await.expect("chain");
        let nonce = NonceEnvelope::from_bytes(&out).expect("decode");
        assert_eq!(nonce.inner, vec![5, 9]);
        assert_eq!(nonce.sequence, 1);
    }
}
