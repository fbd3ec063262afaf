//! Signing stage.
//!
//! Wraps the incoming bytes in a [`SignedEnvelope`] carrying a signature over
//! exactly those bytes. The stage does no I/O.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Result;
use crate::signer::{Ed25519Signer, Signer};

use super::TxMiddlewareHandler;
use super::envelope::SignedEnvelope;

// ============================================================================
// SignatureMiddleware
// ============================================================================

/// Signs transactions with a fixed private key.
pub struct SignatureMiddleware {
    /// Private key. Never logged or encoded.
    private_key: Vec<u8>,
    /// Signing primitive.
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for SignatureMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureMiddleware")
            .field("private_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SignatureMiddleware {
    /// Creates an Ed25519 signing stage.
    #[must_use]
    pub fn new(private_key: impl Into<Vec<u8>>) -> Self {
        Self::with_signer(private_key, Arc::new(Ed25519Signer))
    }

    /// Creates a signing stage with a custom signer.
    #[must_use]
    pub fn with_signer(private_key: impl Into<Vec<u8>>, signer: Arc<dyn Signer>) -> Self {
        Self {
            private_key: private_key.into(),
            signer,
        }
    }
}

#[async_trait]
impl TxMiddlewareHandler for SignatureMiddleware {
    async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
        let sig = self.signer.sign(tx_data, &self.private_key)?;

        trace!(len = tx_data.len(), "Signed tx");

        let envelope = SignedEnvelope {
            inner: tx_data.to_vec(),
            signature: sig.signature,
            public_key: sig.public_key,
        };
        Ok(envelope.to_bytes())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::error::Error;
    use crate::signer::Signature;

    /// Records the bytes it was asked to sign.
    #[derive(Default)]
    struct RecordingSigner {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl Signer for RecordingSigner {
        fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Signature> {
            self.seen.lock().push(data.to_vec());
            Ok(Signature {
                signature: vec![0x51; 4],
                public_key: private_key.iter().rev().copied().collect(),
            })
        }
    }

    struct BrokenSigner;

    impl Signer for BrokenSigner {
        fn sign(&self, _data: &[u8], _private_key: &[u8]) -> Result<Signature> {
            Err(Error::signing("hardware wallet locked"))
        }
    }

    #[tokio::test]
    async fn test_inner_is_byte_identical_to_input() {
        let stage = SignatureMiddleware::new([3u8; 32]);
        let input = b"\x00\x01binary\xffpayload".to_vec();

        let out = stage.handle(&input).await.expect("handle");
        let envelope = SignedEnvelope::from_bytes(&out).expect("decode");

        assert_eq!(envelope.inner, input);
        assert_eq!(envelope.signature.len(), 64);
        assert_eq!(envelope.public_key.len(), 32);
    }

    #[tokio::test]
    async fn test_signs_exactly_the_input() {
        let signer = Arc::new(RecordingSigner::default());
        let stage = SignatureMiddleware::with_signer(vec![1, 2, 3], signer.clone());

        let out = stage.handle(b"abc").await.expect("handle");
        let envelope = SignedEnvelope::from_bytes(&out).expect("decode");

        assert_eq!(signer.seen.lock().as_slice(), [b"abc".to_vec()]);
        assert_eq!(envelope.signature, vec![0x51; 4]);
        assert_eq!(envelope.public_key, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_signer_error_propagates() {
        let stage = SignatureMiddleware::with_signer(vec![0; 32], Arc::new(BrokenSigner));
        let err = stage.handle(b"abc").await.unwrap_err();
        assert!(matches!(err, Error::Signing { .. }));
    }

    #[tokio::test]
    async fn test_bad_key_length_fails() {
        let stage = SignatureMiddleware::new(vec![0u8; 10]);
        assert!(stage.handle(b"abc").await.is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let stage = SignatureMiddleware::new([9u8; 32]);
        let rendered = format!("{stage:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains('9'));
    }
}
