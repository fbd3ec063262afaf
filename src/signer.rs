//! Transaction signing.
//!
//! [`Signer`] is the seam the [`SignatureMiddleware`](crate::middleware::SignatureMiddleware)
//! signs through. [`Ed25519Signer`] is the implementation DAppChain nodes
//! accept: 32-byte seeds, 64-byte signatures, 32-byte public keys.

// ============================================================================
// Imports
// ============================================================================

use ed25519_dalek::{Signer as _, SigningKey};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Length of an Ed25519 private key seed.
pub const PRIVATE_KEY_LENGTH: usize = 32;

// ============================================================================
// Signature
// ============================================================================

/// Output of a signing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Signature over the signed bytes.
    pub signature: Vec<u8>,
    /// Public key matching the private key used.
    pub public_key: Vec<u8>,
}

// ============================================================================
// Signer
// ============================================================================

/// Signing primitive.
///
/// Implementations must be deterministic for a given `(data, private_key)`
/// pair if callers rely on reproducible envelopes.
pub trait Signer: Send + Sync {
    /// Signs `data` with `private_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if the key is malformed or signing fails.
    fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Signature>;
}

// ============================================================================
// Ed25519Signer
// ============================================================================

/// Ed25519 signer backed by `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    /// Derives the 32-byte public key for a private key seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signing`] if `private_key` is not 32 bytes.
    pub fn public_key(private_key: &[u8]) -> Result<Vec<u8>> {
        let signing_key = Self::signing_key(private_key)?;
        Ok(signing_key.verifying_key().to_bytes().to_vec())
    }

    fn signing_key(private_key: &[u8]) -> Result<SigningKey> {
        let seed = <[u8; PRIVATE_KEY_LENGTH]>::try_from(private_key).map_err(|_| {
            Error::signing(format!(
                "expected {PRIVATE_KEY_LENGTH}-byte private key, got {} bytes",
                private_key.len()
            ))
        })?;
        Ok(SigningKey::from_bytes(&seed))
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, data: &[u8], private_key: &[u8]) -> Result<Signature> {
        let signing_key = Self::signing_key(private_key)?;
        let signature = signing_key.sign(data);

        Ok(Signature {
            signature: signature.to_bytes().to_vec(),
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
        })
    }
}

// ============================================================================
// Key Identifier
// ============================================================================

/// Returns the identifier the chain tracks nonces under.
///
/// Uppercase hex of the public key bytes.
#[inline]
#[must_use]
pub fn key_identifier(public_key: &[u8]) -> String {
    hex::encode_upper(public_key)
}

// ============================================================================
// Tests
// ============================================================================
