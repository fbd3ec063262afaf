//! Transaction envelopes.
//!
//! Each middleware stage wraps the bytes it receives into one of these
//! messages. The wire format is protobuf, matching the chain's schema:
//!
//! ```text
//! message NonceTx  { bytes inner = 1; uint64 sequence = 2; }
//! message SignedTx { bytes inner = 1; bytes signature = 2; bytes public_key = 3; }
//! ```

// ============================================================================
// Imports
// ============================================================================

use prost::Message;

use crate::error::Result;

// ============================================================================
// NonceEnvelope
// ============================================================================

/// Payload stamped with a per-key sequence number.
#[derive(Clone, PartialEq, Message)]
pub struct NonceEnvelope {
    /// Bytes produced by the previous stage.
    #[prost(bytes = "vec", tag = "1")]
    pub inner: Vec<u8>,

    /// Last observed nonce for the signing key, plus one.
    #[prost(uint64, tag = "2")]
    pub sequence: u64,
}

impl NonceEnvelope {
    /// Creates a nonce envelope.
    #[inline]
    #[must_use]
    pub fn new(inner: impl Into<Vec<u8>>, sequence: u64) -> Self {
        Self {
            inner: inner.into(),
            sequence,
        }
    }

    /// Encodes the envelope to protobuf bytes.
    #[inline]
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes an envelope from protobuf bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::Error::Decode) on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::decode(bytes)?)
    }
}

// ============================================================================
// SignedEnvelope
// ============================================================================

/// Payload authenticated by a signature over `inner`.
#[derive(Clone, PartialEq, Message)]
pub struct SignedEnvelope {
    /// Exactly the bytes that were signed.
    #[prost(bytes = "vec", tag = "1")]
    pub inner: Vec<u8>,

    /// Signature over `inner`.
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,

    /// Public key of the signer.
    #[prost(bytes = "vec", tag = "3")]
    pub public_key: Vec<u8>,
}

impl SignedEnvelope {
    /// Encodes the envelope to protobuf bytes.
    #[inline]
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes an envelope from protobuf bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::Error::Decode) on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::decode(bytes)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_envelope_wire_layout() {
        let envelope = NonceEnvelope::new(vec![0xAA, 0xBB], 8);
        // field 1 (bytes, len 2), field 2 (varint 8)
        assert_eq!(envelope.to_bytes(), vec![0x0A, 0x02, 0xAA, 0xBB, 0x10, 0x08]);
    }

    #[test]
    fn test_signed_envelope_wire_layout() {
        let envelope = SignedEnvelope {
            inner: vec![1],
            signature: vec![2, 3],
            public_key: vec![4],
        };
        assert_eq!(
            envelope.to_bytes(),
            vec![0x0A, 0x01, 1, 0x12, 0x02, 2, 3, 0x1A, 0x01, 4]
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = SignedEnvelope::from_bytes(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(result, Err(crate::Error::Decode(_))));
    }

    #[test]
    fn test_empty_inner_decodes() {
        let bytes = NonceEnvelope::new(Vec::new(), 1).to_bytes();
        let decoded = NonceEnvelope::from_bytes(&bytes).expect("decode");
        assert!(decoded.inner.is_empty());
        assert_eq!(decoded.sequence, 1);
    }
}
