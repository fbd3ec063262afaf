//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection IDs and JSON-RPC request IDs from being
//! mixed up with plain integers and strings.
//!
//! | Type | Wraps | Allocated by |
//! |------|-------|--------------|
//! | [`ConnectionId`] | `NonZeroU64` | [`ConnectionRegistry`](crate::transport::ConnectionRegistry) |
//! | [`RequestId`] | `Uuid` | [`RpcClient`](crate::rpc::RpcClient) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of one logical socket inside a registry.
///
/// IDs start at 1 and are never reused by the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    /// First ID a registry hands out.
    pub(crate) const FIRST: Self = Self(NonZeroU64::MIN);

    /// Wraps a raw ID. Returns `None` for 0.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the raw integer value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the ID following this one.
    #[inline]
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// JSON-RPC request identifier used for response correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a random request ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_rejects_zero() {
        assert!(ConnectionId::new(0).is_none());
        assert_eq!(ConnectionId::new(1).map(ConnectionId::get), Some(1));
    }

    #[test]
    fn test_connection_id_sequence_starts_at_one() {
        assert_eq!(ConnectionId::FIRST.get(), 1);
        assert_eq!(ConnectionId::FIRST.next().get(), 2);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(42).expect("valid id");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_request_id_serializes_as_string() {
        let id = RequestId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));

        let parsed: RequestId = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}
