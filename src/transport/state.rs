//! Connection lifecycle states.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one registry connection.
///
/// ```text
/// Undefined ──connect──► Connecting ──open──► Connected
///                            │                    │
///                            │     disconnect     ▼
///                            └──────────────► Disconnecting
///                                                 │
///                       close event (any state) ──► Disconnected
/// ```
///
/// [`ConnectionState::NotApplicable`] is never stored. It is what the
/// registry reports for IDs it does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Created, no socket yet.
    #[default]
    Undefined,
    /// Socket handshake in progress.
    Connecting,
    /// Socket open.
    Connected,
    /// Close requested, close event not seen yet.
    Disconnecting,
    /// Socket closed. Terminal until the connection is destroyed.
    Disconnected,
    /// Unknown connection ID.
    NotApplicable,
}

impl ConnectionState {
    /// Returns `true` if frames can currently flow both ways.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if a socket task is attached and has not closed yet.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Disconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_undefined() {
        assert_eq!(ConnectionState::default(), ConnectionState::Undefined);
    }

    #[test]
    fn test_predicates() {
        assert!(ConnectionState::Connected.is_open());
        assert!(!ConnectionState::Connecting.is_open());

        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Disconnecting.is_active());
        assert!(!ConnectionState::Undefined.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(!ConnectionState::NotApplicable.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::NotApplicable.to_string(), "NotApplicable");
    }
}
