//! Close code translation.
//!
//! Maps a WebSocket close code and optional reason to the error a connection
//! handler receives in `on_close`.
//!
//! | Code | Message |
//! |------|---------|
//! | 1000 | none |
//! | 1001 | `Endpoint going away.` |
//! | 1002 | `Protocol error.` |
//! | 1003 | `Unsupported message.` |
//! | 1005 | `No status.` |
//! | 1006 | `Abnormal disconnection.` |
//! | 1009 | `Data frame too large.` |
//! | other | `Error {code}` |
//!
//! A non-empty reason replaces the table message for every code except 1000.

// ============================================================================
// Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure.
pub const NORMAL: u16 = 1000;

/// Endpoint is going away.
pub const GOING_AWAY: u16 = 1001;

/// Protocol error.
pub const PROTOCOL: u16 = 1002;

/// Unsupported data type.
pub const UNSUPPORTED: u16 = 1003;

/// No status code in the close frame.
pub const NO_STATUS: u16 = 1005;

/// Connection dropped without a close frame.
pub const ABNORMAL: u16 = 1006;

/// Message exceeded the peer's size limit.
pub const TOO_BIG: u16 = 1009;

// ============================================================================
// ConnectionError
// ============================================================================

/// Domain error derived from a close code and reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConnectionError {
    /// Close code reported by the transport.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

// ============================================================================
// Translation
// ============================================================================

/// Translates a close code and reason into a [`ConnectionError`].
///
/// Returns `None` for a normal closure.
#[must_use]
pub fn translate(code: u16, reason: Option<&str>) -> Option<ConnectionError> {
    if code == NORMAL {
        return None;
    }

    let message = match reason {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => default_message(code),
    };

    Some(ConnectionError { code, message })
}

fn default_message(code: u16) -> String {
    match code {
        GOING_AWAY => "Endpoint going away.".to_string(),
        PROTOCOL => "Protocol error.".to_string(),
        UNSUPPORTED => "Unsupported message.".to_string(),
        NO_STATUS => "No status.".to_string(),
        ABNORMAL => "Abnormal disconnection.".to_string(),
        TOO_BIG => "Data frame too large.".to_string(),
        other => format!("Error {other}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn message(code: u16, reason: Option<&str>) -> Option<String> {
        translate(code, reason).map(|e| e.message)
    }

    #[test]
    fn test_table() {
        assert_eq!(message(1001, None).as_deref(), Some("Endpoint going away."));
        assert_eq!(message(1002, None).as_deref(), Some("Protocol error."));
        assert_eq!(message(1003, None).as_deref(), Some("Unsupported message."));
        assert_eq!(message(1005, None).as_deref(), Some("No status."));
        assert_eq!(message(1006, None).as_deref(), Some("Abnormal disconnection."));
        assert_eq!(message(1009, None).as_deref(), Some("Data frame too large."));
        assert_eq!(message(4000, None).as_deref(), Some("Error 4000"));
        assert_eq!(message(1011, None).as_deref(), Some("Error 1011"));
    }

    #[test]
    fn test_normal_closure_has_no_error() {
        assert_eq!(translate(1000, None), None);
        assert_eq!(translate(1000, Some("")), None);
        assert_eq!(translate(1000, Some("bye")), None);
    }

    #[test]
    fn test_empty_reason_falls_back_to_table() {
        assert_eq!(message(1006, Some("")).as_deref(), Some("Abnormal disconnection."));
    }

    #[test]
    fn test_reason_overrides_table() {
        let err = translate(1002, Some("bad frame")).expect("error");
        assert_eq!(err.code, 1002);
        assert_eq!(err.to_string(), "bad frame");
    }

    proptest! {
        #[test]
        fn prop_reason_wins_for_abnormal_codes(code in 1001u16..=4999, reason in "[a-z ]{1,32}") {
            prop_assert_eq!(message(code, Some(reason.as_str())), Some(reason.clone()));
        }

        #[test]
        fn prop_code_is_preserved(code in 1001u16..=4999) {
            let err = translate(code, None).expect("error");
            prop_assert_eq!(err.code, code);
        }
    }
}
