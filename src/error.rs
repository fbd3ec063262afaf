//! Error types for the DAppChain client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use dappchain_client::{Result, TxMiddlewareHandler};
//!
//! async fn submit(chain: &MiddlewareChain, tx: &[u8]) -> Result<Vec<u8>> {
//!     let envelope = chain.handle(tx).await?;
//!     Ok(envelope)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Middleware | [`Error::Transport`], [`Error::Signing`], [`Error::Decode`] |
//! | Lookup | [`Error::ConnectionNotFound`] |
//! | Connection | [`Error::InvalidState`], [`Error::NotConnected`], [`Error::ConnectionClosed`], [`Error::ConnectionTimeout`] |
//! | RPC | [`Error::Rpc`], [`Error::RequestTimeout`], [`Error::TxCommit`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |
//!
//! Close-code errors are not part of this enum. They are delivered to
//! connection handlers as [`ConnectionError`](crate::transport::ConnectionError).

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{ConnectionId, RequestId};
use crate::transport::ConnectionState;

// ============================================================================
// Constants
// ============================================================================

/// Log the node reports with code 1 when a transaction carries a stale nonce.
pub const INVALID_NONCE_LOG: &str = "sequence number does not match";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when options or a middleware chain are assembled incorrectly.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// URL could not be used for a WebSocket connection.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Middleware Errors
    // ========================================================================
    /// Nonce lookup or other chain round trip failed.
    ///
    /// Returned by [`ChainClient`](crate::middleware::ChainClient)
    /// implementations and propagated unchanged through the middleware chain.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// Signing failed.
    ///
    /// Returned by [`Signer`](crate::signer::Signer) implementations.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// Envelope bytes could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// No connection is registered under this ID.
    #[error("Connection not found: {id}")]
    ConnectionNotFound {
        /// The missing connection ID.
        id: ConnectionId,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Operation is not allowed in the connection's current state.
    #[error("Connection {id} is {state}, expected {expected}")]
    InvalidState {
        /// The connection ID.
        id: ConnectionId,
        /// State the connection was in.
        state: ConnectionState,
        /// State the operation requires.
        expected: ConnectionState,
    },

    /// Connection has no socket yet (`connect` was never called).
    #[error("Connection {id} has no socket")]
    NotConnected {
        /// The connection ID.
        id: ConnectionId,
    },

    /// The socket behind a connection has already terminated.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connection did not open in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // RPC Errors
    // ========================================================================
    /// JSON-RPC error object returned by the node.
    #[error("JSON-RPC error {code} ({message}): {data}")]
    Rpc {
        /// Error code reported by the node.
        code: String,
        /// Error message reported by the node.
        message: String,
        /// Additional error data reported by the node.
        data: String,
    },

    /// JSON-RPC request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Node rejected a committed transaction.
    ///
    /// Carries the `check_tx` or `deliver_tx` result code and log.
    #[error("Transaction commit failed [Code {code}] {log}")]
    TxCommit {
        /// Non-zero result code.
        code: u32,
        /// Log message reported with the code.
        log: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a signing error.
    #[inline]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a connection not found error.
    #[inline]
    pub fn connection_not_found(id: ConnectionId) -> Self {
        Self::ConnectionNotFound { id }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(
        id: ConnectionId,
        state: ConnectionState,
        expected: ConnectionState,
    ) -> Self {
        Self::InvalidState {
            id,
            state,
            expected,
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(id: ConnectionId) -> Self {
        Self::NotConnected { id }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a JSON-RPC error.
    #[inline]
    pub fn rpc(
        code: impl Into<String>,
        message: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self::Rpc {
            code: code.into(),
            message: message.into(),
            data: data.into(),
        }
    }

    /// Creates a transaction commit error.
    #[inline]
    pub fn tx_commit(code: u32, log: impl Into<String>) -> Self {
        Self::TxCommit {
            code,
            log: log.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the operation targeted an unknown connection.
    #[inline]
    #[must_use]
    pub fn is_lookup_error(&self) -> bool {
        matches!(self, Self::ConnectionNotFound { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::ConnectionClosed
                | Self::ConnectionTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came out of a middleware stage.
    #[inline]
    #[must_use]
    pub fn is_middleware_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Signing { .. } | Self::Rpc { .. }
        )
    }

    /// Returns `true` if the node rejected a transaction for a stale nonce.
    #[inline]
    #[must_use]
    pub fn is_invalid_nonce(&self) -> bool {
        matches!(
            self,
            Self::TxCommit { code: 1, log } if log == INVALID_NONCE_LOG
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ConnectionId {
        ConnectionId::new(raw).expect("valid connection id")
    }

    #[test]
    fn test_error_display() {
        let err = Error::transport("node unreachable");
        assert_eq!(err.to_string(), "Transport error: node unreachable");
    }

    #[test]
    fn test_lookup_error_display() {
        let err = Error::connection_not_found(id(7));
        assert_eq!(err.to_string(), "Connection not found: 7");
        assert!(err.is_lookup_error());
        assert!(!err.is_connection_error());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::invalid_state(
            id(3),
            ConnectionState::Connected,
            ConnectionState::Undefined,
        );
        assert_eq!(
            err.to_string(),
            "Connection 3 is Connected, expected Undefined"
        );
    }

    #[test]
    fn test_rpc_error_display() {
        let err = Error::rpc("-32603", "Internal error", "nonce query failed");
        assert_eq!(
            err.to_string(),
            "JSON-RPC error -32603 (Internal error): nonce query failed"
        );
        assert!(err.is_middleware_error());
    }

    #[test]
    fn test_tx_commit_display_and_nonce_predicate() {
        let err = Error::tx_commit(1, INVALID_NONCE_LOG);
        assert_eq!(
            err.to_string(),
            "Transaction commit failed [Code 1] sequence number does not match"
        );
        assert!(err.is_invalid_nonce());

        assert!(!Error::tx_commit(1, "other").is_invalid_nonce());
        assert!(!Error::tx_commit(2, INVALID_NONCE_LOG).is_invalid_nonce());
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::connection_timeout(5000);
        let request_err = Error::request_timeout(RequestId::generate(), 10);
        let other_err = Error::signing("bad key");

        assert!(timeout_err.is_timeout());
        assert!(request_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::not_connected(id(1)).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
