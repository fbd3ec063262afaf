//! RPC client configuration.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for the socket to open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on requests awaiting a response.
pub const DEFAULT_MAX_PENDING: usize = 100;

// ============================================================================
// RpcClientOptions
// ============================================================================

/// Timeouts and limits for an [`RpcClient`](super::RpcClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcClientOptions {
    /// Time to wait for each response.
    pub request_timeout: Duration,
    /// Time to wait for the socket to open.
    pub connect_timeout: Duration,
    /// Maximum requests awaiting a response at once.
    pub max_pending: usize,
}

impl Default for RpcClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl RpcClientOptions {
    /// Creates options with default values.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the pending request limit.
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout or the pending limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be non-zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be non-zero"));
        }

        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be at least 1"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RpcClientOptions::new();
        assert_eq!(options.request_timeout.as_secs(), 30);
        assert_eq!(options.connect_timeout.as_secs(), 30);
        assert_eq!(options.max_pending, 100);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let options = RpcClientOptions::new()
            .with_request_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(2))
            .with_max_pending(4);

        assert_eq!(options.request_timeout, Duration::from_millis(250));
        assert_eq!(options.connect_timeout, Duration::from_secs(2));
        assert_eq!(options.max_pending, 4);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(
            RpcClientOptions::new()
                .with_request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            RpcClientOptions::new()
                .with_connect_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );

        let err = RpcClientOptions::new().with_max_pending(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
