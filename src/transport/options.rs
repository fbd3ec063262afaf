//! Socket configuration for registry connections.
//!
//! # Example
//!
//! ```ignore
//! use dappchain_client::transport::{ConnectionOptions, ConnectionRegistry};
//!
//! let options = ConnectionOptions::new()
//!     .with_max_message_size(4 << 20)
//!     .with_max_frame_size(1 << 20);
//!
//! let registry = ConnectionRegistry::with_options(options)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default maximum inbound message size (64 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

/// Default maximum inbound frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;

/// Default write buffer size (128 KiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 128 * 1024;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Limits applied to every socket a registry opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Largest inbound message accepted. Larger messages close with 1009.
    pub max_message_size: usize,
    /// Largest single inbound frame accepted.
    pub max_frame_size: usize,
    /// Bytes buffered before a write is flushed.
    pub write_buffer_size: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }
}

impl ConnectionOptions {
    /// Creates options with default limits.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum inbound message size.
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Sets the maximum inbound frame size.
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Sets the write buffer size.
    #[must_use]
    pub fn with_write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a limit is zero or a frame may exceed
    /// the message limit.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 || self.max_frame_size == 0 {
            return Err(Error::config("Message and frame size limits must be non-zero"));
        }

        if self.max_frame_size > self.max_message_size {
            return Err(Error::config(format!(
                "max_frame_size ({}) exceeds max_message_size ({})",
                self.max_frame_size, self.max_message_size
            )));
        }

        Ok(())
    }

    /// Converts to the socket library's configuration.
    #[must_use]
    pub(crate) fn to_ws_config(self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_frame_size))
            .write_buffer_size(self.write_buffer_size)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = ConnectionOptions::new();
        assert_eq!(options.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let options = ConnectionOptions::new()
            .with_max_message_size(1024)
            .with_max_frame_size(512)
            .with_write_buffer_size(0);

        assert_eq!(options.max_message_size, 1024);
        assert_eq!(options.max_frame_size, 512);
        assert_eq!(options.write_buffer_size, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let err = ConnectionOptions::new()
            .with_max_message_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_frame_larger_than_message() {
        let err = ConnectionOptions::new()
            .with_max_message_size(100)
            .with_max_frame_size(200)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_to_ws_config() {
        let config = ConnectionOptions::new()
            .with_max_message_size(2048)
            .with_max_frame_size(1024)
            .to_ws_config();

        assert_eq!(config.max_message_size, Some(2048));
        assert_eq!(config.max_frame_size, Some(1024));
    }
}
