//! Multiplexed WebSocket transport.
//!
//! Many logical connections share one [`ConnectionRegistry`]. Each
//! connection has its own socket task, state machine, and handler.
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionRegistry::create` - Register a handler, state `Undefined`
//! 2. `ConnectionRegistry::connect` - Start the handshake, state `Connecting`
//! 3. `on_open` - State `Connected`, frames flow both ways
//! 4. `ConnectionRegistry::disconnect` - State `Disconnecting`
//! 5. `on_close` - State `Disconnected`, with a [`ConnectionError`] unless
//!    the closure was normal
//! 6. `ConnectionRegistry::destroy` - Entry removed
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close_code` | Close code to error translation |
//! | `connection` | Per-connection socket task |
//! | `handler` | Event observer trait and channel adapter |
//! | `options` | Socket limits |
//! | `registry` | Connection table and dispatcher |
//! | `state` | Lifecycle states |

// ============================================================================
// Submodules
// ============================================================================

/// Close code translation.
pub mod close_code;

/// Per-connection socket task.
mod connection;

/// Connection event delivery.
pub mod handler;

/// Socket configuration.
pub mod options;

/// Connection table and dispatcher.
pub mod registry;

/// Connection lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use close_code::{ConnectionError, translate};
pub use handler::{ConnectionEvent, ConnectionHandler, EventChannel, NoopHandler};
pub use options::ConnectionOptions;
pub use registry::ConnectionRegistry;
pub use state::ConnectionState;
