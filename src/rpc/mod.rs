//! JSON-RPC over the connection registry.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | [`RpcClient`] with request/response correlation and event subscriptions |
//! | `message` | JSON-RPC 2.0 request, response, commit and event types |
//! | `options` | [`RpcClientOptions`] |

// ============================================================================
// Submodules
// ============================================================================

/// JSON-RPC client.
pub mod client;

/// JSON-RPC message types.
pub mod message;

/// Client configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{RpcClient, Subscription};
pub use message::{BroadcastTxResult, ChainEvent, RpcRequest, RpcResponse, TxResult};
pub use options::RpcClientOptions;
