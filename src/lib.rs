//! DAppChain client - transaction pipeline and multiplexed WebSocket transport.
//!
//! This library prepares outbound transactions for a DAppChain node and
//! manages the sockets used to talk to it.
//!
//! # Architecture
//!
//! The client has two independent halves:
//!
//! - **Middleware pipeline**: Raw transaction bytes pass through ordered
//!   stages. [`NonceMiddleware`] wraps them with the next nonce,
//!   [`SignatureMiddleware`] signs the result.
//! - **Transport**: A [`ConnectionRegistry`] multiplexes many WebSocket
//!   connections, each with its own state machine and [`ConnectionHandler`].
//!
//! [`RpcClient`] joins the two: it is a JSON-RPC client on top of a registry
//! connection and the [`ChainClient`] the nonce stage queries.
//!
//! Key design principles:
//!
//! - Stages own no state between transactions; the nonce is fetched every time
//! - One dispatcher task per registry delivers all handler callbacks
//! - Close codes become [`ConnectionError`]s, never panics or returned errors
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dappchain_client::{
//!     ConnectionRegistry, Ed25519Signer, MiddlewareChain, NonceMiddleware, Result,
//!     RpcClient, RpcClientOptions, SignatureMiddleware, TxMiddlewareHandler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let private_key = [7u8; 32];
//!     let public_key = Ed25519Signer::public_key(&private_key)?;
//!
//!     let registry = ConnectionRegistry::new()?;
//!     let client = Arc::new(
//!         RpcClient::connect(
//!             &registry,
//!             "ws://127.0.0.1:46657/queryws",
//!             RpcClientOptions::default(),
//!         )
//!         .await?,
//!     );
//!
//!     let chain = MiddlewareChain::builder()
//!         .nonce(NonceMiddleware::new(&public_key, client.clone()))
//!         .signed(SignatureMiddleware::new(private_key.to_vec()))
//!         .build();
//!
//!     let signed = chain.handle(b"raw tx").await?;
//!     let committed = client.commit_tx(&signed).await?;
//!     println!("Committed {} at {:?}", committed.hash, committed.height());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`middleware`] | Transaction pipeline stages and chain |
//! | [`rpc`] | JSON-RPC client, transaction commit, event subscriptions |
//! | [`signer`] | Signing primitive and Ed25519 implementation |
//! | [`transport`] | Connection registry and close-code translation |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing connection and request IDs.
pub mod identifiers;

/// Transaction middleware pipeline.
///
/// - [`NonceMiddleware`] - Wraps bytes with the next nonce
/// - [`SignatureMiddleware`] - Signs bytes
/// - [`MiddlewareChain`] - Runs stages in order
pub mod middleware;

/// JSON-RPC client over a registry connection: calls, commits, events.
pub mod rpc;

/// Signing primitive.
pub mod signer;

/// Multiplexed WebSocket transport.
///
/// Use [`ConnectionRegistry::new()`] to create a registry.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, RequestId};

// Middleware types
pub use middleware::{
    ChainBuilder, ChainClient, MiddlewareChain, NonceEnvelope, NonceMiddleware,
    SignatureMiddleware, SignedEnvelope, TxMiddlewareHandler,
};

// RPC types
pub use rpc::{BroadcastTxResult, ChainEvent, RpcClient, RpcClientOptions, Subscription};

// Signing types
pub use signer::{Ed25519Signer, Signature, Signer, key_identifier};

// Transport types
pub use transport::{
    ConnectionError, ConnectionEvent, ConnectionHandler, ConnectionOptions,
    ConnectionRegistry, ConnectionState, EventChannel, NoopHandler,
};
