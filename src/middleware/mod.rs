//! Transaction middleware pipeline.
//!
//! Outbound transactions pass through an ordered list of stages. Each stage
//! receives the previous stage's output and wraps it into an envelope:
//!
//! ```text
//! raw tx ──► NonceMiddleware ──► SignatureMiddleware ──► signed bytes
//!            (chain round trip)   (local compute)
//! ```
//!
//! The signature stage signs whatever bytes it is handed, so putting the
//! nonce stage first is what makes the nonce part of the signed payload.
//! [`ChainBuilder`] only offers `.signed(..)` after `.nonce(..)`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `chain` | [`MiddlewareChain`] and its typed builder |
//! | `envelope` | Protobuf envelope messages |
//! | `nonce` | [`NonceMiddleware`] and the [`ChainClient`] seam |
//! | `signed` | [`SignatureMiddleware`] |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Ordered stage orchestration.
pub mod chain;

/// Envelope wire messages.
pub mod envelope;

/// Nonce injection stage.
pub mod nonce;

/// Signing stage.
pub mod signed;

// ============================================================================
// Re-exports
// ============================================================================

pub use chain::{ChainBuilder, MiddlewareChain};
pub use envelope::{NonceEnvelope, SignedEnvelope};
pub use nonce::{ChainClient, NonceMiddleware};
pub use signed::SignatureMiddleware;

// ============================================================================
// TxMiddlewareHandler
// ============================================================================

/// One stage of the transaction pipeline.
///
/// Handlers transform the input and return the result. They must not keep
/// or modify the input bytes. A stage may suspend while it waits on the
/// network; it must not block the executor.
#[async_trait]
pub trait TxMiddlewareHandler: Send + Sync {
    /// Transforms `tx_data` into the next stage's input.
    ///
    /// # Errors
    ///
    /// Any error aborts the chain the stage is part of.
    async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T> TxMiddlewareHandler for Arc<T>
where
    T: TxMiddlewareHandler + ?Sized,
{
    async fn handle(&self, tx_data: &[u8]) -> Result<Vec<u8>> {
        (**self).handle(tx_data).await
    }
}
