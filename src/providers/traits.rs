//! Completion provider trait.
//!
//! A provider turns a [`GenerationRequest`] into a [`Continuation`]. It
//! decodes its wire format once, at its own boundary; everything above it
//! only sees the typed result.
//!
//! # Example
//!
//! ```ignore
//! struct Canned;
//!
//! #[async_trait]
//! impl CompletionProvider for Canned {
//!     fn name(&self) -> &str {
//!         "canned"
//!     }
//!
//!     async fn generate(&self, request: &GenerationRequest) -> Result<Continuation> {
//!         Ok(Continuation::new(
//!             format!("You chose to {}.", request.choice),
//!             vec!["Go on".into(), "Turn back".into(), "Wait".into()],
//!         ))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::{Continuation, GenerationRequest};

/// Source of generated continuations.
///
/// Implementations should honour `request.timeout` where their transport
/// allows it. Callers enforce the same bound independently, so a provider
/// that ignores it is cut off rather than waited on.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Generate the continuation that follows `request.choice`.
    async fn generate(&self, request: &GenerationRequest) -> Result<Continuation>;
}

