//! Completion providers.
//!
//! The cache treats generation as a black box behind [`CompletionProvider`].
//! This module holds the trait, an HTTP client for OpenAI-compatible chat
//! completion endpoints, and the [`DedupingProvider`] decorator.

pub mod dedup;
#[cfg(feature = "openai-compatible")]
pub mod openai;
pub mod prompt;
pub mod traits;

pub use dedup::{DedupConfig, DedupingProvider};
#[cfg(feature = "openai-compatible")]
pub use openai::OpenAiCompatibleClient;
pub use traits::CompletionProvider;
