//! Request type handed to completion providers.

use std::sync::Arc;
use std::time::Duration;

use super::StyleParams;

/// Everything a provider needs to generate one continuation.
///
/// The history is shared (`Arc<[String]>`) because a single prefetch fans
/// the same snapshot out to one task per candidate choice.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Previously generated segments, oldest first.
    pub history: Arc<[String]>,
    /// The option the continuation should follow.
    pub choice: String,
    pub style: StyleParams,
    /// Upper bound the caller will wait for this request.
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(
        history: impl Into<Arc<[String]>>,
        choice: impl Into<String>,
        style: StyleParams,
        timeout: Duration,
    ) -> Self {
        Self {
            history: history.into(),
            choice: choice.into(),
            style,
            timeout,
        }
    }

    /// Whether this request opens a story (no prior segments).
    pub fn is_opening(&self) -> bool {
        self.history.is_empty()
    }
}
