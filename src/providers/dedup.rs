//! Request deduplication decorator.
//!
//! [`DedupingProvider`] remembers recent provider answers for a short TTL
//! and replays them for identical requests, so a synchronous fallback that
//! repeats a request the provider just answered costs nothing. It sits
//! below the continuation store: the store decides *whether* to generate,
//! this layer avoids paying twice for the same prompt.
//!
//! Uses moka's async LRU + TTL cache, keyed on the request fingerprint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use super::traits::CompletionProvider;
use crate::Result;
use crate::analytics::AnalyticsRecorder;
use crate::fingerprint::CacheKey;
use crate::types::{Continuation, GenerationRequest};

/// Configuration for request deduplication.
///
/// ```rust
/// # use huginn::DedupConfig;
/// # use std::time::Duration;
/// let config = DedupConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    /// Maximum remembered responses. Default: 100.
    pub max_entries: u64,
    /// How long a response can be replayed. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
        }
    }
}

impl DedupConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of remembered responses.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the replay window.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Decorator that replays recent answers for identical requests.
///
/// Only successes are remembered; a failed request goes to the inner
/// provider again next time.
pub struct DedupingProvider {
    inner: Arc<dyn CompletionProvider>,
    cache: Cache<CacheKey, Continuation>,
    analytics: Option<Arc<AnalyticsRecorder>>,
}

impl DedupingProvider {
    /// Wrap a provider with request deduplication.
    pub fn new(inner: Arc<dyn CompletionProvider>, config: &DedupConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self {
            inner,
            cache,
            analytics: None,
        }
    }

    /// Report replayed requests to `analytics`.
    pub fn with_analytics(mut self, analytics: Arc<AnalyticsRecorder>) -> Self {
        self.analytics = Some(analytics);
        self
    }
}

#[async_trait]
impl CompletionProvider for DedupingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Continuation> {
        let key = CacheKey::for_request(request);

        if let Some(mut cached) = self.cache.get(&key).await {
            let tokens_saved = cached.total_tokens().unwrap_or(0);
            debug!(key = %key.short(), tokens_saved, "replaying deduplicated request");
            if let Some(analytics) = &self.analytics {
                analytics.record_dedup_hit(tokens_saved);
            }
            // Nothing was spent on this answer.
            cached.usage = None;
            return Ok(cached);
        }

        let continuation = self.inner.generate(request).await?;
        self.cache.insert(key, continuation.clone()).await;
        Ok(continuation)
    }
}
