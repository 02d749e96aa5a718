//! StorySession - the speculative continuation cache as seen by a story engine.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsRecorder, AnalyticsSnapshot};
use crate::cache::ContinuationStore;
use crate::fingerprint::CacheKey;
use crate::prefetch::{PrefetchSummary, Prefetcher};
use crate::providers::CompletionProvider;
use crate::types::{Continuation, GenerationRequest, StyleParams};
use crate::{HuginnError, Result};

/// One reader's cache: a store, the prefetcher feeding it and the
/// analytics it reports to.
///
/// Built with [`Huginn::builder()`](crate::Huginn::builder). Dropping the
/// session aborts outstanding prefetches; call
/// [`wait_idle`](Self::wait_idle) first to let them land.
pub struct StorySession {
    store: Arc<ContinuationStore>,
    provider: Arc<dyn CompletionProvider>,
    prefetcher: Prefetcher,
    analytics: Arc<AnalyticsRecorder>,
}

impl StorySession {
    pub(crate) fn new(
        store: Arc<ContinuationStore>,
        provider: Arc<dyn CompletionProvider>,
        prefetcher: Prefetcher,
        analytics: Arc<AnalyticsRecorder>,
    ) -> Self {
        Self {
            store,
            provider,
            prefetcher,
            analytics,
        }
    }

    /// Speculatively generate the continuation for each candidate choice.
    ///
    /// Returns as soon as admission is decided; never fails. Choices that
    /// are blank, already cached, already in flight or that do not fit in
    /// the store are skipped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime and a generation needs to
    /// be spawned.
    pub fn prefetch<H, C>(
        &self,
        history: &[H],
        choices: &[C],
        style: &StyleParams,
    ) -> PrefetchSummary
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        self.prefetcher.prefetch(history, choices, style)
    }

    /// Probe the cache for the continuation of `choice`.
    ///
    /// Never blocks on generation: a pending entry is a miss. Every call
    /// records exactly one hit or one miss.
    pub fn lookup<H: AsRef<str>>(
        &self,
        history: &[H],
        choice: &str,
        style: &StyleParams,
    ) -> Option<Continuation> {
        if choice.trim().is_empty() {
            self.analytics.record_miss();
            return None;
        }

        let key = CacheKey::compute(history, choice, style);
        match self.store.get(&key) {
            Some(continuation) => {
                let tokens_saved = continuation
                    .total_tokens()
                    .unwrap_or(self.analytics.config().default_tokens_saved);
                debug!(key = %key.short(), tokens_saved, "cache hit");
                self.analytics.record_hit(tokens_saved);
                Some(continuation)
            }
            None => {
                debug!(key = %key.short(), pending = self.store.is_pending(&key), "cache miss");
                self.analytics.record_miss();
                None
            }
        }
    }

    /// Continue the story: serve from cache, or generate now.
    ///
    /// On a miss the continuation is generated synchronously under the
    /// prefetch timeout. If the key is free it is reserved first so the
    /// result is cached; if a prefetch is already in flight for it, this
    /// call does not wait for it. Provider errors are returned.
    pub async fn continue_story<H: AsRef<str>>(
        &self,
        history: &[H],
        choice: &str,
        style: &StyleParams,
    ) -> Result<Continuation> {
        if choice.trim().is_empty() {
            return Err(HuginnError::InvalidInput("choice must not be empty".into()));
        }

        if let Some(continuation) = self.lookup(history, choice, style) {
            return Ok(continuation);
        }

        let history: Arc<[String]> = history.iter().map(|s| s.as_ref().to_owned()).collect();
        let key = CacheKey::compute(&history[..], choice, style);
        let slot = self.store.reserve(key);
        let timeout = self.prefetcher.config().generation_timeout;
        let request = GenerationRequest::new(history, choice, style.clone(), timeout);

        let outcome = match tokio::time::timeout(timeout, self.provider.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(HuginnError::Timeout(timeout)),
        };

        match outcome {
            Ok(continuation) => {
                if let Some(slot) = slot {
                    slot.complete(continuation.clone());
                }
                Ok(continuation)
            }
            Err(e) => {
                warn!(key = %key.short(), error = %e, "synchronous generation failed");
                Err(e)
            }
        }
    }

    /// Whether a speculative generation for `choice` is still running.
    pub fn is_prefetching<H: AsRef<str>>(
        &self,
        history: &[H],
        choice: &str,
        style: &StyleParams,
    ) -> bool {
        self.store.is_pending(&CacheKey::compute(history, choice, style))
    }

    /// Drop every cached continuation, e.g. when the reader starts over.
    ///
    /// In-flight generations are left running and still land in the store
    /// when they finish; they expire like any other entry.
    pub fn clear(&self) -> usize {
        let removed = self.store.clear_ready();
        debug!(removed, "cleared ready continuations");
        removed
    }

    pub fn analytics(&self) -> &Arc<AnalyticsRecorder> {
        &self.analytics
    }

    /// Shorthand for `analytics().snapshot()`.
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        self.analytics.snapshot()
    }

    pub fn store(&self) -> &Arc<ContinuationStore> {
        &self.store
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Speculative generations not yet finished.
    pub fn in_flight(&self) -> usize {
        self.prefetcher.in_flight()
    }

    /// Wait for every outstanding prefetch to finish.
    pub async fn wait_idle(&self) {
        self.prefetcher.wait_idle().await;
    }

    /// Abort outstanding prefetches. Their pending entries are released.
    pub fn shutdown(&self) {
        info!(
            in_flight = self.prefetcher.in_flight(),
            "story session shutting down"
        );
        self.prefetcher.shutdown();
    }
}
