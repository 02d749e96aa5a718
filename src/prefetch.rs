//! Speculative prefetcher.
//!
//! For every candidate choice the [`Prefetcher`] reserves a pending slot in
//! the [`ContinuationStore`] and spawns one generation task. Tasks are
//! independent: a slow or failing choice never holds up its siblings, and a
//! failure only releases its own slot.
//!
//! Every task lives in a [`JoinSet`] owned by the prefetcher, so the owner
//! can wait for outstanding work ([`wait_idle`](Prefetcher::wait_idle)) or
//! tear it down ([`shutdown`](Prefetcher::shutdown)). Dropping the
//! prefetcher aborts whatever is still running; the slot guards abandon
//! their pending entries on the way out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::poll_fn;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::HuginnError;
use crate::cache::{Admission, ContinuationStore, PendingSlot};
use crate::fingerprint::CacheKey;
use crate::providers::CompletionProvider;
use crate::telemetry;
use crate::types::{GenerationRequest, StyleParams};

/// Configuration for speculative generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Upper bound on one generation; past it the slot is abandoned.
    /// Default: 60 seconds.
    pub generation_timeout: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(60),
        }
    }
}

impl PrefetchConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-generation timeout.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }
}

/// What one [`Prefetcher::prefetch`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    /// Generations spawned.
    pub launched: usize,
    /// Choices left alone: blank, already ready, already in flight, or no
    /// room in the store.
    pub skipped: usize,
}

/// Launches and owns speculative generation tasks.
pub struct Prefetcher {
    store: Arc<ContinuationStore>,
    provider: Arc<dyn CompletionProvider>,
    config: PrefetchConfig,
    tasks: Mutex<JoinSet<()>>,
}

impl Prefetcher {
    pub fn new(
        store: Arc<ContinuationStore>,
        provider: Arc<dyn CompletionProvider>,
        config: PrefetchConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start generating a continuation for each choice not already cached
    /// or in flight.
    ///
    /// Admission is decided before this returns; generation runs in the
    /// background. Never fails: blank choices, duplicates and choices the
    /// store has no room for are skipped and counted.
    ///
    /// Outside a Tokio runtime nothing can be spawned, so every choice is
    /// skipped under the `no_runtime` reason.
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
        let history: Arc<[String]> = history.iter().map(|s| s.as_ref().to_owned()).collect();
        let mut summary = PrefetchSummary::default();

        if tokio::runtime::Handle::try_current().is_err() {
            warn!(
                choices = choices.len(),
                "prefetch called outside a tokio runtime"
            );
            for _ in choices {
                self.skip("no_runtime");
            }
            summary.skipped = choices.len();
            return summary;
        }

        for choice in choices {
            let choice = choice.as_ref();
            if choice.trim().is_empty() {
                self.skip("blank");
                summary.skipped += 1;
                continue;
            }

            let key = CacheKey::compute(&history[..], choice, style);
            let admission = self.store.begin_pending(&key);
            if admission != Admission::Admitted {
                debug!(key = %key.short(), reason = admission.reason_label(), "prefetch skipped");
                self.skip(admission.reason_label());
                summary.skipped += 1;
                continue;
            }

            let slot = PendingSlot::new(Arc::clone(&self.store), key);
            let request = GenerationRequest::new(
                Arc::clone(&history),
                choice,
                style.clone(),
                self.config.generation_timeout,
            );
            self.spawn(slot, request);
            summary.launched += 1;
        }

        // Reap finished tasks so the set does not grow across a long session.
        let mut tasks = self.tasks();
        while let Some(result) = tasks.try_join_next() {
            log_join_error(result);
        }

        summary
    }

    fn skip(&self, reason: &'static str) {
        metrics::counter!(telemetry::PREFETCH_SKIPPED_TOTAL, "reason" => reason).increment(1);
    }

    fn spawn(&self, slot: PendingSlot, request: GenerationRequest) {
        let provider = Arc::clone(&self.provider);
        let provider_name = provider.name().to_owned();
        metrics::counter!(telemetry::PREFETCH_LAUNCHED_TOTAL,
            "provider" => provider_name.clone(),
        )
        .increment(1);
        debug!(key = %slot.key().short(), choice = %request.choice, "prefetch launched");

        self.tasks().spawn(async move {
            let start = Instant::now();
            let timeout = request.timeout;
            let outcome = match tokio::time::timeout(timeout, provider.generate(&request)).await {
                Ok(result) => result,
                Err(_) => Err(HuginnError::Timeout(timeout)),
            };

            let key = slot.key();
            let status = match outcome {
                Ok(continuation) => {
                    slot.complete(continuation);
                    debug!(key = %key.short(), "prefetch ready");
                    "ok"
                }
                Err(e) => {
                    // Dropping the slot frees the key for a later attempt.
                    drop(slot);
                    warn!(
                        key = %key.short(),
                        provider = %provider_name,
                        transient = e.is_transient(),
                        error = %e,
                        "prefetch failed"
                    );
                    e.status_label()
                }
            };

            metrics::counter!(telemetry::PREFETCH_COMPLETED_TOTAL,
                "provider" => provider_name.clone(),
                "status" => status,
            )
            .increment(1);
            metrics::histogram!(telemetry::PREFETCH_DURATION_SECONDS,
                "provider" => provider_name,
            )
            .record(start.elapsed().as_secs_f64());
        });
    }

    /// Generations spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        let mut tasks = self.tasks();
        while let Some(result) = tasks.try_join_next() {
            log_join_error(result);
        }
        tasks.len()
    }

    /// Wait until every outstanding generation has finished.
    ///
    /// Tasks spawned while waiting are waited for too.
    pub async fn wait_idle(&self) {
        // The lock is taken per poll and never held across a suspension.
        while let Some(result) = poll_fn(|cx| self.tasks().poll_join_next(cx)).await {
            log_join_error(result);
        }
    }

    /// Abort every outstanding generation.
    ///
    /// Aborted tasks drop their slot guards, which removes their pending
    /// entries; abort is asynchronous, so entries disappear as each task
    /// is torn down.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks();
        if !tasks.is_empty() {
            debug!(tasks = tasks.len(), "aborting prefetch tasks");
        }
        tasks.abort_all();
    }
}

fn log_join_error(result: Result<(), JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        warn!(error = %e, "prefetch task panicked");
    }
}
