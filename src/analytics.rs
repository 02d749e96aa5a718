//! Hit/miss accounting and estimated savings.
//!
//! [`AnalyticsRecorder`] keeps process-lifetime counters in atomics so it
//! can be shared (`Arc`) between sessions and called from any task without
//! blocking. Every recording is mirrored to the `metrics` facade; the
//! in-process counters exist so a reporting surface can read a consistent
//! [`AnalyticsSnapshot`] without a metrics exporter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::telemetry;

/// Configuration for savings estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    /// Blended price used to turn saved tokens into money. Default: 0.375 USD
    /// per million tokens.
    pub usd_per_million_tokens: f64,
    /// Tokens credited for a hit whose continuation carries no usage
    /// figures. Default: 600.
    pub default_tokens_saved: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            usd_per_million_tokens: 0.375,
            default_tokens_saved: 600,
        }
    }
}

impl AnalyticsConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price per million tokens.
    pub fn usd_per_million_tokens(mut self, price: f64) -> Self {
        self.usd_per_million_tokens = price;
        self
    }

    /// Set the token credit for hits without usage data.
    pub fn default_tokens_saved(mut self, tokens: u64) -> Self {
        self.default_tokens_saved = tokens;
        self
    }
}

/// Monotonic counters for cache effectiveness.
#[derive(Debug)]
pub struct AnalyticsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    tokens_saved: AtomicU64,
    dedup_hits: AtomicU64,
    dedup_tokens_saved: AtomicU64,
    config: AnalyticsConfig,
}

impl AnalyticsRecorder {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            tokens_saved: AtomicU64::new(0),
            dedup_hits: AtomicU64::new(0),
            dedup_tokens_saved: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Count a lookup served from cache.
    pub fn record_hit(&self, estimated_tokens_saved: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.tokens_saved
            .fetch_add(estimated_tokens_saved, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        metrics::counter!(telemetry::TOKENS_SAVED_TOTAL).increment(estimated_tokens_saved);
    }

    /// Count a lookup that fell back to synchronous generation.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    }

    /// Count a provider request answered by the request dedup layer.
    pub fn record_dedup_hit(&self, tokens_saved: u64) {
        self.dedup_hits.fetch_add(1, Ordering::Relaxed);
        self.dedup_tokens_saved
            .fetch_add(tokens_saved, Ordering::Relaxed);
        metrics::counter!(telemetry::DEDUP_HITS_TOTAL).increment(1);
    }

    /// Read the current counters.
    ///
    /// Each counter is read atomically; the snapshot as a whole is not a
    /// single atomic cut, which is fine for display.
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        let tokens_saved = self.tokens_saved.load(Ordering::Relaxed);
        AnalyticsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            tokens_saved,
            estimated_cost_saved: tokens_saved as f64 / 1_000_000.0
                * self.config.usd_per_million_tokens,
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
            dedup_tokens_saved: self.dedup_tokens_saved.load(Ordering::Relaxed),
        }
    }
}

impl Default for AnalyticsRecorder {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}

/// Read-only view of [`AnalyticsRecorder`] counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Estimated tokens avoided by cache hits.
    pub tokens_saved: u64,
    /// `tokens_saved` priced at the configured rate, in USD.
    pub estimated_cost_saved: f64,
    pub dedup_hits: u64,
    pub dedup_tokens_saved: u64,
}

impl AnalyticsSnapshot {
    /// Total lookups recorded.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from cache, `0.0` when there were none.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

impl fmt::Display for AnalyticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Continuation Cache Report ===")?;
        writeln!(f, "Hit rate:        {:.1}%", self.hit_rate() * 100.0)?;
        writeln!(f, "Hits:            {}", self.hits)?;
        writeln!(f, "Misses:          {}", self.misses)?;
        writeln!(f, "Tokens saved:    {}", format_count(self.tokens_saved))?;
        writeln!(f, "Estimated saved: ${:.4}", self.estimated_cost_saved)?;
        write!(
            f,
            "Request dedup:   {} hits, {} tokens",
            self.dedup_hits,
            format_count(self.dedup_tokens_saved)
        )
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
