//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: completion provider name (e.g. "openai-compatible")
//! - `status`: outcome: "ok", "error" or "timeout"
//! - `reason`: why a prefetch was skipped ("ready", "in_flight", "full", "blank",
//!   "no_runtime")

/// Lookups served from a Ready entry.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Lookups that found nothing servable (absent, expired or still pending).
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Estimated tokens avoided by cache hits.
pub const TOKENS_SAVED_TOTAL: &str = "huginn_tokens_saved_total";

/// Ready entries removed to make room for new work.
pub const EVICTIONS_TOTAL: &str = "huginn_evictions_total";

/// Speculative generations spawned.
///
/// Labels: `provider`.
pub const PREFETCH_LAUNCHED_TOTAL: &str = "huginn_prefetch_launched_total";

/// Candidate choices not prefetched.
///
/// Labels: `reason` ("ready" | "in_flight" | "full" | "blank" |
/// "no_runtime").
pub const PREFETCH_SKIPPED_TOTAL: &str = "huginn_prefetch_skipped_total";

/// Finished speculative generations.
///
/// Labels: `provider`, `status` ("ok" | "error" | "timeout").
pub const PREFETCH_COMPLETED_TOTAL: &str = "huginn_prefetch_completed_total";

/// Wall time of a speculative generation, in seconds.
///
/// Labels: `provider`.
pub const PREFETCH_DURATION_SECONDS: &str = "huginn_prefetch_duration_seconds";

/// Requests answered by the request dedup layer instead of the provider.
pub const DEDUP_HITS_TOTAL: &str = "huginn_dedup_hits_total";
