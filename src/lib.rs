//! Huginn - speculative continuation cache for branching narratives
//!
//! In a choose-your-own-adventure flow the reader picks one of a few
//! options and waits for the next segment. Huginn generates the segment for
//! every option while the reader is still deciding, deduplicates concurrent
//! requests for the same narrative state, serves finished continuations
//! without added latency and records what the cache saved.
//!
//! A miss is never an error: the story engine falls back to generating on
//! demand ([`StorySession::continue_story`] does both).
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Huginn, StyleParams};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let session = Huginn::builder()
//!         .openai_compatible("https://openrouter.ai/api/v1", None, "openai/gpt-4o-mini")
//!         .build()?;
//!
//!     let style = StyleParams::new("Fantasy", "Roald Dahl", "Early Reader");
//!     let mut history: Vec<String> = Vec::new();
//!
//!     let opening = session
//!         .continue_story(&history, "A fox who cannot sleep", &style)
//!         .await?;
//!     history.push(opening.text.clone());
//!
//!     // Generate every branch while the reader decides.
//!     session.prefetch(&history, &opening.next_choices, &style);
//!
//!     // Usually served straight from the cache.
//!     let next = session
//!         .continue_story(&history, &opening.next_choices[0], &style)
//!         .await?;
//!     println!("{}", next.text);
//!     println!("{}", session.snapshot());
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod prefetch;
pub mod providers;
pub mod session;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{HuginnError, Result};
pub use session::{Huginn, HuginnBuilder, StorySession};

pub use analytics::{AnalyticsConfig, AnalyticsRecorder, AnalyticsSnapshot};
pub use cache::{Admission, CacheConfig, ContinuationStore, PendingSlot, StoreStats};
pub use config::Config;
pub use fingerprint::{CacheKey, compute_key};
pub use prefetch::{PrefetchConfig, PrefetchSummary, Prefetcher};
pub use providers::{CompletionProvider, DedupConfig, DedupingProvider};

#[cfg(feature = "openai-compatible")]
pub use providers::OpenAiCompatibleClient;

// Re-export all types
pub use types::{Continuation, GenerationRequest, StyleParams, Usage};
