//! End-to-end tests for `StorySession`: prefetch, lookup and the
//! synchronous fallback against mock providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use huginn::{
    CacheConfig, CompletionProvider, Continuation, DedupConfig, GenerationRequest, Huginn,
    HuginnError, PrefetchConfig, PrefetchSummary, Result, StorySession, StyleParams, Usage,
};

// ============================================================================
// Mock providers
// ============================================================================

/// Deterministic story provider. Choices listed in `failing` error out,
/// choices in `stalling` sleep far past any timeout.
#[derive(Default)]
struct MockStoryProvider {
    calls: AtomicUsize,
    failing: Vec<&'static str>,
    stalling: Vec<&'static str>,
    delay: Duration,
    usage: Option<Usage>,
}

impl MockStoryProvider {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockStoryProvider {
    fn name(&self) -> &str {
        "mock-story"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Continuation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let choice = request.choice.as_str();

        if self.stalling.contains(&choice) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&choice) {
            return Err(HuginnError::MalformedResponse("not json".into()));
        }

        let continuation = Continuation::new(
            format!("After you chose to {choice}, the forest went quiet."),
            vec!["listen".into(), "run".into(), "hide".into()],
        );
        Ok(match self.usage {
            Some(usage) => continuation.with_usage(usage),
            None => continuation,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

const CHOICES: [&str; 3] = ["go left", "go right", "stay"];

fn history() -> Vec<String> {
    vec![
        "Mira stepped into the forest.".to_string(),
        "The path split in two.".to_string(),
    ]
}

fn style() -> StyleParams {
    StyleParams::new("Fantasy", "Ursula K. Le Guin", "Middle Grade")
}

fn session_with(provider: Arc<MockStoryProvider>, cache: CacheConfig) -> StorySession {
    Huginn::builder()
        .provider(provider)
        .cache(cache)
        .prefetch(
            PrefetchConfig::new().generation_timeout(Duration::from_secs(5)),
        )
        .build()
        .expect("session builds")
}

fn session(provider: Arc<MockStoryProvider>) -> StorySession {
    session_with(provider, CacheConfig::default())
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn prefetched_choice_is_served_and_counted_once() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider.clone());

    let summary = session.prefetch(&history(), &CHOICES, &style());
    assert_eq!(
        summary,
        PrefetchSummary {
            launched: 3,
            skipped: 0
        }
    );
    session.wait_idle().await;

    let hit = session
        .lookup(&history(), "go left", &style())
        .expect("prefetched continuation");
    assert_eq!(
        hit.text,
        "After you chose to go left, the forest went quiet."
    );
    assert_eq!(hit.next_choices, vec!["listen", "run", "hide"]);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.hits, 1);
    assert_eq!(snapshot.misses, 0);
    // No usage reported: the default credit applies.
    assert_eq!(snapshot.tokens_saved, 600);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn timed_out_choice_misses_while_siblings_hit() {
    let provider = Arc::new(MockStoryProvider {
        stalling: vec!["stay"],
        ..Default::default()
    });
    let session = session(provider);

    session.prefetch(&history(), &CHOICES, &style());
    session.wait_idle().await;

    assert!(session.lookup(&history(), "stay", &style()).is_none());
    assert!(!session.is_prefetching(&history(), "stay", &style()));
    assert!(session.lookup(&history(), "go left", &style()).is_some());
    assert!(session.lookup(&history(), "go right", &style()).is_some());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.hits, 2);
}

#[tokio::test]
async fn never_prefetched_key_misses_immediately() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider.clone());

    let started = std::time::Instant::now();
    assert!(session.lookup(&history(), "fly away", &style()).is_none());
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(session.snapshot().misses, 1);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn capacity_two_holds_two_entries() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session_with(provider.clone(), CacheConfig::new().max_entries(2));

    let summary = session.prefetch(&history(), &CHOICES, &style());
    assert_eq!(summary.launched, 2);
    assert_eq!(summary.skipped, 1);
    assert!(session.store().len() <= 2);

    session.wait_idle().await;
    let stats = session.store().stats();
    assert_eq!(stats.ready, 2);
    assert_eq!(stats.pending, 0);
    assert!(session.lookup(&history(), "stay", &style()).is_none());
    assert_eq!(provider.calls(), 2);
}

// ============================================================================
// Failure isolation and dedup
// ============================================================================

#[tokio::test]
async fn failed_prefetch_leaves_key_free_for_retry() {
    let provider = Arc::new(MockStoryProvider {
        failing: vec!["go right"],
        ..Default::default()
    });
    let session = session(provider.clone());

    session.prefetch(&history(), &["go left", "go right"], &style());
    session.wait_idle().await;

    assert!(session.lookup(&history(), "go left", &style()).is_some());
    assert!(session.lookup(&history(), "go right", &style()).is_none());
    assert_eq!(session.store().len(), 1);

    // The failed key can be prefetched again.
    let retry = session.prefetch(&history(), &["go right"], &style());
    assert_eq!(retry.launched, 1);
    session.wait_idle().await;
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_prefetch_while_in_flight_is_deduplicated() {
    let provider = Arc::new(MockStoryProvider {
        delay: Duration::from_secs(2),
        ..Default::default()
    });
    let session = session(provider.clone());

    session.prefetch(&history(), &CHOICES, &style());
    assert!(session.is_prefetching(&history(), "go left", &style()));

    let again = session.prefetch(&history(), &CHOICES, &style());
    assert_eq!(again.launched, 0);
    assert_eq!(again.skipped, 3);

    // Pending entries are not served.
    assert!(session.lookup(&history(), "go left", &style()).is_none());

    session.wait_idle().await;
    assert_eq!(provider.calls(), 3);
    assert!(!session.is_prefetching(&history(), "go left", &style()));
}

#[tokio::test]
async fn different_history_or_style_is_a_different_key() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider);

    session.prefetch(&history(), &["go left"], &style());
    session.wait_idle().await;

    let mut longer = history();
    longer.push("A crow called out.".to_string());
    assert!(session.lookup(&longer, "go left", &style()).is_none());

    let other = StyleParams::new("Mystery", "Ursula K. Le Guin", "Middle Grade");
    assert!(session.lookup(&history(), "go left", &other).is_none());

    assert!(session.lookup(&history(), "go left", &style()).is_some());
}

// ============================================================================
// Synchronous fallback
// ============================================================================

#[tokio::test]
async fn continue_story_uses_cache_when_possible() {
    let provider = Arc::new(MockStoryProvider {
        usage: Some(Usage::new(500, 250)),
        ..Default::default()
    });
    let session = session(provider.clone());

    session.prefetch(&history(), &["go left"], &style());
    session.wait_idle().await;

    let step = session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap();
    assert!(step.text.contains("go left"));
    assert_eq!(provider.calls(), 1);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.hits, 1);
    assert_eq!(snapshot.tokens_saved, 750);
}

#[tokio::test]
async fn continue_story_generates_and_caches_on_miss() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider.clone());

    let first = session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(session.snapshot().misses, 1);

    // The synchronous result landed in the cache.
    let second = session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(provider.calls(), 1);
    assert_eq!(session.snapshot().hits, 1);
}

#[tokio::test]
async fn continue_story_returns_provider_errors() {
    let provider = Arc::new(MockStoryProvider {
        failing: vec!["go left"],
        ..Default::default()
    });
    let session = session(provider);

    let err = session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::MalformedResponse(_)));
    // The reservation was released.
    assert!(session.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn continue_story_times_out() {
    let provider = Arc::new(MockStoryProvider {
        stalling: vec!["stay"],
        ..Default::default()
    });
    let session = session(provider);

    let err = session
        .continue_story(&history(), "stay", &style())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Timeout(t) if t == Duration::from_secs(5)));
    assert!(session.store().is_empty());
}

#[tokio::test]
async fn continue_story_rejects_blank_choice() {
    let session = session(Arc::new(MockStoryProvider::default()));
    let err = session
        .continue_story(&history(), "   ", &style())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::InvalidInput(_)));
}

#[tokio::test]
async fn opening_segment_with_empty_history() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider);

    let empty: Vec<String> = Vec::new();
    let opening = session
        .continue_story(&empty, "Begin the story", &style())
        .await
        .unwrap();
    assert_eq!(opening.next_choices.len(), 3);
}

// ============================================================================
// Reset, teardown, shared analytics
// ============================================================================

#[tokio::test]
async fn clear_drops_ready_entries() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session(provider);

    session.prefetch(&history(), &CHOICES, &style());
    session.wait_idle().await;
    assert_eq!(session.clear(), 3);

    assert!(session.store().is_empty());
    assert!(session.lookup(&history(), "go left", &style()).is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_pending_entries() {
    let provider = Arc::new(MockStoryProvider {
        delay: Duration::from_secs(30),
        ..Default::default()
    });
    let session = session_with(provider, CacheConfig::new().max_entries(3));

    session.prefetch(&history(), &CHOICES, &style());
    assert_eq!(session.store().pending_count(), 3);

    session.shutdown();
    session.wait_idle().await;
    assert!(session.store().is_empty());
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_misses() {
    let provider = Arc::new(MockStoryProvider::default());
    let session = session_with(provider, CacheConfig::new().ttl(Duration::from_secs(60)));

    session.prefetch(&history(), &["go left"], &style());
    session.wait_idle().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(session.lookup(&history(), "go left", &style()).is_none());
    assert!(session.store().is_empty());
}

#[tokio::test]
async fn sessions_can_share_a_recorder() {
    let recorder = Arc::new(huginn::AnalyticsRecorder::default());
    let build = || {
        Huginn::builder()
            .provider(Arc::new(MockStoryProvider::default()))
            .analytics(Arc::clone(&recorder))
            .build()
            .unwrap()
    };
    let first = build();
    let second = build();

    first.lookup(&history(), "go left", &style());
    second.lookup(&history(), "go left", &style());

    assert_eq!(recorder.snapshot().misses, 2);
}

#[tokio::test]
async fn request_dedup_replays_identical_generation() {
    let provider = Arc::new(MockStoryProvider {
        usage: Some(Usage::new(300, 100)),
        ..Default::default()
    });
    let session = Huginn::builder()
        .provider(provider.clone())
        .request_dedup(DedupConfig::default())
        .build()
        .unwrap();

    session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap();
    // A reset drops the cached continuation, but the request layer still
    // remembers the answer.
    session.clear();
    session
        .continue_story(&history(), "go left", &style())
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.misses, 2);
    assert_eq!(snapshot.dedup_hits, 1);
    assert_eq!(snapshot.dedup_tokens_saved, 400);
}
