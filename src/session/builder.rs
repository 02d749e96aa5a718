//! Builder for configuring story sessions

use std::sync::Arc;

use tracing::info;

use super::StorySession;
use crate::analytics::{AnalyticsConfig, AnalyticsRecorder};
use crate::cache::{CacheConfig, ContinuationStore};
use crate::config::Config;
use crate::prefetch::{PrefetchConfig, Prefetcher};
use crate::providers::{CompletionProvider, DedupConfig, DedupingProvider};
use crate::{HuginnError, Result};

/// Main entry point for creating story sessions.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring a session.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Settings for the built-in OpenAI-compatible client.
#[cfg(feature = "openai-compatible")]
struct OpenAiSettings {
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

/// Builder for configuring story sessions.
pub struct HuginnBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    #[cfg(feature = "openai-compatible")]
    openai: Option<OpenAiSettings>,
    cache: CacheConfig,
    prefetch: PrefetchConfig,
    analytics_config: AnalyticsConfig,
    analytics: Option<Arc<AnalyticsRecorder>>,
    dedup: Option<DedupConfig>,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            #[cfg(feature = "openai-compatible")]
            openai: None,
            cache: CacheConfig::default(),
            prefetch: PrefetchConfig::default(),
            analytics_config: AnalyticsConfig::default(),
            analytics: None,
            dedup: None,
        }
    }

    /// Use a custom completion provider.
    ///
    /// Takes precedence over [`openai_compatible`](Self::openai_compatible).
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use an OpenAI-compatible chat completion endpoint.
    #[cfg(feature = "openai-compatible")]
    pub fn openai_compatible(
        mut self,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        self.openai = Some(OpenAiSettings {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            max_tokens: None,
            temperature: None,
        });
        self
    }

    /// Set the continuation store configuration.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the speculative generation configuration.
    pub fn prefetch(mut self, config: PrefetchConfig) -> Self {
        self.prefetch = config;
        self
    }

    /// Configure the session's own analytics recorder.
    ///
    /// Ignored when a shared recorder is passed to
    /// [`analytics`](Self::analytics).
    pub fn analytics_config(mut self, config: AnalyticsConfig) -> Self {
        self.analytics_config = config;
        self
    }

    /// Report into a shared recorder, e.g. one aggregating several sessions.
    pub fn analytics(mut self, recorder: Arc<AnalyticsRecorder>) -> Self {
        self.analytics = Some(recorder);
        self
    }

    /// Replay identical provider requests for a short window.
    pub fn request_dedup(mut self, config: DedupConfig) -> Self {
        self.dedup = Some(config);
        self
    }

    /// Apply every setting from a loaded [`Config`].
    ///
    /// With the `openai-compatible` feature this also configures the HTTP
    /// client from `[provider]`, reading the API key from the environment.
    /// An explicit [`provider`](Self::provider) still wins.
    pub fn from_config(mut self, config: &Config) -> Self {
        self.cache = config.cache_config();
        self.prefetch = config.prefetch_config();
        self.analytics_config = config.analytics_config();
        self.dedup = config.dedup_config();

        #[cfg(feature = "openai-compatible")]
        {
            let provider = &config.provider;
            self.openai = Some(OpenAiSettings {
                base_url: provider.base_url.clone(),
                api_key: provider.api_key(),
                model: provider.model.clone(),
                max_tokens: provider.max_tokens,
                temperature: provider.temperature,
            });
        }

        self
    }

    fn resolve_provider(&mut self) -> Result<Arc<dyn CompletionProvider>> {
        if let Some(provider) = self.provider.take() {
            return Ok(provider);
        }

        #[cfg(feature = "openai-compatible")]
        if let Some(settings) = self.openai.take() {
            let mut client = crate::providers::OpenAiCompatibleClient::new(
                settings.base_url,
                settings.api_key,
                settings.model,
            );
            if let Some(max_tokens) = settings.max_tokens {
                client = client.max_tokens(max_tokens);
            }
            if let Some(temperature) = settings.temperature {
                client = client.temperature(temperature);
            }
            return Ok(Arc::new(client));
        }

        Err(HuginnError::NoProvider)
    }

    /// Build the session.
    pub fn build(mut self) -> Result<StorySession> {
        if self.prefetch.generation_timeout.is_zero() {
            return Err(HuginnError::Configuration(
                "generation timeout must be greater than zero".to_string(),
            ));
        }

        let mut provider = self.resolve_provider()?;

        let analytics = self
            .analytics
            .take()
            .unwrap_or_else(|| Arc::new(AnalyticsRecorder::new(self.analytics_config.clone())));

        if let Some(dedup) = &self.dedup {
            provider = Arc::new(
                DedupingProvider::new(provider, dedup).with_analytics(Arc::clone(&analytics)),
            );
        }

        let store = Arc::new(ContinuationStore::new(self.cache.clone()));
        let prefetcher = Prefetcher::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            self.prefetch.clone(),
        );

        info!(
            provider = provider.name(),
            max_entries = self.cache.max_entries,
            ttl = ?self.cache.ttl,
            request_dedup = self.dedup.is_some(),
            "story session ready"
        );

        Ok(StorySession::new(store, provider, prefetcher, analytics))
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
