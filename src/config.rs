//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. a `--config` flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//!
//! Every section and key is optional; missing values take the same
//! defaults as the programmatic config structs. API keys never live in the
//! file: `[provider] api_key_env` names the environment variable to read.
//!
//! ```toml
//! [cache]
//! max_entries = 50
//! ttl_secs = 600
//!
//! [prefetch]
//! generation_timeout_secs = 60
//!
//! [analytics]
//! usd_per_million_tokens = 0.375
//! default_tokens_saved = 600
//!
//! [dedup]
//! enabled = true
//! max_entries = 100
//! ttl_secs = 300
//!
//! [provider]
//! base_url = "https://openrouter.ai/api/v1"
//! model = "openai/gpt-4o-mini"
//! api_key_env = "OPENROUTER_API_KEY"
//! max_tokens = 800
//! temperature = 0.8
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::analytics::AnalyticsConfig;
use crate::cache::CacheConfig;
use crate::prefetch::PrefetchConfig;
use crate::providers::DedupConfig;
use crate::{HuginnError, Result};

/// Default provider base URL (OpenAI).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default environment variable holding the provider API key.
pub const DEFAULT_API_KEY_ENV: &str = "HUGINN_API_KEY";

/// File configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub prefetch: PrefetchSection,
    #[serde(default)]
    pub analytics: AnalyticsSection,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub provider: ProviderSection,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum pending + ready entries (default: 50).
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Ready entry lifetime in seconds (default: 600).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_entries() -> usize {
    50
}

fn default_cache_ttl() -> u64 {
    600
}

/// `[prefetch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchSection {
    /// Per-generation timeout in seconds (default: 60).
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
}

impl Default for PrefetchSection {
    fn default() -> Self {
        Self {
            generation_timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_timeout() -> u64 {
    60
}

/// `[analytics]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsSection {
    /// Price used for savings estimates (default: 0.375).
    #[serde(default = "default_usd_per_million")]
    pub usd_per_million_tokens: f64,
    /// Tokens credited for a hit without usage data (default: 600).
    #[serde(default = "default_tokens_saved")]
    pub default_tokens_saved: u64,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        Self {
            usd_per_million_tokens: default_usd_per_million(),
            default_tokens_saved: default_tokens_saved(),
        }
    }
}

fn default_usd_per_million() -> f64 {
    0.375
}

fn default_tokens_saved() -> u64 {
    600
}

/// `[dedup]` section. Request deduplication is off unless enabled here.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupSection {
    #[serde(default)]
    pub enabled: bool,
    /// Remembered responses (default: 100).
    #[serde(default = "default_dedup_entries")]
    pub max_entries: u64,
    /// Replay window in seconds (default: 300).
    #[serde(default = "default_dedup_ttl")]
    pub ttl_secs: u64,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: default_dedup_entries(),
            ttl_secs: default_dedup_ttl(),
        }
    }
}

fn default_dedup_entries() -> u64 {
    100
}

fn default_dedup_ttl() -> u64 {
    300
}

/// `[provider]` section for the OpenAI-compatible client.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (default: `HUGINN_API_KEY`).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: None,
            temperature: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl ProviderSection {
    /// Read the API key from the configured environment variable.
    ///
    /// Unset or empty means no key; local servers usually need none.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| HuginnError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HuginnError::Configuration(
            "No config file found. Create ~/.huginn/config.toml or /etc/huginn/config.toml"
                .to_string(),
        ))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn prefetch_config(&self) -> PrefetchConfig {
        PrefetchConfig::new()
            .generation_timeout(Duration::from_secs(self.prefetch.generation_timeout_secs))
    }

    pub fn analytics_config(&self) -> AnalyticsConfig {
        AnalyticsConfig::new()
            .usd_per_million_tokens(self.analytics.usd_per_million_tokens)
            .default_tokens_saved(self.analytics.default_tokens_saved)
    }

    /// Dedup settings, or `None` when deduplication is disabled.
    pub fn dedup_config(&self) -> Option<DedupConfig> {
        self.dedup.enabled.then(|| {
            DedupConfig::new()
                .max_entries(self.dedup.max_entries)
                .ttl(Duration::from_secs(self.dedup.ttl_secs))
        })
    }
}
