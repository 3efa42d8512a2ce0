//! Configuration for report generation
//!
//! Values come from defaults, then an optional TOML file, then the environment
//! (after `.env` has been loaded).

use crate::error::{ReportError, Result};
use intel_llm::RetryPolicy;
use intel_llm::providers::OpenAIConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Model used by the original deployment
pub const DEFAULT_MODEL: &str = "gpt-4-1106-preview";
/// Default OpenAI endpoint
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default SerpApi endpoint
pub const DEFAULT_SERPAPI_BASE_URL: &str = "https://serpapi.com";
/// Default NewsAPI endpoint
pub const DEFAULT_NEWSAPI_BASE_URL: &str = "https://newsapi.org";

/// Environment variable names
pub mod env_keys {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
    pub const SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";
    pub const NEWSAPI_API_KEY: &str = "NEWSAPI_API_KEY";
}

/// Configuration for the report pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Chat model for every LLM call
    pub model: String,

    /// OpenAI-compatible API base URL
    pub openai_api_base: String,

    /// OpenAI API key
    #[serde(skip_serializing, default)]
    pub openai_api_key: Option<String>,

    /// SerpApi key
    #[serde(skip_serializing, default)]
    pub serpapi_api_key: Option<String>,

    /// NewsAPI key
    #[serde(skip_serializing, default)]
    pub newsapi_api_key: Option<String>,

    /// SerpApi base URL
    pub serpapi_base_url: String,

    /// NewsAPI base URL
    pub newsapi_base_url: String,

    /// Temperature of the structured analysis calls
    pub analysis_temperature: f32,

    /// Temperature of the report call
    pub report_temperature: f32,

    /// top_p of the report call
    pub report_top_p: f32,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Lines per analysis chunk
    pub chunk_size: usize,

    /// News lines considered for chunking
    pub max_news_articles: usize,

    /// Organic results kept when preprocessing search data
    pub max_search_results: usize,

    /// Search lines considered for chunking
    pub max_search_lines_for_chunking: usize,

    /// NewsAPI `sortBy` parameter
    pub news_sort_by: String,

    /// Attempts per LLM call
    pub max_retries: u32,

    /// Lower bound of the retry backoff
    pub retry_min_backoff: Duration,

    /// Upper bound of the retry backoff
    pub retry_max_backoff: Duration,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Lifetime of memoized research results
    pub cache_ttl: Duration,

    /// SerpApi requests per minute
    pub search_rate_limit: u32,

    /// NewsAPI requests per minute
    pub news_rate_limit: u32,

    /// Fewer competitors than this is flagged
    pub min_competitors: usize,

    /// Fewer trends than this is flagged
    pub min_trends: usize,

    /// More SWOT weakness evidence than this is flagged
    pub max_weaknesses: usize,

    /// Rows in the report's competitor table
    pub top_competitors_in_table: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            openai_api_key: None,
            serpapi_api_key: None,
            newsapi_api_key: None,
            serpapi_base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            newsapi_base_url: DEFAULT_NEWSAPI_BASE_URL.to_string(),
            analysis_temperature: 0.3,
            report_temperature: 0.3,
            report_top_p: 0.95,
            max_tokens: 4096,
            chunk_size: 5,
            max_news_articles: 20,
            max_search_results: 20,
            max_search_lines_for_chunking: 10,
            news_sort_by: "relevancy".to_string(),
            max_retries: 3,
            retry_min_backoff: Duration::from_secs(4),
            retry_max_backoff: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(900), // 15 minutes
            search_rate_limit: 30,
            news_rate_limit: 60,
            min_competitors: 2,
            min_trends: 2,
            max_weaknesses: 5,
            top_competitors_in_table: 5,
        }
    }
}

impl ReportConfig {
    /// Create a new configuration builder
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_vars(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;
        Ok(file.apply(Self::default()))
    }

    /// Overlay environment variables; blank values are ignored
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var(env_keys::OPENAI_API_KEY) {
            self.openai_api_key = Some(key);
        }
        if let Some(base) = var(env_keys::OPENAI_API_BASE) {
            self.openai_api_base = base;
        }
        if let Some(model) = var(env_keys::OPENAI_MODEL) {
            self.model = model;
        }
        if let Some(key) = var(env_keys::SERPAPI_API_KEY) {
            self.serpapi_api_key = Some(key);
        }
        if let Some(key) = var(env_keys::NEWSAPI_API_KEY) {
            self.newsapi_api_key = Some(key);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ReportError::Config("model must not be empty".to_string()));
        }

        if self.max_retries == 0 {
            return Err(ReportError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(ReportError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("analysis_temperature", self.analysis_temperature),
            ("report_temperature", self.report_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ReportError::Config(format!(
                    "{name} must be within [0, 2], got {value}"
                )));
            }
        }

        if !(self.report_top_p > 0.0 && self.report_top_p <= 1.0) {
            return Err(ReportError::Config(format!(
                "report_top_p must be within (0, 1], got {}",
                self.report_top_p
            )));
        }

        Ok(())
    }

    /// Retry policy for LLM calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_min_backoff, self.retry_max_backoff)
    }

    /// Provider configuration
    ///
    /// A custom API base (local OpenAI-compatible server) does not need a key.
    pub fn openai_config(&self) -> Result<OpenAIConfig> {
        let api_key = match &self.openai_api_key {
            Some(key) => key.clone(),
            None if self.openai_api_base != DEFAULT_OPENAI_API_BASE => "not-needed".to_string(),
            None => {
                return Err(ReportError::MissingCredential {
                    name: env_keys::OPENAI_API_KEY.to_string(),
                });
            }
        };

        Ok(OpenAIConfig::new(api_key)
            .with_api_base(&self.openai_api_base)
            .with_timeout(self.request_timeout.as_secs()))
    }

    /// SerpApi key or a `MissingCredential` error
    pub fn require_serpapi_key(&self) -> Result<&str> {
        self.serpapi_api_key
            .as_deref()
            .ok_or_else(|| ReportError::MissingCredential {
                name: env_keys::SERPAPI_API_KEY.to_string(),
            })
    }

    /// NewsAPI key or a `MissingCredential` error
    pub fn require_newsapi_key(&self) -> Result<&str> {
        self.newsapi_api_key
            .as_deref()
            .ok_or_else(|| ReportError::MissingCredential {
                name: env_keys::NEWSAPI_API_KEY.to_string(),
            })
    }
}

/// On-disk configuration; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    model: Option<String>,
    openai_api_base: Option<String>,
    openai_api_key: Option<String>,
    serpapi_api_key: Option<String>,
    newsapi_api_key: Option<String>,
    serpapi_base_url: Option<String>,
    newsapi_base_url: Option<String>,
    analysis_temperature: Option<f32>,
    report_temperature: Option<f32>,
    report_top_p: Option<f32>,
    max_tokens: Option<usize>,
    chunk_size: Option<usize>,
    max_news_articles: Option<usize>,
    max_search_results: Option<usize>,
    max_search_lines_for_chunking: Option<usize>,
    news_sort_by: Option<String>,
    max_retries: Option<u32>,
    retry_min_backoff_secs: Option<u64>,
    retry_max_backoff_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    cache_ttl_secs: Option<u64>,
    search_rate_limit: Option<u32>,
    news_rate_limit: Option<u32>,
    min_competitors: Option<usize>,
    min_trends: Option<usize>,
    max_weaknesses: Option<usize>,
    top_competitors_in_table: Option<usize>,
}

impl ConfigFile {
    fn apply(self, mut config: ReportConfig) -> ReportConfig {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field { config.$field = value; })*
            };
        }

        set!(
            model,
            openai_api_base,
            serpapi_base_url,
            newsapi_base_url,
            analysis_temperature,
            report_temperature,
            report_top_p,
            max_tokens,
            chunk_size,
            max_news_articles,
            max_search_results,
            max_search_lines_for_chunking,
            news_sort_by,
            max_retries,
            search_rate_limit,
            news_rate_limit,
            min_competitors,
            min_trends,
            max_weaknesses,
            top_competitors_in_table,
        );

        if self.openai_api_key.is_some() {
            config.openai_api_key = self.openai_api_key;
        }
        if self.serpapi_api_key.is_some() {
            config.serpapi_api_key = self.serpapi_api_key;
        }
        if self.newsapi_api_key.is_some() {
            config.newsapi_api_key = self.newsapi_api_key;
        }
        if let Some(secs) = self.retry_min_backoff_secs {
            config.retry_min_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = self.retry_max_backoff_secs {
            config.retry_max_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.cache_ttl_secs {
            config.cache_ttl = Duration::from_secs(secs);
        }

        config
    }
}

/// Builder for ReportConfig
#[derive(Debug, Default)]
pub struct ReportConfigBuilder {
    config: ReportConfig,
}

impl ReportConfigBuilder {
    /// Set the chat model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the OpenAI-compatible API base
    pub fn openai_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.openai_api_base = base.into();
        self
    }

    /// Set the OpenAI API key
    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.openai_api_key = Some(key.into());
        self
    }

    /// Set the SerpApi key
    pub fn serpapi_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.serpapi_api_key = Some(key.into());
        self
    }

    /// Set the NewsAPI key
    pub fn newsapi_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.newsapi_api_key = Some(key.into());
        self
    }

    /// Set the SerpApi base URL
    pub fn serpapi_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.serpapi_base_url = url.into();
        self
    }

    /// Set the NewsAPI base URL
    pub fn newsapi_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.newsapi_base_url = url.into();
        self
    }

    /// Set the analysis temperature
    pub fn analysis_temperature(mut self, temperature: f32) -> Self {
        self.config.analysis_temperature = temperature;
        self
    }

    /// Set the report temperature
    pub fn report_temperature(mut self, temperature: f32) -> Self {
        self.config.report_temperature = temperature;
        self
    }

    /// Set the report top_p
    pub fn report_top_p(mut self, top_p: f32) -> Self {
        self.config.report_top_p = top_p;
        self
    }

    /// Set the chunk size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set retry backoff bounds
    pub fn retry_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.config.retry_min_backoff = min;
        self.config.retry_max_backoff = max;
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the research cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set quality thresholds
    pub fn quality_thresholds(
        mut self,
        min_competitors: usize,
        min_trends: usize,
        max_weaknesses: usize,
    ) -> Self {
        self.config.min_competitors = min_competitors;
        self.config.min_trends = min_trends;
        self.config.max_weaknesses = max_weaknesses;
        self
    }

    /// Load keys, base URL and model from the environment
    pub fn with_env(mut self) -> Self {
        self.config = self.config.with_env();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ReportConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
