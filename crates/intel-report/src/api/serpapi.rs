//! SerpApi client for Google web search results

use super::{SharedRateLimiter, http_client, null_as_default, rate_limiter};
use crate::collector::SearchSource;
use crate::config::{DEFAULT_SERPAPI_BASE_URL, ReportConfig};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const PROVIDER: &str = "serpapi";

/// One organic Google result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganicResult {
    /// Rank on the result page
    #[serde(deserialize_with = "null_as_default")]
    pub position: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snippet: String,
}

/// Search response; only organic results are kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResults {
    #[serde(deserialize_with = "null_as_default")]
    pub organic_results: Vec<OrganicResult>,
}

/// SerpApi client with rate limiting
pub struct SerpApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

impl SerpApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - SerpApi key
    /// * `rate_limit` - Requests per minute
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_SERPAPI_BASE_URL.to_string(),
            rate_limiter: rate_limiter(rate_limit),
        }
    }

    /// Create a client from configuration; fails without `SERPAPI_API_KEY`
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let api_key = config.require_serpapi_key()?;
        Ok(Self {
            client: http_client(config.request_timeout)?,
            api_key: api_key.to_string(),
            base_url: config.serpapi_base_url.trim_end_matches('/').to_string(),
            rate_limiter: rate_limiter(config.search_rate_limit),
        })
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Run a Google search
    #[instrument(skip(self))]
    pub async fn google_search(&self, query: &str) -> Result<SearchResults> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("engine", "google"), ("q", query), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Errors come back as {"error": "..."}, sometimes with a 200 status
        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(ReportError::api(PROVIDER, format!("HTTP {status}: {body}")));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(message) = value.get("error").and_then(serde_json::Value::as_str) {
            return Err(ReportError::api(PROVIDER, message));
        }
        if !status.is_success() {
            return Err(ReportError::api(PROVIDER, format!("HTTP {status}")));
        }

        let results: SearchResults = serde_json::from_value(value)?;
        debug!(results = results.organic_results.len(), "SerpApi search complete");
        Ok(results)
    }
}

#[async_trait]
impl SearchSource for SerpApiClient {
    async fn search(&self, query: &str) -> Result<SearchResults> {
        self.google_search(query).await
    }
}
