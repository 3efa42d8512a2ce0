//! NewsAPI client for news articles

use super::{SharedRateLimiter, http_client, null_as_default, rate_limiter};
use crate::collector::NewsSource;
use crate::config::{DEFAULT_NEWSAPI_BASE_URL, ReportConfig};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const PROVIDER: &str = "newsapi";

/// Publisher of an article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleSource {
    #[serde(deserialize_with = "null_as_default")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

/// A news article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Article {
    #[serde(deserialize_with = "null_as_default")]
    pub source: ArticleSource,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    /// ISO-8601 publication time as sent by the API
    #[serde(deserialize_with = "null_as_default")]
    pub published_at: String,
}

/// `/v2/everything` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewsResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total_results: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub articles: Vec<Article>,
}

/// NewsAPI client with rate limiting
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    sort_by: String,
    rate_limiter: SharedRateLimiter,
}

impl NewsApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - NewsAPI key
    /// * `rate_limit` - Requests per minute
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_NEWSAPI_BASE_URL.to_string(),
            sort_by: "relevancy".to_string(),
            rate_limiter: rate_limiter(rate_limit),
        }
    }

    /// Create a client from configuration; fails without `NEWSAPI_API_KEY`
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let api_key = config.require_newsapi_key()?;
        Ok(Self {
            client: http_client(config.request_timeout)?,
            api_key: api_key.to_string(),
            base_url: config.newsapi_base_url.trim_end_matches('/').to_string(),
            sort_by: config.news_sort_by.clone(),
            rate_limiter: rate_limiter(config.news_rate_limit),
        })
    }

    /// Point the client at another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the `sortBy` parameter (relevancy, popularity, publishedAt)
    pub fn with_sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = sort_by.into();
        self
    }

    /// Search every article matching `query`
    #[instrument(skip(self))]
    pub async fn get_everything(&self, query: &str) -> Result<NewsResponse> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v2/everything", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("sortBy", self.sort_by.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(ReportError::api(PROVIDER, format!("HTTP {status}: {body}")));
            }
            Err(e) => return Err(e.into()),
        };

        if value.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let code = value
                .get("code")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            let message = value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no message");
            return Err(ReportError::api(PROVIDER, format!("{code}: {message}")));
        }
        if !status.is_success() {
            return Err(ReportError::api(PROVIDER, format!("HTTP {status}")));
        }

        let news: NewsResponse = serde_json::from_value(value)?;
        debug!(
            articles = news.articles.len(),
            total = news.total_results,
            "NewsAPI search complete"
        );
        Ok(news)
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn everything(&self, query: &str) -> Result<NewsResponse> {
        self.get_everything(query).await
    }
}
