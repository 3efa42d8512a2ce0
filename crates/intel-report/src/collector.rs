//! Market research: web search and news for a parsed query

use crate::api::{NewsApiClient, NewsResponse, SearchResults, SerpApiClient, newsapi, serpapi};
use crate::cache::{CacheKey, ResearchCache};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::query::QueryParams;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Web search seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Run a web search
    async fn search(&self, query: &str) -> Result<SearchResults>;
}

/// News search seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch articles matching `query`
    async fn everything(&self, query: &str) -> Result<NewsResponse>;
}

/// Raw research data for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Parameters the data was collected for
    #[serde(default)]
    pub query_params: QueryParams,
    pub market_news: NewsResponse,
    pub search_results: SearchResults,
    /// Sources that returned data
    pub sources: Vec<String>,
}

impl MarketData {
    /// Whether neither source produced any item
    pub fn is_empty(&self) -> bool {
        self.market_news.articles.is_empty() && self.search_results.organic_results.is_empty()
    }
}

/// Fetches search and news data concurrently, memoizing responses
pub struct DataCollector {
    search: Arc<dyn SearchSource>,
    news: Arc<dyn NewsSource>,
    cache: ResearchCache,
}

impl DataCollector {
    /// Create a collector over arbitrary sources
    pub fn new(
        search: Arc<dyn SearchSource>,
        news: Arc<dyn NewsSource>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            search,
            news,
            cache: ResearchCache::new(cache_ttl),
        }
    }

    /// Create a collector backed by SerpApi and NewsAPI
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let search = Arc::new(SerpApiClient::from_config(config)?);
        let news = Arc::new(NewsApiClient::from_config(config)?);
        Ok(Self::new(search, news, config.cache_ttl))
    }

    /// Research cache shared by every call of this collector
    pub fn cache(&self) -> &ResearchCache {
        &self.cache
    }

    /// Collect search results and news for the market
    ///
    /// One failing source is tolerated; both failing is an error.
    #[instrument(skip(self, params), fields(market = %params.market))]
    pub async fn research_market(&self, params: &QueryParams) -> Result<MarketData> {
        let search_query = params.search_query();
        let news_query = params.market.clone();

        let (search, news) = tokio::join!(
            self.fetch_search(&search_query),
            self.fetch_news(&news_query)
        );

        let mut data = MarketData {
            query_params: params.clone(),
            ..MarketData::default()
        };
        let mut failures = Vec::new();

        match news {
            Ok(news) => {
                data.market_news = news;
                data.sources.push(newsapi::PROVIDER.to_string());
            }
            Err(e) => {
                warn!(error = %e, "News collection failed, continuing with web search only");
                failures.push(format!("{}: {e}", newsapi::PROVIDER));
            }
        }

        match search {
            Ok(search) => {
                data.search_results = search;
                data.sources.push(serpapi::PROVIDER.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Web search failed, continuing with news only");
                failures.push(format!("{}: {e}", serpapi::PROVIDER));
            }
        }

        if data.sources.is_empty() {
            return Err(ReportError::NoMarketData(failures.join("; ")));
        }

        info!(
            articles = data.market_news.articles.len(),
            search_results = data.search_results.organic_results.len(),
            sources = ?data.sources,
            "Market data collected"
        );
        Ok(data)
    }

    async fn fetch_search(&self, query: &str) -> Result<SearchResults> {
        let key = CacheKey::new(serpapi::PROVIDER, query);
        let value = self
            .cache
            .get_or_fetch(key, || async {
                let results = self.search.search(query).await?;
                Ok::<_, ReportError>(serde_json::to_value(results)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_news(&self, query: &str) -> Result<NewsResponse> {
        let key = CacheKey::new(newsapi::PROVIDER, query);
        let value = self
            .cache
            .get_or_fetch(key, || async {
                let news = self.news.everything(query).await?;
                Ok::<_, ReportError>(serde_json::to_value(news)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Article, OrganicResult};
    use mockall::predicate::eq;

    fn search_results() -> SearchResults {
        SearchResults {
            organic_results: vec![OrganicResult {
                position: 1,
                title: "EV outlook".to_string(),
                link: "https://example.com".to_string(),
                snippet: "Sales up".to_string(),
            }],
        }
    }

    fn news() -> NewsResponse {
        NewsResponse {
            status: "ok".to_string(),
            total_results: 1,
            articles: vec![Article {
                title: "EV demand climbs".to_string(),
                description: "Sales rose".to_string(),
                ..Article::default()
            }],
        }
    }

    fn collector(search: MockSearchSource, news: MockNewsSource) -> DataCollector {
        DataCollector::new(Arc::new(search), Arc::new(news), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_research_market_uses_both_sources() {
        let mut search = MockSearchSource::new();
        search
            .expect_search()
            .with(eq("electric vehicle market trends 5 years"))
            .times(1)
            .returning(|_| Ok(search_results()));

        let mut news_source = MockNewsSource::new();
        news_source
            .expect_everything()
            .with(eq("electric vehicle"))
            .times(1)
            .returning(|_| Ok(news()));

        let collector = collector(search, news_source);
        let data = collector
            .research_market(&QueryParams::new("electric vehicle"))
            .await
            .unwrap();

        assert_eq!(data.market_news.articles.len(), 1);
        assert_eq!(data.search_results.organic_results.len(), 1);
        assert_eq!(data.sources, vec!["newsapi", "serpapi"]);
    }

    #[tokio::test]
    async fn test_research_market_is_cached() {
        let mut search = MockSearchSource::new();
        search.expect_search().times(1).returning(|_| Ok(search_results()));
        let mut news_source = MockNewsSource::new();
        news_source.expect_everything().times(1).returning(|_| Ok(news()));

        let collector = collector(search, news_source);
        let params = QueryParams::new("electric vehicle");

        let first = collector.research_market(&params).await.unwrap();
        let second = collector.research_market(&params).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(collector.cache().len().await, 2);
    }

    #[tokio::test]
    async fn test_one_failing_source_is_tolerated() {
        let mut search = MockSearchSource::new();
        search
            .expect_search()
            .returning(|_| Err(ReportError::api("serpapi", "Invalid API key.")));
        let mut news_source = MockNewsSource::new();
        news_source.expect_everything().returning(|_| Ok(news()));

        let data = collector(search, news_source)
            .research_market(&QueryParams::new("avocado"))
            .await
            .unwrap();

        assert_eq!(data.sources, vec!["newsapi"]);
        assert!(data.search_results.organic_results.is_empty());
        assert!(!data.is_empty());
    }

    #[tokio::test]
    async fn test_both_sources_failing() {
        let mut search = MockSearchSource::new();
        search
            .expect_search()
            .returning(|_| Err(ReportError::api("serpapi", "quota exceeded")));
        let mut news_source = MockNewsSource::new();
        news_source
            .expect_everything()
            .returning(|_| Err(ReportError::api("newsapi", "rateLimited")));

        let err = collector(search, news_source)
            .research_market(&QueryParams::new("avocado"))
            .await
            .unwrap_err();

        match err {
            ReportError::NoMarketData(message) => {
                assert!(message.contains("quota exceeded"));
                assert!(message.contains("rateLimited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut search = MockSearchSource::new();
        let mut calls = 0;
        search.expect_search().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(ReportError::api("serpapi", "timeout"))
            } else {
                Ok(search_results())
            }
        });
        let mut news_source = MockNewsSource::new();
        news_source.expect_everything().times(1).returning(|_| Ok(news()));

        let collector = collector(search, news_source);
        let params = QueryParams::new("electric vehicle");

        let first = collector.research_market(&params).await.unwrap();
        assert_eq!(first.sources, vec!["newsapi"]);

        let second = collector.research_market(&params).await.unwrap();
        assert_eq!(second.sources, vec!["newsapi", "serpapi"]);
    }
}
