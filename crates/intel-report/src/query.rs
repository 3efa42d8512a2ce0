//! Query processing: turn a free-form question into structured parameters

use crate::error::{ReportError, Result};
use crate::prompts::QUERY_SYSTEM_PROMPT;
use intel_llm::{
    CompletionRequest, LLMProvider, Message, RetryPolicy, TokenUsage, extract_json_object,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_TIMEFRAME: &str = "5 years";
pub const DEFAULT_GEOGRAPHY: &str = "global";

/// Entities extracted from the user's question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    /// Principal market
    pub market: String,
    /// Companies named in the question
    pub companies: Vec<String>,
    /// Time horizon
    pub timeframe: String,
    /// Location
    pub geography: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl QueryParams {
    /// Parameters for a market with default timeframe and geography
    pub fn new(market: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            companies: Vec::new(),
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            geography: DEFAULT_GEOGRAPHY.to_string(),
        }
    }

    /// Query string sent to the web search source
    pub fn search_query(&self) -> String {
        format!("{} market trends {}", self.market, self.timeframe)
    }

    /// Build parameters from the model's JSON object
    ///
    /// Missing or blank optional fields fall back to their defaults. `companies`
    /// may be a list or a comma-separated string.
    pub fn from_value(value: &Value) -> Result<Self> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let market = text("market").ok_or_else(|| {
            ReportError::InvalidQuery("no market could be identified in the query".to_string())
        })?;

        let raw_companies: Vec<String> = match value.get("companies") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };

        let mut companies: Vec<String> = Vec::with_capacity(raw_companies.len());
        for company in raw_companies {
            let company = company.trim();
            if !company.is_empty() && !companies.iter().any(|c| c == company) {
                companies.push(company.to_string());
            }
        }

        Ok(Self {
            market,
            companies,
            timeframe: text("timeframe").unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string()),
            geography: text("geography").unwrap_or_else(|| DEFAULT_GEOGRAPHY.to_string()),
        })
    }
}

/// Extracts [`QueryParams`] with one JSON-mode completion
pub struct QueryParser {
    provider: Arc<dyn LLMProvider>,
    model: String,
    retry: RetryPolicy,
}

impl QueryParser {
    /// Create a new parser
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a custom retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Parse a user query
    pub async fn parse(&self, query: &str) -> Result<QueryParams> {
        self.parse_with_usage(query).await.map(|(params, _)| params)
    }

    /// Parse a user query, also returning the token usage of the call
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn parse_with_usage(&self, query: &str) -> Result<(QueryParams, TokenUsage)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ReportError::EmptyQuery);
        }

        let (value, usage) = self
            .retry
            .execute("parse_query", || {
                let provider = Arc::clone(&self.provider);
                let request = CompletionRequest::builder(&self.model)
                    .system(QUERY_SYSTEM_PROMPT)
                    .add_message(Message::user(query))
                    .json_mode()
                    .build();

                async move {
                    let response = provider.complete(request).await?;
                    let value = extract_json_object(response.text())?;
                    Ok((value, response.usage))
                }
            })
            .await?;

        debug!(response = %value, "Query entities extracted");

        let params = QueryParams::from_value(&value)?;
        Ok((params, usage))
    }
}
