//! Turning raw market data into text lines and analysis chunks

use crate::collector::MarketData;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use serde_json::json;

/// Text extracted from market data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedData {
    /// `"{title}: {description}"` per article with a description
    pub news: Vec<String>,
    /// `"{title}: {snippet}"` per organic result, newline separated
    pub search_results: String,
}

/// Extract news lines and search text
pub fn preprocess(data: &MarketData, max_search_results: usize) -> ProcessedData {
    let news = data
        .market_news
        .articles
        .iter()
        .filter(|a| !a.description.trim().is_empty())
        .map(|a| format!("{}: {}", a.title, a.description))
        .collect();

    let search_results = data
        .search_results
        .organic_results
        .iter()
        .take(max_search_results)
        .map(|r| format!("{}: {}", r.title, r.snippet))
        .collect::<Vec<_>>()
        .join("\n");

    ProcessedData {
        news,
        search_results,
    }
}

/// Limits applied when chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub chunk_size: usize,
    pub max_news: usize,
    pub max_search_lines: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            max_news: 20,
            max_search_lines: 10,
        }
    }
}

impl From<&ReportConfig> for ChunkLimits {
    fn from(config: &ReportConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_news: config.max_news_articles,
            max_search_lines: config.max_search_lines_for_chunking,
        }
    }
}

/// Lines from one source sent in one LLM call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataChunk {
    News(Vec<String>),
    Search(Vec<String>),
}

impl DataChunk {
    /// Lines in this chunk
    pub fn lines(&self) -> &[String] {
        match self {
            DataChunk::News(lines) | DataChunk::Search(lines) => lines,
        }
    }

    /// JSON rendering used in the prompt
    pub fn to_prompt_json(&self) -> String {
        let value = match self {
            DataChunk::News(lines) => json!({ "news": lines }),
            DataChunk::Search(lines) => json!({ "search_results": lines }),
        };
        value.to_string()
    }
}

/// Split processed data into chunks: news first, then search lines
pub fn chunk(data: &ProcessedData, limits: ChunkLimits) -> Result<Vec<DataChunk>> {
    let size = limits.chunk_size.max(1);

    let news: Vec<String> = data.news.iter().take(limits.max_news).cloned().collect();
    let search: Vec<String> = data
        .search_results
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(limits.max_search_lines)
        .map(str::to_string)
        .collect();

    let chunks: Vec<DataChunk> = news
        .chunks(size)
        .map(|c| DataChunk::News(c.to_vec()))
        .chain(search.chunks(size).map(|c| DataChunk::Search(c.to_vec())))
        .collect();

    if chunks.is_empty() {
        return Err(ReportError::NoMarketData(
            "no news descriptions or search snippets to analyze".to_string(),
        ));
    }

    Ok(chunks)
}
