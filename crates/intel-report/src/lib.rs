//! Industry intelligence reports
//!
//! This crate turns a free-form market question into a Markdown strategy report:
//! - Query processing: an LLM extracts market, companies, timeframe and geography
//! - Market research: SerpApi web search and NewsAPI articles, fetched concurrently
//! - Analysis: chunked structured LLM analyses of trends, competitors and SWOT
//! - Reporting: an executive report prompt with comparison table and SWOT block
//!
//! [`ReportPipeline`] wires the stages together.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod query;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{AnalysisEngine, MarketAnalysis};
pub use collector::{DataCollector, MarketData, NewsSource, SearchSource};
pub use config::ReportConfig;
pub use error::{ReportError, Result};
pub use pipeline::{PipelineStage, ReportPipeline, StageTimings};
pub use query::{QueryParams, QueryParser};
pub use report::{Report, ReportGenerator};
