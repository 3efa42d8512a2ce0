//! Reporting: Markdown report generation from a finished analysis

pub mod format;
pub mod generator;

pub use format::{
    format_competitors_table, format_financials, format_market_share, format_swot, format_trends,
};
pub use generator::ReportGenerator;

use crate::analysis::MarketAnalysis;
use crate::pipeline::StageTimings;
use crate::query::QueryParams;
use chrono::{DateTime, Utc};
use intel_llm::TokenUsage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated intelligence report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    /// Markdown document returned by the model
    pub markdown: String,
    pub query_params: QueryParams,
    pub analysis: MarketAnalysis,
    pub generated_at: DateTime<Utc>,
    /// Tokens used by every LLM call that contributed to the report
    pub usage: TokenUsage,
    #[serde(default)]
    pub timings: StageTimings,
}

impl Report {
    /// Data-quality warnings raised during analysis
    pub fn warnings(&self) -> &[String] {
        &self.analysis.metadata.warnings
    }
}
