//! Final report generation

use super::Report;
use super::format::{
    format_competitors_table, format_date, format_financials, format_swot, format_trends,
};
use crate::analysis::MarketAnalysis;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::pipeline::StageTimings;
use crate::prompts::{INPUT_DATA_TEMPLATE, REPORT_TEMPLATE, render};
use chrono::Utc;
use intel_llm::{CompletionRequest, LLMProvider, Message, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Writes the Markdown report from a finished analysis
pub struct ReportGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: usize,
    top_competitors: usize,
    retry: RetryPolicy,
}

impl ReportGenerator {
    /// Create a generator with settings from `config`
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ReportConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.report_temperature,
            top_p: config.report_top_p,
            max_tokens: config.max_tokens,
            top_competitors: config.top_competitors_in_table,
            retry: config.retry_policy(),
        }
    }

    /// Use a custom retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the report prompt
    pub fn build_prompt(&self, analysis: &MarketAnalysis) -> Result<String> {
        let table = format_competitors_table(
            &analysis.competitors.top_competitors,
            self.top_competitors,
        );

        render(
            REPORT_TEMPLATE,
            json!({
                "top_n": self.top_competitors,
                "competitors_table": table.trim_end(),
                "input_data": self.format_input_data(analysis)?,
            }),
        )
    }

    fn format_input_data(&self, analysis: &MarketAnalysis) -> Result<String> {
        let params = &analysis.query_params;
        let metadata = &analysis.metadata;

        let financials: Vec<_> = analysis
            .competitors
            .top_competitors
            .iter()
            .take(self.top_competitors)
            .filter(|c| !c.key_financials.is_empty())
            .map(|c| json!({ "name": c.name, "block": format_financials(&c.key_financials) }))
            .collect();

        render(
            INPUT_DATA_TEMPLATE,
            json!({
                "market": params.market,
                "companies": params.companies,
                "timeframe": params.timeframe,
                "geography": params.geography,
                "analysis_date": format_date(&metadata.processing_date),
                "data_sources": metadata.data_sources,
                "quality_score": metadata.quality_score,
                "trends": format_trends(&analysis.trends.trends),
                "swot": format_swot(&analysis.swot),
                "financials": financials,
            }),
        )
    }

    /// Generate the Markdown report
    #[instrument(skip(self, analysis), fields(model = %self.model, market = %analysis.query_params.market))]
    pub async fn generate(&self, analysis: &MarketAnalysis) -> Result<Report> {
        let prompt = self.build_prompt(analysis)?;

        let response = self
            .retry
            .execute("generate_report", || {
                let provider = Arc::clone(&self.provider);
                let request = CompletionRequest::builder(&self.model)
                    .add_message(Message::user(prompt.clone()))
                    .max_tokens(self.max_tokens)
                    .temperature(self.temperature)
                    .top_p(self.top_p)
                    .build();

                async move { provider.complete(request).await }
            })
            .await?;

        let markdown = response.text().trim().to_string();
        if markdown.is_empty() {
            return Err(ReportError::EmptyReport);
        }

        info!(
            chars = markdown.len(),
            tokens = response.usage.total(),
            "Report generated"
        );

        Ok(Report {
            id: Uuid::new_v4(),
            markdown,
            query_params: analysis.query_params.clone(),
            analysis: analysis.clone(),
            generated_at: Utc::now(),
            usage: response.usage,
            timings: StageTimings::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        AnalysisMetadata, Competitor, CompetitorAnalysis, SwotAnalysis, SwotEntry, Trend,
        TrendAnalysis,
    };
    use crate::query::QueryParams;
    use crate::test_support::ScriptedProvider;
    use chrono::TimeZone;
    use intel_llm::ResponseFormat;
    use std::collections::BTreeMap;

    fn analysis() -> MarketAnalysis {
        let mut financials = BTreeMap::new();
        financials.insert("Revenue".to_string(), 96.77);

        MarketAnalysis {
            query_params: QueryParams {
                companies: vec!["Tesla".to_string(), "BYD".to_string()],
                ..QueryParams::new("electric vehicle")
            },
            trends: TrendAnalysis {
                trends: vec![Trend {
                    name: "Battery costs".to_string(),
                    description: "Falling".to_string(),
                    evidence: vec![],
                    impact_score: Some(0.9),
                }],
                summary: "Growing".to_string(),
            },
            competitors: CompetitorAnalysis {
                top_competitors: vec![Competitor {
                    name: "Tesla".to_string(),
                    market_share: Some(18.0),
                    strengths: vec!["Brand".to_string()],
                    weaknesses: vec!["Price".to_string()],
                    key_financials: financials,
                    ..Competitor::default()
                }],
                competitive_landscape: "Concentrated".to_string(),
            },
            swot: SwotAnalysis {
                opportunities: SwotEntry {
                    description: "Fleet sales".to_string(),
                    evidence: vec!["Logistics pilots".to_string()],
                },
                ..SwotAnalysis::default()
            },
            metadata: AnalysisMetadata {
                processing_date: Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap(),
                data_sources: vec!["newsapi".to_string(), "serpapi".to_string()],
                model_version: "gpt-4-1106-preview".to_string(),
                quality_score: 0.4,
                warnings: vec![],
            },
        }
    }

    fn generator(provider: Arc<ScriptedProvider>) -> ReportGenerator {
        ReportGenerator::new(provider, &ReportConfig::default())
            .with_retry_policy(RetryPolicy::fast())
    }

    #[test]
    fn test_build_prompt() {
        let provider = Arc::new(ScriptedProvider::queued(Vec::<String>::new()));
        let prompt = generator(provider).build_prompt(&analysis()).unwrap();

        assert!(prompt.contains("As a senior strategic director"));
        assert!(prompt.contains("## 🎯 Executive Summary (1 paragraph)"));
        assert!(prompt.contains("### Comparison Table (Top 5)"));
        assert!(prompt.contains("| Tesla | 18% | Brand | Price |"));
        assert!(prompt.contains("- Market: electric vehicle"));
        assert!(prompt.contains("- Companies of Interest: Tesla, BYD"));
        assert!(prompt.contains("- Analysis Date: 15/01/2024"));
        assert!(prompt.contains("- Data Sources: newsapi, serpapi"));
        assert!(prompt.contains("- Analysis Quality: 0.4/1.0"));
        assert!(prompt.contains("- Battery costs: Falling"));
        assert!(prompt.contains("**Opportunities:** Fleet sales\nEvidence: Logistics pilots"));
        assert!(prompt.contains("#### Key Financials: Tesla\n- Revenue: $96.77B"));
        assert!(prompt.contains("4. Prioritize actionable insights"));
    }

    #[tokio::test]
    async fn test_generate() {
        let provider = Arc::new(ScriptedProvider::queued(["# EV Market Report\n\nContent\n"]));
        let report = generator(provider.clone()).generate(&analysis()).await.unwrap();

        assert_eq!(report.markdown, "# EV Market Report\n\nContent");
        assert_eq!(report.query_params.market, "electric vehicle");
        assert_eq!(report.usage.total(), 15);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].top_p, Some(0.95));
        assert_eq!(requests[0].response_format, ResponseFormat::Text);
        assert!(requests[0].system.is_none());
        assert!(requests[0].messages[0].content.contains("Comparison Table"));
    }

    #[tokio::test]
    async fn test_empty_completion_is_error() {
        let provider = Arc::new(ScriptedProvider::queued(["   \n"]));
        let err = generator(provider).generate(&analysis()).await.unwrap_err();
        assert!(matches!(err, ReportError::EmptyReport));
    }
}
