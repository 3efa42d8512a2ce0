//! LLM-driven structured analysis of market data

use super::merge::merge_responses;
use super::model::{CompetitorAnalysis, MarketAnalysis, SwotAnalysis, TrendAnalysis};
use super::postprocess::{PostprocessContext, QualityThresholds, postprocess};
use super::preprocess::{ChunkLimits, DataChunk, chunk, preprocess};
use crate::collector::MarketData;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::prompts::{self, render};
use futures::future::try_join_all;
use intel_llm::{
    CompletionRequest, LLMProvider, Message, RetryPolicy, TokenUsage, extract_json_object,
};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The three analyses run over every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    Trends,
    Competitors,
    Swot,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [Self::Trends, Self::Competitors, Self::Swot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trends => "trends",
            Self::Competitors => "competitors",
            Self::Swot => "swot",
        }
    }

    /// Task given in the user message
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Trends => prompts::TRENDS_INSTRUCTION,
            Self::Competitors => prompts::COMPETITORS_INSTRUCTION,
            Self::Swot => prompts::SWOT_INSTRUCTION,
        }
    }

    /// System prompt describing the JSON shape
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Trends => prompts::TRENDS_SCHEMA,
            Self::Competitors => prompts::COMPETITORS_SCHEMA,
            Self::Swot => prompts::SWOT_SCHEMA,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs the trend, competitor and SWOT analyses
pub struct AnalysisEngine {
    provider: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    max_tokens: usize,
    max_search_results: usize,
    limits: ChunkLimits,
    thresholds: QualityThresholds,
    retry: RetryPolicy,
}

impl AnalysisEngine {
    /// Create an engine with settings from `config`
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ReportConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.analysis_temperature,
            max_tokens: config.max_tokens,
            max_search_results: config.max_search_results,
            limits: ChunkLimits::from(config),
            thresholds: QualityThresholds {
                min_competitors: config.min_competitors,
                min_trends: config.min_trends,
                max_weaknesses: config.max_weaknesses,
            },
            retry: config.retry_policy(),
        }
    }

    /// Use a custom retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Analyze market data
    pub async fn analyze(&self, data: &MarketData) -> Result<MarketAnalysis> {
        self.analyze_with_usage(data).await.map(|(analysis, _)| analysis)
    }

    /// Analyze market data, also returning the token usage of every call
    #[instrument(skip(self, data), fields(market = %data.query_params.market))]
    pub async fn analyze_with_usage(
        &self,
        data: &MarketData,
    ) -> Result<(MarketAnalysis, TokenUsage)> {
        let processed = preprocess(data, self.max_search_results);
        let chunks = chunk(&processed, self.limits)?;
        info!(chunks = chunks.len(), "Running structured analyses");

        let (trends, competitors, swot) = tokio::try_join!(
            self.structured_analysis(AnalysisKind::Trends, &chunks),
            self.structured_analysis(AnalysisKind::Competitors, &chunks),
            self.structured_analysis(AnalysisKind::Swot, &chunks),
        )?;

        let usage = trends.1 + competitors.1 + swot.1;
        let trends: TrendAnalysis = serde_json::from_value(trends.0)?;
        let competitors: CompetitorAnalysis = serde_json::from_value(competitors.0)?;
        let swot: SwotAnalysis = serde_json::from_value(swot.0)?;

        let analysis = postprocess(
            trends,
            competitors,
            swot,
            PostprocessContext {
                query_params: data.query_params.clone(),
                data_sources: data.sources.clone(),
                model_version: self.model.clone(),
                thresholds: self.thresholds,
            },
        );

        info!(
            trends = analysis.trends.trends.len(),
            competitors = analysis.competitors.top_competitors.len(),
            quality_score = analysis.metadata.quality_score,
            "Analysis complete"
        );
        Ok((analysis, usage))
    }

    /// One JSON-mode call per chunk (concurrently, each retried), merged in chunk order
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn structured_analysis(
        &self,
        kind: AnalysisKind,
        chunks: &[DataChunk],
    ) -> Result<(Value, TokenUsage)> {
        let calls = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| self.analyze_chunk(kind, index, chunk));

        let results = try_join_all(calls).await?;

        let mut usage = TokenUsage::default();
        let mut responses = Vec::with_capacity(results.len());
        for (value, chunk_usage) in results {
            usage.accumulate(chunk_usage);
            responses.push(value);
        }

        Ok((merge_responses(responses), usage))
    }

    async fn analyze_chunk(
        &self,
        kind: AnalysisKind,
        index: usize,
        chunk: &DataChunk,
    ) -> Result<(Value, TokenUsage)> {
        let user_prompt = render(
            prompts::ANALYSIS_USER_TEMPLATE,
            json!({ "instruction": kind.instruction(), "chunk": chunk.to_prompt_json() }),
        )?;
        let operation = format!("{kind} analysis, chunk {}", index + 1);

        let result = self
            .retry
            .execute(&operation, || {
                let provider = Arc::clone(&self.provider);
                let request = CompletionRequest::builder(&self.model)
                    .system(kind.system_prompt())
                    .add_message(Message::user(user_prompt.clone()))
                    .max_tokens(self.max_tokens)
                    .temperature(self.temperature)
                    .json_mode()
                    .build();

                async move {
                    let response = provider.complete(request).await?;
                    let value = extract_json_object(response.text())?;
                    Ok((value, response.usage))
                }
            })
            .await?;

        debug!(kind = %kind, chunk = index + 1, "Chunk analyzed");
        Ok(result)
    }
}
