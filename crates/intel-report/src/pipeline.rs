//! End-to-end report pipeline

use crate::analysis::{AnalysisEngine, MarketAnalysis};
use crate::collector::{DataCollector, MarketData};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::query::{QueryParams, QueryParser};
use crate::report::{Report, ReportGenerator};
use intel_llm::providers::OpenAIProvider;
use intel_llm::{LLMProvider, TokenUsage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, info, info_span};

/// Stages of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ParsingQuery,
    CollectingData,
    AnalyzingTrends,
    GeneratingReport,
    Complete,
}

impl PipelineStage {
    /// Stage name
    pub fn name(&self) -> &'static str {
        match self {
            Self::ParsingQuery => "Parsing query",
            Self::CollectingData => "Collecting data",
            Self::AnalyzingTrends => "Analyzing trends",
            Self::GeneratingReport => "Generating report",
            Self::Complete => "Complete",
        }
    }

    /// Progress label shown to the user
    pub fn label(&self) -> String {
        match self {
            Self::Complete => "Complete!".to_string(),
            other => format!("{}...", other.name()),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed: Duration,
}

/// Per-stage timings of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    entries: Vec<StageTiming>,
}

impl StageTimings {
    /// Record a stage duration
    pub fn record(&mut self, stage: PipelineStage, elapsed: Duration) {
        self.entries.push(StageTiming { stage, elapsed });
    }

    /// Duration of `stage`, if it ran
    pub fn get(&self, stage: PipelineStage) -> Option<Duration> {
        self.entries
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.elapsed)
    }

    /// Recorded stages in execution order
    pub fn iter(&self) -> impl Iterator<Item = &StageTiming> {
        self.entries.iter()
    }

    /// Sum of all stages
    pub fn total(&self) -> Duration {
        self.entries.iter().map(|t| t.elapsed).sum()
    }
}

async fn timed<T>(
    stage: PipelineStage,
    timings: &mut StageTimings,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let started = Instant::now();
    let result = future
        .instrument(info_span!("pipeline_stage", stage = %stage))
        .await;
    timings.record(stage, started.elapsed());
    result.map_err(|e| e.in_stage(stage))
}

/// Query → research → analysis → report
pub struct ReportPipeline {
    config: ReportConfig,
    parser: QueryParser,
    collector: DataCollector,
    engine: AnalysisEngine,
    generator: ReportGenerator,
}

impl ReportPipeline {
    /// Create a pipeline over an arbitrary provider and collector
    pub fn new(
        config: ReportConfig,
        provider: Arc<dyn LLMProvider>,
        collector: DataCollector,
    ) -> Result<Self> {
        config.validate()?;

        let parser = QueryParser::new(Arc::clone(&provider), config.model.clone())
            .with_retry_policy(config.retry_policy());
        let engine = AnalysisEngine::new(Arc::clone(&provider), &config);
        let generator = ReportGenerator::new(provider, &config);

        Ok(Self {
            config,
            parser,
            collector,
            engine,
            generator,
        })
    }

    /// Create a pipeline backed by OpenAI, SerpApi and NewsAPI
    pub fn from_config(config: ReportConfig) -> Result<Self> {
        let provider = OpenAIProvider::with_config(config.openai_config()?)?;
        let collector = DataCollector::from_config(&config)?;
        Self::new(config, Arc::new(provider), collector)
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn collector(&self) -> &DataCollector {
        &self.collector
    }

    /// Extract query parameters
    pub async fn parse_query(&self, query: &str) -> Result<QueryParams> {
        self.parser.parse(query).await
    }

    /// Collect market data
    pub async fn collect(&self, params: &QueryParams) -> Result<MarketData> {
        self.collector.research_market(params).await
    }

    /// Analyze collected data
    pub async fn analyze(&self, data: &MarketData) -> Result<MarketAnalysis> {
        self.engine.analyze(data).await
    }

    /// Write the report for an analysis
    pub async fn generate(&self, analysis: &MarketAnalysis) -> Result<Report> {
        self.generator.generate(analysis).await
    }

    /// Run every stage, calling `on_stage` as each one starts and at completion
    pub async fn run<F>(&self, query: &str, mut on_stage: F) -> Result<Report>
    where
        F: FnMut(PipelineStage),
    {
        let mut timings = StageTimings::default();
        let mut usage = TokenUsage::default();

        on_stage(PipelineStage::ParsingQuery);
        let (params, parse_usage) = timed(
            PipelineStage::ParsingQuery,
            &mut timings,
            self.parser.parse_with_usage(query),
        )
        .await?;
        usage.accumulate(parse_usage);
        info!(market = %params.market, companies = ?params.companies, "Query parsed");

        on_stage(PipelineStage::CollectingData);
        let data = timed(
            PipelineStage::CollectingData,
            &mut timings,
            self.collector.research_market(&params),
        )
        .await?;

        on_stage(PipelineStage::AnalyzingTrends);
        let (analysis, analysis_usage) = timed(
            PipelineStage::AnalyzingTrends,
            &mut timings,
            self.engine.analyze_with_usage(&data),
        )
        .await?;
        usage.accumulate(analysis_usage);

        on_stage(PipelineStage::GeneratingReport);
        let mut report = timed(
            PipelineStage::GeneratingReport,
            &mut timings,
            self.generator.generate(&analysis),
        )
        .await?;
        usage.accumulate(report.usage);

        report.usage = usage;
        report.timings = timings;

        on_stage(PipelineStage::Complete);
        info!(
            total_ms = report.timings.total().as_millis() as u64,
            tokens = report.usage.total(),
            "Report pipeline complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Article, NewsResponse, OrganicResult, SearchResults};
    use crate::collector::{MockNewsSource, MockSearchSource};
    use crate::error::ReportError;
    use crate::prompts;
    use crate::test_support::ScriptedProvider;
    use intel_llm::CompletionRequest;
    use serde_json::json;

    fn respond(request: &CompletionRequest) -> intel_llm::Result<String> {
        let body = match request.system.as_deref() {
            Some(prompts::QUERY_SYSTEM_PROMPT) => {
                json!({"market": "electric vehicle", "companies": ["Tesla", "BYD"]})
            }
            Some(prompts::TRENDS_SCHEMA) => json!({
                "trends": [
                    {"name": "battery costs", "description": "falling", "impact_score": 0.7},
                    {"name": "charging", "description": "expanding", "impact_score": 0.9}
                ],
                "summary": "growing market"
            }),
            Some(prompts::COMPETITORS_SCHEMA) => json!({
                "top_competitors": [
                    {"name": "Tesla", "market_share": 18, "strengths": ["Brand"], "weaknesses": ["Price"]},
                    {"name": "BYD", "market_share": "16%", "strengths": ["Cost"], "weaknesses": ["Exports"]}
                ],
                "competitive_landscape": "concentrated"
            }),
            Some(prompts::SWOT_SCHEMA) => json!({
                "strengths": {"description": "Demand", "evidence": ["Sales +35%"]}
            }),
            _ => return Ok("# Electric Vehicle Market Report\n\n## 🎯 Executive Summary".to_string()),
        };
        Ok(body.to_string())
    }

    fn collector() -> DataCollector {
        let mut search = MockSearchSource::new();
        search.expect_search().returning(|_| {
            Ok(SearchResults {
                organic_results: vec![OrganicResult {
                    title: "EV outlook".to_string(),
                    snippet: "Sales up".to_string(),
                    ..OrganicResult::default()
                }],
            })
        });
        let mut news = MockNewsSource::new();
        news.expect_everything().returning(|_| {
            Ok(NewsResponse {
                status: "ok".to_string(),
                total_results: 1,
                articles: vec![Article {
                    title: "EV demand climbs".to_string(),
                    description: "Sales rose".to_string(),
                    ..Article::default()
                }],
            })
        });
        DataCollector::new(Arc::new(search), Arc::new(news), Duration::from_secs(60))
    }

    fn config() -> ReportConfig {
        ReportConfig::builder()
            .retry_backoff(Duration::from_millis(1), Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(PipelineStage::ParsingQuery.label(), "Parsing query...");
        assert_eq!(PipelineStage::CollectingData.label(), "Collecting data...");
        assert_eq!(PipelineStage::Complete.label(), "Complete!");
        assert_eq!(PipelineStage::AnalyzingTrends.to_string(), "Analyzing trends");
    }

    #[test]
    fn test_stage_timings() {
        let mut timings = StageTimings::default();
        timings.record(PipelineStage::ParsingQuery, Duration::from_millis(10));
        timings.record(PipelineStage::CollectingData, Duration::from_millis(30));

        assert_eq!(timings.total(), Duration::from_millis(40));
        assert_eq!(timings.get(PipelineStage::CollectingData), Some(Duration::from_millis(30)));
        assert_eq!(timings.get(PipelineStage::GeneratingReport), None);
        assert_eq!(timings.iter().count(), 2);
    }

    #[tokio::test]
    async fn test_run_end_to_end() {
        let provider = Arc::new(ScriptedProvider::from_fn(respond));
        let pipeline = ReportPipeline::new(config(), provider.clone(), collector()).unwrap();

        let mut stages = Vec::new();
        let report = pipeline
            .run(
                "Generate a strategy intelligence report for the electric vehicle market and its key players",
                |stage| stages.push(stage),
            )
            .await
            .unwrap();

        assert_eq!(
            stages,
            vec![
                PipelineStage::ParsingQuery,
                PipelineStage::CollectingData,
                PipelineStage::AnalyzingTrends,
                PipelineStage::GeneratingReport,
                PipelineStage::Complete,
            ]
        );

        assert!(report.markdown.starts_with("# Electric Vehicle Market Report"));
        assert_eq!(report.query_params.companies, vec!["Tesla", "BYD"]);
        assert_eq!(report.analysis.trends.trends[0].name, "Charging");
        assert_eq!(report.analysis.metadata.quality_score, 0.5);
        assert!(report.warnings().is_empty());

        // 1 parse + 2 chunks x 3 analyses + 1 report
        assert_eq!(provider.call_count(), 8);
        assert_eq!(report.usage.total(), 8 * 15);
        assert_eq!(report.timings.iter().count(), 4);

        let report_prompt = &provider.requests()[7].messages[0].content;
        assert!(report_prompt.contains("| Tesla | 18% | Brand | Price |"));
        assert!(report_prompt.contains("| BYD | 16% | Cost | Exports |"));
    }

    #[tokio::test]
    async fn test_errors_carry_their_stage() {
        let provider = Arc::new(ScriptedProvider::from_fn(respond));
        let pipeline = ReportPipeline::new(config(), provider, collector()).unwrap();

        let mut stages = Vec::new();
        let err = pipeline.run("  ", |stage| stages.push(stage)).await.unwrap_err();

        assert_eq!(err.stage(), Some(PipelineStage::ParsingQuery));
        assert!(matches!(
            err,
            ReportError::Stage { ref source, .. } if matches!(**source, ReportError::EmptyQuery)
        ));
        assert_eq!(stages, vec![PipelineStage::ParsingQuery]);
        assert_eq!(err.to_string(), "Parsing query failed: Query is empty");
    }

    #[tokio::test]
    async fn test_collection_failure_stops_pipeline() {
        let mut search = MockSearchSource::new();
        search
            .expect_search()
            .returning(|_| Err(ReportError::api("serpapi", "quota")));
        let mut news = MockNewsSource::new();
        news.expect_everything()
            .returning(|_| Err(ReportError::api("newsapi", "quota")));
        let collector =
            DataCollector::new(Arc::new(search), Arc::new(news), Duration::from_secs(60));

        let provider = Arc::new(ScriptedProvider::from_fn(respond));
        let pipeline = ReportPipeline::new(config(), provider.clone(), collector).unwrap();

        let err = pipeline.run("EV market", |_| {}).await.unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::CollectingData));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_new_validates_config() {
        let mut config = ReportConfig::default();
        config.chunk_size = 0;
        let provider = Arc::new(ScriptedProvider::queued(Vec::<String>::new()));
        assert!(ReportPipeline::new(config, provider, collector()).is_err());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let err = ReportPipeline::from_config(ReportConfig::default()).err();
        assert!(matches!(err, Some(ReportError::MissingCredential { .. })));
    }
}
