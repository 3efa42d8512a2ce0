//! Cleanup, validation and scoring of decoded analyses

use super::model::{
    AnalysisMetadata, CompetitorAnalysis, MarketAnalysis, SwotAnalysis, TrendAnalysis,
};
use crate::query::QueryParams;
use chrono::Utc;
use std::collections::HashSet;
use tracing::warn;

/// Thresholds of the quality checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityThresholds {
    pub min_competitors: usize,
    pub min_trends: usize,
    pub max_weaknesses: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_competitors: 2,
            min_trends: 2,
            max_weaknesses: 5,
        }
    }
}

/// Inputs of postprocessing besides the analyses
#[derive(Debug, Clone)]
pub struct PostprocessContext {
    pub query_params: QueryParams,
    pub data_sources: Vec<String>,
    pub model_version: String,
    pub thresholds: QualityThresholds,
}

/// Normalize, dedupe, validate, sort and score the analyses
pub fn postprocess(
    mut trends: TrendAnalysis,
    mut competitors: CompetitorAnalysis,
    mut swot: SwotAnalysis,
    ctx: PostprocessContext,
) -> MarketAnalysis {
    normalize_texts(&mut trends, &mut competitors);
    remove_duplicates(&mut trends, &mut competitors, &mut swot);

    let mut warnings = validate_structure(&competitors);
    strategic_sort(&mut trends);
    warnings.extend(validate_quality(&trends, &competitors, &swot, ctx.thresholds));

    for warning in &warnings {
        warn!("{warning}");
    }

    let metadata = AnalysisMetadata {
        processing_date: Utc::now(),
        data_sources: ctx.data_sources,
        model_version: ctx.model_version,
        quality_score: quality_score(trends.trends.len()),
        warnings,
    };

    MarketAnalysis {
        query_params: ctx.query_params,
        trends,
        competitors,
        swot,
        metadata,
    }
}

/// Trim and upper-case the first character
pub fn capitalize(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_texts(trends: &mut TrendAnalysis, competitors: &mut CompetitorAnalysis) {
    for trend in &mut trends.trends {
        trend.name = capitalize(&trend.name);
        trend.description = capitalize(&trend.description);
        for evidence in &mut trend.evidence {
            *evidence = capitalize(evidence);
        }
    }
    trends.summary = capitalize(&trends.summary);
    competitors.competitive_landscape = capitalize(&competitors.competitive_landscape);
}

fn dedupe_strings(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn remove_duplicates(
    trends: &mut TrendAnalysis,
    competitors: &mut CompetitorAnalysis,
    swot: &mut SwotAnalysis,
) {
    let mut seen = HashSet::new();
    trends.trends.retain(|t| seen.insert((t.name.to_lowercase(), t.description.to_lowercase())));
    for trend in &mut trends.trends {
        dedupe_strings(&mut trend.evidence);
    }

    // The same company reported by several chunks is folded into its first entry
    let mut merged: Vec<super::model::Competitor> = Vec::new();
    for competitor in competitors.top_competitors.drain(..) {
        let key = competitor.name.trim().to_lowercase();
        let existing = if key.is_empty() {
            None
        } else {
            merged.iter_mut().find(|c| c.name.trim().to_lowercase() == key)
        };

        match existing {
            Some(first) => {
                first.market_share = first.market_share.or(competitor.market_share);
                first.strengths.extend(competitor.strengths);
                first.weaknesses.extend(competitor.weaknesses);
                first.recent_activity.extend(competitor.recent_activity);
                for (k, v) in competitor.key_financials {
                    first.key_financials.entry(k).or_insert(v);
                }
            }
            None => merged.push(competitor),
        }
    }
    for competitor in &mut merged {
        dedupe_strings(&mut competitor.strengths);
        dedupe_strings(&mut competitor.weaknesses);
        dedupe_strings(&mut competitor.recent_activity);
    }
    competitors.top_competitors = merged;

    for entry in [
        &mut swot.strengths,
        &mut swot.weaknesses,
        &mut swot.opportunities,
        &mut swot.threats,
    ] {
        dedupe_strings(&mut entry.evidence);
    }
}

fn validate_structure(competitors: &CompetitorAnalysis) -> Vec<String> {
    let mut warnings = Vec::new();

    for (index, competitor) in competitors.top_competitors.iter().enumerate() {
        if competitor.name.trim().is_empty() {
            warnings.push(format!("Missing field in competitor #{}: name", index + 1));
        }
        if competitor.market_share.is_none() {
            let label = if competitor.name.trim().is_empty() {
                format!("#{}", index + 1)
            } else {
                competitor.name.clone()
            };
            warnings.push(format!("Missing field in competitor {label}: market_share"));
        }
    }

    warnings
}

/// Scored trends first (highest impact first), then unscored in original order
fn strategic_sort(trends: &mut TrendAnalysis) {
    let (mut scored, unscored): (Vec<_>, Vec<_>) = trends
        .trends
        .drain(..)
        .partition(|t| t.impact_score.is_some());

    scored.sort_by(|a, b| {
        let a = a.impact_score.unwrap_or_default();
        let b = b.impact_score.unwrap_or_default();
        b.total_cmp(&a)
    });

    scored.extend(unscored);
    trends.trends = scored;
}

fn validate_quality(
    trends: &TrendAnalysis,
    competitors: &CompetitorAnalysis,
    swot: &SwotAnalysis,
    thresholds: QualityThresholds,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let competitor_count = competitors.top_competitors.len();
    if competitor_count < thresholds.min_competitors {
        warnings.push(format!("Only {competitor_count} competitors identified"));
    }

    let trend_count = trends.trends.len();
    if trend_count < thresholds.min_trends {
        warnings.push(format!("Only {trend_count} trends identified"));
    }

    let weakness_count = swot.weaknesses.evidence.len();
    if weakness_count > thresholds.max_weaknesses {
        warnings.push(format!("{weakness_count} weaknesses found"));
    }

    warnings
}

/// `0.3 + min(0.1 × trends, 0.3)`, capped at 1.0 and rounded to two decimals
pub fn quality_score(trend_count: usize) -> f64 {
    let score = 0.3 + (trend_count as f64 * 0.1).min(0.3);
    (score.min(1.0) * 100.0).round() / 100.0
}
