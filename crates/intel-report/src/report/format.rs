//! Markdown fragments embedded in the report prompt

use crate::analysis::{Competitor, SwotAnalysis, Trend};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

const TABLE_HEADER: &str = "| Company | Participation | Key Strengths | Critical Weaknesses |\n\
                            |---------|---------------|------------------|----------------------|\n";

/// `25%`, `12.5%`, or `N/A`
pub fn format_market_share(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v}%"),
        _ => "N/A".to_string(),
    }
}

/// Make text safe inside a Markdown table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn first_two(items: &[String]) -> String {
    items.iter().take(2).map(|s| cell(s)).collect::<Vec<_>>().join(", ")
}

/// Comparison table of the first `top_n` competitors
pub fn format_competitors_table(competitors: &[Competitor], top_n: usize) -> String {
    let mut table = String::from(TABLE_HEADER);

    for competitor in competitors.iter().take(top_n) {
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            cell(&competitor.name),
            format_market_share(competitor.market_share),
            first_two(&competitor.strengths),
            first_two(&competitor.weaknesses),
        ));
    }

    table
}

/// SWOT quadrants with their first two pieces of evidence
pub fn format_swot(swot: &SwotAnalysis) -> String {
    swot.quadrants()
        .iter()
        .map(|(title, entry)| {
            let evidence: Vec<&str> = entry.evidence.iter().take(2).map(String::as_str).collect();
            format!(
                "**{title}:** {}\nEvidence: {}\n",
                entry.description,
                evidence.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One bullet per trend
pub fn format_trends(trends: &[Trend]) -> String {
    if trends.is_empty() {
        return "- No clear trends were detected".to_string();
    }

    trends
        .iter()
        .map(|t| {
            if t.description.is_empty() {
                format!("- {}", t.name)
            } else {
                format!("- {}: {}", t.name, t.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Percent-like keys as percentages, everything else in billions of dollars
pub fn format_financials(financials: &BTreeMap<String, f64>) -> String {
    if financials.is_empty() {
        return "No financial data available".to_string();
    }

    financials
        .iter()
        .map(|(k, v)| {
            if k.contains('%') {
                format!("- {k}: {v:.2}%")
            } else {
                format!("- {k}: ${v:.2}B")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `dd/mm/YYYY`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d/%m/%Y").to_string()
}
