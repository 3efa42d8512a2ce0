//! Analysis result types
//!
//! Model output is loosely typed: numbers arrive as strings ("12.5%"), lists as
//! single strings, objects as plain text. Decoding here accepts those shapes
//! and falls back to defaults instead of failing the whole analysis.

use crate::query::QueryParams;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A market trend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trend {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub evidence: Vec<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub impact_score: Option<f64>,
}

impl From<String> for Trend {
    fn from(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Merged trend analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendAnalysis {
    #[serde(deserialize_with = "lenient_items")]
    pub trends: Vec<Trend>,
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
}

/// A competitor profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Competitor {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    /// Market share in percent
    #[serde(deserialize_with = "lenient_number")]
    pub market_share: Option<f64>,
    #[serde(deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub recent_activity: Vec<String>,
    #[serde(deserialize_with = "lenient_number_map")]
    pub key_financials: BTreeMap<String, f64>,
}

impl From<String> for Competitor {
    fn from(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// Merged competitor analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorAnalysis {
    #[serde(deserialize_with = "lenient_items")]
    pub top_competitors: Vec<Competitor>,
    #[serde(deserialize_with = "lenient_string")]
    pub competitive_landscape: String,
}

/// One SWOT quadrant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SwotEntryRepr")]
pub struct SwotEntry {
    pub description: String,
    pub evidence: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SwotEntryRepr {
    Full {
        #[serde(default, deserialize_with = "lenient_string")]
        description: String,
        #[serde(default, deserialize_with = "lenient_strings")]
        evidence: Vec<String>,
    },
    Text(String),
    List(Vec<Value>),
    Other(Value),
}

impl From<SwotEntryRepr> for SwotEntry {
    fn from(repr: SwotEntryRepr) -> Self {
        match repr {
            SwotEntryRepr::Full {
                description,
                evidence,
            } => Self {
                description,
                evidence,
            },
            SwotEntryRepr::Text(description) => Self {
                description,
                evidence: Vec::new(),
            },
            SwotEntryRepr::List(items) => Self {
                description: String::new(),
                evidence: items.iter().filter_map(value_to_text).collect(),
            },
            SwotEntryRepr::Other(_) => Self::default(),
        }
    }
}

/// Merged SWOT analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwotAnalysis {
    pub strengths: SwotEntry,
    pub weaknesses: SwotEntry,
    pub opportunities: SwotEntry,
    pub threats: SwotEntry,
}

impl SwotAnalysis {
    /// Quadrants with their display titles, in report order
    pub fn quadrants(&self) -> [(&'static str, &SwotEntry); 4] {
        [
            ("Strengths", &self.strengths),
            ("Weaknesses", &self.weaknesses),
            ("Opportunities", &self.opportunities),
            ("Threats", &self.threats),
        ]
    }
}

/// Provenance and quality of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub processing_date: DateTime<Utc>,
    pub data_sources: Vec<String>,
    pub model_version: String,
    /// 0.3 base plus 0.1 per trend, at most 0.6
    pub quality_score: f64,
    /// Data-quality findings from postprocessing
    pub warnings: Vec<String>,
}

/// Postprocessed result of the three analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub query_params: QueryParams,
    pub trends: TrendAnalysis,
    pub competitors: CompetitorAnalysis,
    pub swot: SwotAnalysis,
    pub metadata: AnalysisMetadata,
}

/// Parse a number out of model output: `12.5`, `"12.5%"`, `"1,200"`, `"$3.4B"`
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '%' | ',' | '$' | ' '))
                .collect();
            let cleaned = cleaned.trim_end_matches(['B', 'b', 'M', 'm']);
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => value_to_text(&other).unwrap_or_default(),
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value))
}

fn lenient_number_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| parse_number(v).map(|n| (k.clone(), n)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Objects decode as `T`; bare strings become `T::from(name)`; anything else is dropped
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + From<String>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).ok(),
            Value::String(s) if !s.trim().is_empty() => Some(T::from(s)),
            _ => None,
        })
        .collect())
}
