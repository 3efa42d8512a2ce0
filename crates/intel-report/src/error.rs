//! Error types for report generation

use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Report generation errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// The user query was empty
    #[error("Query is empty")]
    EmptyQuery,

    /// The model could not extract usable parameters from the query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A required API key is missing
    #[error("Missing credential: {name} is not set")]
    MissingCredential {
        name: String,
    },

    /// A research API returned an error
    #[error("{provider} API error: {message}")]
    Api {
        provider: String,
        message: String,
    },

    /// Neither research source produced data
    #[error("No market data available: {0}")]
    NoMarketData(String),

    /// The final completion came back empty
    #[error("The model returned an empty report")]
    EmptyReport,

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] intel_llm::LLMError),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Config file parsing error
    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline stage failed
    #[error("{stage} failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<ReportError>,
    },
}

impl ReportError {
    /// Wrap this error with the stage it happened in
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            already @ ReportError::Stage { .. } => already,
            other => ReportError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error happened in, if known
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ReportError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub(crate) fn api(provider: &str, message: impl Into<String>) -> Self {
        ReportError::Api {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
