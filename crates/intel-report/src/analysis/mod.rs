//! AI-powered analysis
//!
//! Market data is preprocessed into text lines, split into chunks, and run
//! through three structured JSON analyses (trends, competitors, SWOT). Chunk
//! responses are merged, decoded leniently and postprocessed into a
//! [`MarketAnalysis`].

pub mod engine;
pub mod merge;
pub mod model;
pub mod postprocess;
pub mod preprocess;

pub use engine::{AnalysisEngine, AnalysisKind};
pub use merge::merge_responses;
pub use model::{
    AnalysisMetadata, Competitor, CompetitorAnalysis, MarketAnalysis, SwotAnalysis, SwotEntry,
    Trend, TrendAnalysis,
};
pub use postprocess::{QualityThresholds, postprocess};
pub use preprocess::{ChunkLimits, DataChunk, ProcessedData, chunk, preprocess};
