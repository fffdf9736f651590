// Domain models for level analysis
// These modules contain pure data independent of loading and orchestration

pub mod analysis_result;
pub mod level;
pub mod params;
pub mod prediction;
pub mod timeseries;

// Re-export key types for convenience
pub use analysis_result::{AnalysisMetadata, LevelAnalysis, LevelSummary};
pub use level::{
    ExtremumKind, ExtremumPoint, Level, LevelCluster, LevelKind, LevelOrigin, LevelProjection,
    PriceLevel,
};
pub use params::AnalysisParams;
pub use prediction::{LevelSource, PredictedLevel, PredictionSource};
pub use timeseries::OhlcvTimeSeries;
