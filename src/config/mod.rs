//! Configuration module for level analysis.

pub mod analysis;

mod debug; // Private: use crate::config::DEBUG_FLAGS
pub use debug::DEBUG_FLAGS;

pub use analysis::{
    ANALYSIS, AnalysisConfig, ClusterSettings, EngineSettings, ExtremaSettings, ParamDefaults,
    ProjectionSettings, RetrySettings, StrengthSettings, ValidationSettings,
    VolumeProfileSettings,
};
