use serde::{Deserialize, Serialize};

use crate::models::level::LevelKind;

/// Rule family that generated a predicted level
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    Fibonacci,
    RoundNumber,
    SpacingPattern,
}

/// Whether a learned model contributed to the confidence
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    RuleBased,
    Hybrid,
}

/// A plausible future level with no backing historical touches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictedLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub source: LevelSource,
    /// Short rule tag, e.g. "fib_0.618" or "round_100"
    pub label: String,
    /// 0..=100
    pub rule_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_confidence: Option<f64>,
    /// 0..=100
    pub hybrid_confidence: f64,
    pub prediction_source: PredictionSource,
    /// Periods ahead at which price could plausibly reach the level
    pub horizon_periods: usize,
}
