use serde::Serialize;

use crate::domain::Timeframe;
use crate::models::level::{Level, LevelKind, PriceLevel};
use crate::models::prediction::PredictedLevel;

/// Headline numbers for a symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub total_levels: usize,
    pub nearest_support: Option<f64>,
    pub nearest_resistance: Option<f64>,
    pub current_price: f64,
}

/// Detection counts and data span behind a result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub timeframe: Option<Timeframe>,
    pub bar_count: usize,
    pub data_start_ms: Option<i64>,
    pub data_end_ms: Option<i64>,
    pub span_days: f64,
    pub peaks_detected: usize,
    pub valleys_detected: usize,
    pub clusters_formed: usize,
    pub volume_nodes: usize,
    pub candidates_evaluated: usize,
    pub levels_validated: usize,
    pub levels_flagged_unvalidated: usize,
    pub levels_dropped_no_touches: usize,
    /// Series was too short for extrema detection
    pub insufficient_data: bool,
    /// A confidence model scored the predicted levels
    pub model_used: bool,
}

/// Full per-symbol result of the level pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAnalysis {
    pub symbol: String,
    pub support_levels: Vec<PriceLevel>,
    pub resistance_levels: Vec<PriceLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_future_levels: Option<Vec<PredictedLevel>>,
    pub summary: LevelSummary,
    pub metadata: AnalysisMetadata,
}

impl LevelAnalysis {
    /// Result for a series with nothing to detect.
    pub fn empty(symbol: &str, current_price: f64, metadata: AnalysisMetadata) -> Self {
        Self {
            symbol: symbol.to_string(),
            support_levels: Vec::new(),
            resistance_levels: Vec::new(),
            predicted_future_levels: None,
            summary: LevelSummary {
                total_levels: 0,
                nearest_support: None,
                nearest_resistance: None,
                current_price,
            },
            metadata,
        }
    }

    pub fn levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.support_levels.iter().chain(self.resistance_levels.iter())
    }

    /// Historical and predicted levels as one tagged list, sorted by price.
    pub fn all_levels(&self) -> Vec<Level> {
        let mut all: Vec<Level> = self.levels().cloned().map(Level::Historical).collect();
        if let Some(predicted) = &self.predicted_future_levels {
            all.extend(predicted.iter().cloned().map(Level::Predicted));
        }
        all.sort_by(|a, b| a.price().total_cmp(&b.price()));
        all
    }
}

impl LevelSummary {
    /// Nearest support at or below price and nearest resistance at or above it.
    pub fn from_levels(
        support: &[PriceLevel],
        resistance: &[PriceLevel],
        current_price: f64,
    ) -> Self {
        let nearest = |levels: &[PriceLevel], kind: LevelKind| {
            levels
                .iter()
                .filter(|l| match kind {
                    LevelKind::Support => l.price <= current_price,
                    LevelKind::Resistance => l.price >= current_price,
                })
                .min_by(|a, b| {
                    a.distance_to(current_price)
                        .total_cmp(&b.distance_to(current_price))
                })
                .map(|l| l.price)
        };

        Self {
            total_levels: support.len() + resistance.len(),
            nearest_support: nearest(support, LevelKind::Support),
            nearest_resistance: nearest(resistance, LevelKind::Resistance),
            current_price,
        }
    }
}
