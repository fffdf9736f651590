use serde::Serialize;

use crate::config::{ANALYSIS, ParamDefaults};
use crate::domain::Timeframe;
use crate::error::{LevelError, Result};

/// Per-request parameters accepted by the pipeline entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisParams {
    /// Levels weaker than this (0..=100) are filtered from the output
    pub min_strength: f64,
    /// Cap per kind (support / resistance)
    pub max_levels: usize,
    pub timeframe: Timeframe,
    pub project_future: bool,
    pub projection_periods: usize,
    /// Overrides the timeframe's default history window
    pub lookback_days: Option<u32>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_strength: ANALYSIS.params.min_strength,
            max_levels: ANALYSIS.params.max_levels,
            timeframe: Timeframe::Day1,
            project_future: false,
            projection_periods: ANALYSIS.params.projection_periods,
            lookback_days: None,
        }
    }
}

impl AnalysisParams {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            ..Default::default()
        }
    }

    pub fn with_projection(mut self, periods: usize) -> Self {
        self.project_future = true;
        self.projection_periods = periods;
        self
    }

    pub fn effective_lookback_days(&self) -> u32 {
        self.lookback_days
            .unwrap_or_else(|| self.timeframe.default_lookback_days())
    }

    pub fn validate(&self, bounds: &ParamDefaults) -> Result<()> {
        if !self.min_strength.is_finite() || !(0.0..=100.0).contains(&self.min_strength) {
            return Err(LevelError::invalid_parameter(
                "min_strength",
                format!("{} is outside 0..=100", self.min_strength),
            ));
        }
        if self.max_levels == 0 {
            return Err(LevelError::invalid_parameter("max_levels", "must be at least 1"));
        }
        if self.projection_periods == 0 || self.projection_periods > bounds.max_projection_periods
        {
            return Err(LevelError::invalid_parameter(
                "projection_periods",
                format!(
                    "{} is outside 1..={}",
                    self.projection_periods, bounds.max_projection_periods
                ),
            ));
        }
        if let Some(days) = self.lookback_days {
            if days == 0 || days > bounds.max_lookback_days {
                return Err(LevelError::invalid_parameter(
                    "lookback_days",
                    format!("{} is outside 1..={}", days, bounds.max_lookback_days),
                ));
            }
        }
        Ok(())
    }
}
