//! Engineered features describing a predicted-level candidate.

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::analysis::volume_profile::VolumeProfile;
use crate::config::ProjectionSettings;
use crate::models::{LevelSource, OhlcvTimeSeries};

pub const FEATURE_COUNT: usize = 8;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "normalized_distance",
    "source_fibonacci",
    "source_round_number",
    "source_spacing_pattern",
    "volatility",
    "volume_percentile",
    "level_density",
    "trend_direction",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateFeatures {
    /// Signed `(candidate - current) / current`
    pub normalized_distance: f64,
    pub source_fibonacci: f64,
    pub source_round_number: f64,
    pub source_spacing_pattern: f64,
    /// Std-dev of log returns over the volatility window
    pub volatility: f64,
    /// Volume-profile percentile at the candidate price, 0..=1
    pub volume_percentile: f64,
    /// Share of historical levels within the density radius of the candidate
    pub level_density: f64,
    /// -1 (falling) ..= 1 (rising)
    pub trend_direction: f64,
}

impl CandidateFeatures {
    /// Model input order, matching `FEATURE_NAMES`.
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.normalized_distance,
            self.source_fibonacci,
            self.source_round_number,
            self.source_spacing_pattern,
            self.volatility,
            self.volume_percentile,
            self.level_density,
            self.trend_direction,
        ]
    }
}

/// Series-wide inputs computed once and shared by all candidates of a run.
#[derive(Debug, Clone)]
pub struct FeatureContext<'a> {
    pub current_price: f64,
    pub volatility: f64,
    pub trend_direction: f64,
    pub average_true_range: f64,
    profile: Option<&'a VolumeProfile>,
    level_prices: Vec<f64>,
    density_radius_pct: f64,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        series: &OhlcvTimeSeries,
        profile: Option<&'a VolumeProfile>,
        level_prices: Vec<f64>,
        settings: &ProjectionSettings,
    ) -> Self {
        Self {
            current_price: series.last_close().unwrap_or(0.0),
            volatility: log_return_volatility(&series.close_prices, settings.volatility_window),
            trend_direction: trend_direction(&series.close_prices, settings.volatility_window),
            average_true_range: average_true_range(series, settings.volatility_window),
            profile,
            level_prices,
            density_radius_pct: settings.density_radius_pct,
        }
    }

    pub fn features_for(&self, price: f64, source: LevelSource) -> CandidateFeatures {
        let normalized_distance = if self.current_price > 0.0 {
            (price - self.current_price) / self.current_price
        } else {
            0.0
        };
        let one_hot = |s: LevelSource| if s == source { 1.0 } else { 0.0 };

        let nearby = self
            .level_prices
            .iter()
            .filter(|&&p| p > 0.0 && (p - price).abs() / p <= self.density_radius_pct)
            .count();
        let level_density = if self.level_prices.is_empty() {
            0.0
        } else {
            nearby as f64 / self.level_prices.len() as f64
        };

        CandidateFeatures {
            normalized_distance,
            source_fibonacci: one_hot(LevelSource::Fibonacci),
            source_round_number: one_hot(LevelSource::RoundNumber),
            source_spacing_pattern: one_hot(LevelSource::SpacingPattern),
            volatility: self.volatility,
            volume_percentile: self.profile.map_or(0.0, |p| p.percentile_at(price) / 100.0),
            level_density,
            trend_direction: self.trend_direction,
        }
    }

    /// Bars price would need at its average true range to reach `price`, within `1..=cap`.
    pub fn horizon_periods(&self, price: f64, cap: usize) -> usize {
        let cap = cap.max(1);
        if self.average_true_range <= 0.0 {
            return cap;
        }
        let bars = ((price - self.current_price).abs() / self.average_true_range).ceil();
        (bars as usize).clamp(1, cap)
    }
}

/// Std-dev of log returns over the trailing `window` closes; zero with fewer than two returns.
pub fn log_return_volatility(closes: &[f64], window: usize) -> f64 {
    let start = closes.len().saturating_sub(window + 1);
    let returns: Vec<f64> = closes[start..]
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = returns.iter().std_dev();
    if sd.is_finite() { sd } else { 0.0 }
}

/// Change over the trailing window squashed into -1..=1.
pub fn trend_direction(closes: &[f64], window: usize) -> f64 {
    let n = closes.len();
    if n < 2 || window == 0 {
        return 0.0;
    }
    let past = closes[n - 1 - window.min(n - 1)];
    if past <= 0.0 {
        return 0.0;
    }
    (10.0 * (closes[n - 1] - past) / past).tanh()
}

/// Mean true range over the trailing `window` bars.
pub fn average_true_range(series: &OhlcvTimeSeries, window: usize) -> f64 {
    let n = series.len();
    if n == 0 || window == 0 {
        return 0.0;
    }
    let start = n.saturating_sub(window);
    let ranges: Vec<f64> = (start..n)
        .map(|i| {
            let prev_close = i.checked_sub(1).map(|p| series.close_prices[p]);
            series.bar(i).true_range(prev_close)
        })
        .collect();
    ranges.iter().sum::<f64>() / ranges.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ANALYSIS;
    use crate::test_support::{double_bottom_series, series_from_closes};

    #[test]
    fn test_volatility_zero_for_constant_growth() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        assert!(log_return_volatility(&closes, 20) < 1e-9);
        assert_eq!(log_return_volatility(&[100.0, 101.0], 20), 0.0);
    }

    #[test]
    fn test_trend_direction_sign() {
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert!(trend_direction(&rising, 20) > 0.5);
        assert!(trend_direction(&falling, 20) < -0.5);
    }

    #[test]
    fn test_features_for_candidate() {
        let series = double_bottom_series("X");
        let context =
            FeatureContext::new(&series, None, vec![100.0, 116.0, 130.0], &ANALYSIS.projection);
        let features = context.features_for(101.0, LevelSource::RoundNumber);

        assert!(features.normalized_distance < 0.0);
        assert_eq!(features.source_round_number, 1.0);
        assert_eq!(features.source_fibonacci + features.source_spacing_pattern, 0.0);
        assert!((features.level_density - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(features.volume_percentile, 0.0);
        assert_eq!(features.to_vector().len(), FEATURE_NAMES.len());
    }

    #[test]
    fn test_horizon_scales_with_distance() {
        let series = series_from_closes("X", &[100.0; 30]);
        let context = FeatureContext::new(&series, None, Vec::new(), &ANALYSIS.projection);
        // ATR is the 1.0 daily range
        assert!((context.average_true_range - 1.0).abs() < 1e-9);
        assert_eq!(context.horizon_periods(104.5, 50), 5);
        assert_eq!(context.horizon_periods(200.0, 50), 50);
        assert_eq!(context.horizon_periods(100.0, 50), 1);
    }
}
