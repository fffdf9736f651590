//! Deterministic rule families proposing future levels.

use argminmax::ArgMinMax;
use statrs::statistics::Statistics;

use crate::config::ProjectionSettings;
use crate::models::{LevelSource, OhlcvTimeSeries};

/// A rule's proposal before filtering and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCandidate {
    pub price: f64,
    pub source: LevelSource,
    pub label: String,
    /// 0..=100
    pub rule_confidence: f64,
}

// Golden ratio first, then the half and the shallow/deep retracements
fn fib_confidence(ratio: f64) -> f64 {
    match (ratio * 1000.0).round() as i64 {
        618 => 80.0,
        500 | 382 => 70.0,
        786 => 60.0,
        _ => 50.0,
    }
}

const MAJOR_ROUND_CONFIDENCE: f64 = 70.0;
const MINOR_ROUND_CONFIDENCE: f64 = 50.0;
const SPACING_STEPS: usize = 2;

/// The most recent swing in the lookback window: (low, high, is_upswing).
///
/// An upswing has its low before its high. Returns `None` when the swing is
/// smaller than `min_swing_pct`.
pub fn recent_swing(series: &OhlcvTimeSeries, settings: &ProjectionSettings) -> Option<(f64, f64, bool)> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let start = n.saturating_sub(settings.swing_lookback_bars.max(2));
    let highs = &series.high_prices[start..];
    let lows = &series.low_prices[start..];

    let high_idx: usize = highs.argmax();
    let low_idx: usize = lows.argmin();
    let (high, low) = (highs[high_idx], lows[low_idx]);

    if low <= 0.0 || (high - low) / low < settings.min_swing_pct {
        return None;
    }
    Some((low, high, low_idx < high_idx))
}

/// Retracement levels of the most recent significant swing.
pub fn fibonacci_levels(series: &OhlcvTimeSeries, settings: &ProjectionSettings) -> Vec<RuleCandidate> {
    let Some((low, high, upswing)) = recent_swing(series, settings) else {
        return Vec::new();
    };
    let swing = high - low;

    settings
        .fib_ratios
        .iter()
        .map(|&ratio| RuleCandidate {
            price: if upswing {
                high - ratio * swing
            } else {
                low + ratio * swing
            },
            source: LevelSource::Fibonacci,
            label: format!("fib_{}", ratio),
            rule_confidence: fib_confidence(ratio),
        })
        .collect()
}

/// Nearest round numbers on each side of the price.
///
/// Majors are multiples of the price's power of ten, minors fall halfway between.
pub fn round_number_levels(current_price: f64, per_side: usize) -> Vec<RuleCandidate> {
    if current_price <= 0.0 || !current_price.is_finite() || per_side == 0 {
        return Vec::new();
    }

    let major = 10f64.powi(current_price.log10().floor() as i32);
    let minor = major / 2.0;
    let decimals = (-minor.log10()).ceil().max(0.0) as usize;
    let base = (current_price / minor).floor() as i64;

    let below_start = if (base as f64 * minor - current_price).abs() < minor * 1e-9 {
        base - 1
    } else {
        base
    };
    let below = (0..per_side as i64).map(|k| below_start - k);
    let above = (0..per_side as i64).map(|k| base + 1 + k);

    below
        .chain(above)
        .filter(|&step| step > 0)
        .map(|step| {
            let price = step as f64 * minor;
            let is_major = step % 2 == 0;
            RuleCandidate {
                price,
                source: LevelSource::RoundNumber,
                label: format!("round_{:.*}", decimals, price),
                rule_confidence: if is_major {
                    MAJOR_ROUND_CONFIDENCE
                } else {
                    MINOR_ROUND_CONFIDENCE
                },
            }
        })
        .collect()
}

/// Extrapolate the average spacing of historical levels beyond both ends of the ladder.
///
/// Needs at least three distinct levels. Confidence rises as the spacing gets more regular.
pub fn spacing_levels(level_prices: &[f64]) -> Vec<RuleCandidate> {
    let mut prices: Vec<f64> = level_prices.iter().copied().filter(|p| *p > 0.0).collect();
    prices.sort_by(|a, b| a.total_cmp(b));
    prices.dedup_by(|a, b| (*a - *b).abs() <= f64::EPSILON * b.abs());
    if prices.len() < 3 {
        return Vec::new();
    }

    let gaps: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_gap = gaps.iter().mean();
    if mean_gap <= 0.0 || !mean_gap.is_finite() {
        return Vec::new();
    }
    let cv = gaps.iter().population_std_dev() / mean_gap;
    let regularity = (1.0 - cv).clamp(0.0, 1.0);
    let base_confidence = 30.0 + 40.0 * regularity;

    let (lowest, highest) = (prices[0], prices[prices.len() - 1]);
    let mut candidates = Vec::new();
    for k in 1..=SPACING_STEPS {
        let confidence = base_confidence * (1.0 - 0.15 * (k - 1) as f64);
        candidates.push(RuleCandidate {
            price: highest + k as f64 * mean_gap,
            source: LevelSource::SpacingPattern,
            label: format!("spacing_up_{}", k),
            rule_confidence: confidence,
        });
        let below = lowest - k as f64 * mean_gap;
        if below > 0.0 {
            candidates.push(RuleCandidate {
                price: below,
                source: LevelSource::SpacingPattern,
                label: format!("spacing_down_{}", k),
                rule_confidence: confidence,
            });
        }
    }
    candidates
}
