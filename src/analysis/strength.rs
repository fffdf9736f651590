//! Strength and breakout scoring.
//!
//! strength = 100 * (w_t * touch + w_r * recency + w_x * reaction)
//! breakout = 100 * (w_p * proximity + w_w * (1 - strength / 100) + w_d * direction)
//!
//! All sub-scores live in [0, 1] and both results are clamped to [0, 100].

use crate::analysis::validation::ValidatedLevel;
use crate::config::StrengthSettings;
use crate::models::{LevelKind, OhlcvTimeSeries, PriceLevel};

/// Diminishing returns: 1 touch ~0.28, 3 touches ~0.63, 6 touches ~0.86 (saturation 3).
pub fn touch_score(touches: usize, settings: &StrengthSettings) -> f64 {
    if settings.touch_saturation <= 0.0 {
        return if touches > 0 { 1.0 } else { 0.0 };
    }
    1.0 - (-(touches as f64) / settings.touch_saturation).exp()
}

/// Halves every `recency_half_life_bars` since the last touch.
pub fn recency_score(bars_since_last_touch: usize, settings: &StrengthSettings) -> f64 {
    if settings.recency_half_life_bars <= 0.0 {
        return if bars_since_last_touch == 0 { 1.0 } else { 0.0 };
    }
    0.5f64.powf(bars_since_last_touch as f64 / settings.recency_half_life_bars)
}

pub fn strength_score(
    touches: usize,
    bars_since_last_touch: usize,
    validation_rate: f64,
    settings: &StrengthSettings,
) -> f64 {
    let raw = settings.touch_weight * touch_score(touches, settings)
        + settings.recency_weight * recency_score(bars_since_last_touch, settings)
        + settings.reaction_weight * validation_rate.clamp(0.0, 1.0);
    (100.0 * raw).clamp(0.0, 100.0)
}

/// Fractional close change over the last `bars` bars.
pub fn momentum(series: &OhlcvTimeSeries, bars: usize) -> f64 {
    let n = series.len();
    if n < 2 || bars == 0 {
        return 0.0;
    }
    let back = bars.min(n - 1);
    let past = series.close_prices[n - 1 - back];
    if past <= 0.0 {
        return 0.0;
    }
    (series.close_prices[n - 1] - past) / past
}

/// Inversely proportional to the relative distance between price and level.
pub fn proximity_score(level_price: f64, current_price: f64, settings: &StrengthSettings) -> f64 {
    if level_price <= 0.0 {
        return 0.0;
    }
    let distance = (current_price - level_price).abs() / level_price;
    1.0 / (1.0 + distance / settings.proximity_scale.max(f64::EPSILON))
}

/// 0.5 when flat; above 0.5 when price is moving toward the level.
pub fn direction_score(
    level_price: f64,
    current_price: f64,
    momentum: f64,
    settings: &StrengthSettings,
) -> f64 {
    let toward = if level_price < current_price {
        -momentum
    } else if level_price > current_price {
        momentum
    } else {
        momentum.abs()
    };
    0.5 + 0.5 * (toward / settings.direction_scale.max(f64::EPSILON)).tanh()
}

pub fn breakout_probability(
    level_price: f64,
    strength: f64,
    current_price: f64,
    momentum: f64,
    settings: &StrengthSettings,
) -> f64 {
    let raw = settings.proximity_weight * proximity_score(level_price, current_price, settings)
        + settings.weakness_weight * (1.0 - strength.clamp(0.0, 100.0) / 100.0)
        + settings.direction_weight * direction_score(level_price, current_price, momentum, settings);
    (100.0 * raw).clamp(0.0, 100.0)
}

/// Turn validated levels into scored `PriceLevel`s against the series' last bar.
pub fn score_levels(
    series: &OhlcvTimeSeries,
    validated: &[ValidatedLevel],
    settings: &StrengthSettings,
) -> Vec<PriceLevel> {
    let Some(current_price) = series.last_close() else {
        return Vec::new();
    };
    let last_index = series.len() - 1;
    let price_momentum = momentum(series, settings.momentum_bars);

    validated
        .iter()
        .filter_map(|level| {
            let first = level.first_touch_index()?;
            let last = level.last_touch_index()?;
            let strength = strength_score(
                level.touch_count(),
                last_index.saturating_sub(last),
                level.validation_rate,
                settings,
            );
            let candidate = &level.candidate;

            Some(PriceLevel {
                price: candidate.price,
                kind: candidate.kind,
                origin: candidate.origin,
                touch_count: level.touch_count(),
                validation_rate: level.validation_rate,
                is_validated: level.is_validated,
                strength,
                breakout_probability: breakout_probability(
                    candidate.price,
                    strength,
                    current_price,
                    price_momentum,
                    settings,
                ),
                volume: candidate.volume,
                volume_percentile: candidate.volume_percentile,
                has_volume_confirmation: candidate.has_volume_confirmation,
                first_touch_ms: series.timestamps_ms[first],
                last_touch_ms: series.timestamps_ms[last],
                projection: None,
            })
        })
        .collect()
}

/// Drop weak levels, suppress same-kind levels inside a stronger level's tolerance,
/// then keep the strongest `max_levels` of each kind.
pub fn select_levels(
    levels: Vec<PriceLevel>,
    min_strength: f64,
    max_levels: usize,
    suppression_tolerance: f64,
) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
    let mut ranked: Vec<PriceLevel> = levels
        .into_iter()
        .filter(|l| l.strength >= min_strength && l.touch_count > 0)
        .collect();
    ranked.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then(a.price.total_cmp(&b.price))
    });

    let mut support: Vec<PriceLevel> = Vec::new();
    let mut resistance: Vec<PriceLevel> = Vec::new();
    for level in ranked {
        let bucket = match level.kind {
            LevelKind::Support => &mut support,
            LevelKind::Resistance => &mut resistance,
        };
        let shadowed = bucket
            .iter()
            .any(|kept| (kept.price - level.price).abs() / kept.price <= suppression_tolerance);
        if !shadowed && bucket.len() < max_levels {
            bucket.push(level);
        }
    }
    (support, resistance)
}
