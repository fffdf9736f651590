//! Decay model for how long a scored level stays relevant.
//!
//! A level's strength decays exponentially with a half-life interpolated from its
//! strength (stronger levels decay slower), shortened further the longer the level
//! has gone untouched. Projection appends fields; the scored core is never changed.

use crate::config::ProjectionSettings;
use crate::models::{LevelProjection, OhlcvTimeSeries, PriceLevel};

/// Half-life in bars for a level of `strength` untouched for `bars_since_last_touch`.
pub fn half_life_bars(strength: f64, bars_since_last_touch: usize, settings: &ProjectionSettings) -> f64 {
    let base = settings.min_half_life_bars
        + (settings.max_half_life_bars - settings.min_half_life_bars)
            * (strength.clamp(0.0, 100.0) / 100.0);
    let staleness = 1.0 + bars_since_last_touch as f64 / settings.max_half_life_bars.max(1.0);
    (base / staleness).max(1.0)
}

/// Strength remaining `periods` bars ahead.
pub fn decayed_strength(strength: f64, half_life: f64, periods: usize) -> f64 {
    (strength * 0.5f64.powf(periods as f64 / half_life)).clamp(0.0, 100.0)
}

/// Bars until strength decays to `threshold`; zero when it already sits at or below it.
pub fn periods_until_threshold(strength: f64, half_life: f64, threshold: f64) -> usize {
    if threshold <= 0.0 {
        return usize::MAX;
    }
    if strength <= threshold {
        return 0;
    }
    (half_life * (strength / threshold).log2()).ceil() as usize
}

pub fn project_level(
    level: &PriceLevel,
    bars_since_last_touch: usize,
    last_timestamp_ms: i64,
    interval_ms: i64,
    horizon_periods: usize,
    settings: &ProjectionSettings,
) -> LevelProjection {
    let half_life = half_life_bars(level.strength, bars_since_last_touch, settings);
    let projected_strength = decayed_strength(level.strength, half_life, horizon_periods);

    // A level likely to break is less likely to still hold at the horizon
    let survival = 1.0 - 0.5 * level.breakout_probability.clamp(0.0, 100.0) / 100.0;
    let projected_validity_probability = (projected_strength * survival).clamp(0.0, 100.0);

    let periods_valid =
        periods_until_threshold(level.strength, half_life, settings.min_valid_strength);
    let periods_valid = i64::try_from(periods_valid).unwrap_or(i64::MAX);
    let projected_valid_until_ms =
        last_timestamp_ms.saturating_add(periods_valid.saturating_mul(interval_ms));

    LevelProjection {
        horizon_periods,
        projected_strength,
        projected_validity_probability,
        projected_valid_until_ms,
        half_life_bars: half_life,
    }
}

/// Attach a projection to every level, measured from the series' last bar.
pub fn apply_projections(
    levels: &mut [PriceLevel],
    series: &OhlcvTimeSeries,
    horizon_periods: usize,
    settings: &ProjectionSettings,
) {
    let Some(last_timestamp_ms) = series.last_timestamp_ms() else {
        return;
    };
    let interval_ms = series.key.timeframe.interval_ms();

    for level in levels.iter_mut() {
        let bars_since_last_touch = series
            .index_of_timestamp(level.last_touch_ms)
            .map_or(0, |idx| series.len() - 1 - idx);
        level.projection = Some(project_level(
            level,
            bars_since_last_touch,
            last_timestamp_ms,
            interval_ms,
            horizon_periods,
            settings,
        ));
    }
}
