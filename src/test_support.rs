//! Synthetic series builders shared by unit tests.

use crate::domain::{Bar, SeriesKey, Timeframe};
use crate::models::OhlcvTimeSeries;
use crate::utils::TimeUtils;

pub const BAR_SPREAD: f64 = 0.005;

/// Daily bars with open == close and a ±0.5% range around each close.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> OhlcvTimeSeries {
    let bars: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                i as i64 * TimeUtils::MS_IN_D,
                c,
                c * (1.0 + BAR_SPREAD),
                c * (1.0 - BAR_SPREAD),
                c,
                1_000.0,
            )
        })
        .collect();
    OhlcvTimeSeries::from_bars(SeriesKey::new(symbol, Timeframe::Day1), &bars)
        .expect("synthetic bars are well formed")
}

/// Linear path from `from` to `to` over `steps` bars, excluding `from` itself.
pub fn ramp(from: f64, to: f64, steps: usize) -> Vec<f64> {
    (1..=steps)
        .map(|k| from + (to - from) * k as f64 / steps as f64)
        .collect()
}

/// Builds a close path from waypoints joined by linear ramps.
pub fn path(start: f64, legs: &[(f64, usize)]) -> Vec<f64> {
    let mut closes = vec![start];
    let mut last = start;
    for &(target, steps) in legs {
        closes.extend(ramp(last, target, steps));
        last = target;
    }
    closes
}

/// Clean double bottom at 100: two valleys within 1% of each other, each followed
/// by a rally of well over 3%, then a drift to 112.
pub fn double_bottom_series(symbol: &str) -> OhlcvTimeSeries {
    let closes = path(
        120.0,
        &[
            (100.0, 10), // first sell-off
            (115.0, 10), // rally
            (100.5, 10), // retest
            (116.0, 10), // rally
            (112.0, 6),
        ],
    );
    series_from_closes(symbol, &closes)
}

/// Fast impulse from 100 to 200 followed by a shallow pullback to 190. The impulse
/// leaves no traded history between its bars, so retracement prices stay clear of
/// historical levels.
pub fn fib_retracement_series(symbol: &str) -> OhlcvTimeSeries {
    let closes = path(100.0, &[(200.0, 4), (190.0, 10)]);
    series_from_closes(symbol, &closes)
}
