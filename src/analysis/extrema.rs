//! Local peak / valley detection.
//!
//! A bar is a peak when its high is strictly greater than every other high in
//! `[i - order, i + order]`, and a valley when its low is strictly lower than
//! every other low in that window. Bars within `order` of either end of the
//! series have an incomplete window and are never reported.

use crate::models::{ExtremumKind, ExtremumPoint, OhlcvTimeSeries};

/// Minimum series length for which any extremum can exist
pub fn min_bars_for_order(order: usize) -> usize {
    2 * order + 1
}

/// Detect peaks and valleys, sorted by bar index (peaks before valleys on the same bar).
///
/// Returns an empty vector for series shorter than `2 * order + 1` or for `order == 0`.
pub fn detect_extrema(series: &OhlcvTimeSeries, order: usize) -> Vec<ExtremumPoint> {
    if order == 0 || series.len() < min_bars_for_order(order) {
        return Vec::new();
    }

    let mut points = Vec::new();
    for i in order..series.len() - order {
        if is_strict_extreme(&series.high_prices, i, order, |centre, other| centre > other) {
            points.push(ExtremumPoint {
                index: i,
                price: series.high_prices[i],
                kind: ExtremumKind::Peak,
            });
        }
        if is_strict_extreme(&series.low_prices, i, order, |centre, other| centre < other) {
            points.push(ExtremumPoint {
                index: i,
                price: series.low_prices[i],
                kind: ExtremumKind::Valley,
            });
        }
    }
    points
}

/// Split detected points by kind: (peaks, valleys)
pub fn split_by_kind(points: &[ExtremumPoint]) -> (Vec<ExtremumPoint>, Vec<ExtremumPoint>) {
    points.iter().partition(|p| p.kind == ExtremumKind::Peak)
}

fn is_strict_extreme(values: &[f64], i: usize, order: usize, beats: impl Fn(f64, f64) -> bool) -> bool {
    let centre = values[i];
    (i - order..=i + order)
        .filter(|&j| j != i)
        .all(|j| beats(centre, values[j]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_from_closes;

    #[test]
    fn test_short_series_returns_empty() {
        let series = series_from_closes("X", &[1.0, 2.0, 3.0, 2.0]);
        assert!(detect_extrema(&series, 2).is_empty());
        assert!(detect_extrema(&series, 0).is_empty());
    }

    #[test]
    fn test_single_peak_and_valley() {
        let closes = [10.0, 11.0, 12.0, 15.0, 12.0, 11.0, 10.0, 8.0, 10.0, 11.0, 12.0];
        let series = series_from_closes("X", &closes);
        let points = detect_extrema(&series, 2);
        let (peaks, valleys) = split_by_kind(&points);

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 3);
        assert_eq!(peaks[0].price, series.high_prices[3]);
        assert_eq!(valleys.len(), 1);
        assert_eq!(valleys[0].index, 7);
        assert_eq!(valleys[0].price, series.low_prices[7]);
    }

    #[test]
    fn test_edges_excluded() {
        // Global max sits on the first bar: insufficient neighbourhood
        let closes = [20.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0];
        let series = series_from_closes("X", &closes);
        let points = detect_extrema(&series, 2);
        assert!(points.iter().all(|p| p.index >= 2 && p.index < closes.len() - 2));
    }

    #[test]
    fn test_flat_series_has_no_extrema() {
        let series = series_from_closes("X", &[100.0; 40]);
        assert!(detect_extrema(&series, 3).is_empty());
    }

    #[test]
    fn test_equal_highs_are_not_strict_peaks() {
        let closes = [10.0, 11.0, 14.0, 14.0, 11.0, 10.0];
        let series = series_from_closes("X", &closes);
        let points = detect_extrema(&series, 1);
        assert!(points.iter().all(|p| p.kind != ExtremumKind::Peak));
    }

    #[test]
    fn test_local_extremum_invariant() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + 10.0 * ((i as f64) * 0.3).sin() + (i % 7) as f64 * 0.2)
            .collect();
        let series = series_from_closes("X", &closes);
        let order = 4;
        for p in detect_extrema(&series, order) {
            for j in p.index - order..=p.index + order {
                if j == p.index {
                    continue;
                }
                match p.kind {
                    ExtremumKind::Peak => assert!(series.high_prices[j] < p.price),
                    ExtremumKind::Valley => assert!(series.low_prices[j] > p.price),
                }
            }
        }
    }
}
