//! The per-series level pipeline:
//! series -> extrema -> clusters (+ volume nodes) -> validated -> scored -> projected.
//!
//! Pure over its inputs; the engine runs it on a blocking thread.

use crate::analysis::clustering::cluster_extrema;
use crate::analysis::extrema::{detect_extrema, min_bars_for_order, split_by_kind};
use crate::analysis::strength::{score_levels, select_levels};
use crate::analysis::validation::validate_candidates;
use crate::analysis::volume_profile::{VolumeProfile, merge_candidates};
use crate::config::AnalysisConfig;
use crate::error::LevelError;
use crate::models::{
    AnalysisMetadata, AnalysisParams, LevelAnalysis, LevelSummary, OhlcvTimeSeries,
};
use crate::projection::{ConfidenceModel, apply_projections, predict_future_levels};
use crate::utils::time_utils::span_days;

/// Run every stage over `series`. Never fails: short series yield an empty result
/// flagged `insufficient_data`.
pub fn run_pipeline(
    series: &OhlcvTimeSeries,
    params: &AnalysisParams,
    config: &AnalysisConfig,
    model: &dyn ConfidenceModel,
) -> LevelAnalysis {
    let trimmed;
    let series = match params.lookback_days {
        Some(days) => {
            trimmed = series.with_lookback_days(days);
            &trimmed
        }
        None => series,
    };

    let symbol = series.key.symbol.as_str();
    let current_price = series.last_close().unwrap_or(0.0);
    let mut metadata = base_metadata(series);

    let required = min_bars_for_order(config.extrema.order);
    if series.len() < required {
        let reason = LevelError::InsufficientData {
            required,
            got: series.len(),
        };
        log::warn!("{}: {}. Returning no levels.", series.key, reason);
        metadata.insufficient_data = true;
        return LevelAnalysis::empty(symbol, current_price, metadata);
    }

    let extrema = detect_extrema(series, config.extrema.order);
    let (peaks, valleys) = split_by_kind(&extrema);
    metadata.peaks_detected = peaks.len();
    metadata.valleys_detected = valleys.len();

    let clusters = cluster_extrema(
        &extrema,
        config.clustering.eps,
        config.clustering.min_samples,
    );
    metadata.clusters_formed = clusters.len();

    let profile = VolumeProfile::build(series, config.volume_profile.bins);
    let nodes = profile
        .as_ref()
        .map(|p| p.high_volume_nodes(config.volume_profile.top_fraction))
        .unwrap_or_default();
    metadata.volume_nodes = nodes.len();

    let candidates = merge_candidates(
        &clusters,
        &nodes,
        profile.as_ref(),
        config.clustering.eps,
        current_price,
    );
    metadata.candidates_evaluated = candidates.len();

    let validation = validate_candidates(series, &candidates, &config.validation);
    metadata.levels_validated = validation.validated_count();
    metadata.levels_flagged_unvalidated = validation.flagged_count();
    metadata.levels_dropped_no_touches = validation.dropped_no_touches;

    let scored = score_levels(series, &validation.levels, &config.strength);
    let (mut support_levels, mut resistance_levels) = select_levels(
        scored,
        params.min_strength,
        params.max_levels,
        config.clustering.eps,
    );

    let predicted_future_levels = if params.project_future {
        apply_projections(
            &mut support_levels,
            series,
            params.projection_periods,
            &config.projection,
        );
        apply_projections(
            &mut resistance_levels,
            series,
            params.projection_periods,
            &config.projection,
        );

        let historical: Vec<_> = support_levels
            .iter()
            .chain(resistance_levels.iter())
            .cloned()
            .collect();
        let outcome = predict_future_levels(
            series,
            &historical,
            profile.as_ref(),
            model,
            params.projection_periods,
            &config.projection,
        );
        metadata.model_used = outcome.model_used;
        Some(outcome.levels)
    } else {
        None
    };

    LevelAnalysis {
        symbol: symbol.to_string(),
        summary: LevelSummary::from_levels(&support_levels, &resistance_levels, current_price),
        support_levels,
        resistance_levels,
        predicted_future_levels,
        metadata,
    }
}

fn base_metadata(series: &OhlcvTimeSeries) -> AnalysisMetadata {
    let data_start_ms = series.first_timestamp_ms();
    let data_end_ms = series.last_timestamp_ms();
    AnalysisMetadata {
        timeframe: Some(series.key.timeframe),
        bar_count: series.len(),
        data_start_ms,
        data_end_ms,
        span_days: match (data_start_ms, data_end_ms) {
            (Some(start), Some(end)) => span_days(start, end),
            _ => 0.0,
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ANALYSIS;
    use crate::models::{LevelKind, LevelSource, PredictionSource};
    use crate::projection::NullConfidenceModel;
    use crate::test_support::{
        double_bottom_series, fib_retracement_series, path, series_from_closes,
    };

    fn run(series: &OhlcvTimeSeries, params: &AnalysisParams) -> LevelAnalysis {
        run_pipeline(series, params, &ANALYSIS, &NullConfidenceModel)
    }

    #[test]
    fn test_double_bottom_yields_one_support_near_100() {
        let series = double_bottom_series("DBL");
        let analysis = run(&series, &AnalysisParams::default());

        let near_100: Vec<_> = analysis
            .support_levels
            .iter()
            .filter(|l| (l.price - 100.0).abs() / 100.0 <= 0.015)
            .collect();
        assert_eq!(near_100.len(), 1);
        let level = near_100[0];
        assert_eq!(level.kind, LevelKind::Support);
        assert_eq!(level.touch_count, 2);
        assert_eq!(level.validation_rate, 1.0);
        assert!(level.is_validated);
        assert_eq!(analysis.summary.current_price, 112.0);
        assert!(analysis.summary.nearest_support.is_some());
        assert_eq!(analysis.metadata.valleys_detected, 2);
        assert!(analysis.predicted_future_levels.is_none());
    }

    #[test]
    fn test_flat_series_yields_no_levels() {
        let series = series_from_closes("FLAT", &[100.0; 60]);
        let analysis = run(&series, &AnalysisParams::default());

        assert_eq!(analysis.summary.total_levels, 0);
        assert!(analysis.support_levels.is_empty());
        assert!(analysis.resistance_levels.is_empty());
        assert_eq!(analysis.metadata.peaks_detected + analysis.metadata.valleys_detected, 0);
        assert!(!analysis.metadata.insufficient_data);
    }

    #[test]
    fn test_short_series_is_flagged_not_failed() {
        let series = series_from_closes("SHORT", &[100.0, 101.0, 102.0]);
        let analysis = run(&series, &AnalysisParams::default());
        assert!(analysis.metadata.insufficient_data);
        assert_eq!(analysis.summary.total_levels, 0);
        assert_eq!(analysis.metadata.bar_count, 3);
    }

    #[test]
    fn test_fibonacci_projection_rule_based() {
        let series = fib_retracement_series("FIB");
        let params = AnalysisParams::default().with_projection(20);
        let analysis = run(&series, &params);

        let predicted = analysis.predicted_future_levels.as_ref().unwrap();
        let golden = predicted.iter().find(|l| l.label == "fib_0.618").unwrap();
        assert_eq!(golden.source, LevelSource::Fibonacci);
        assert!((0.0..=100.0).contains(&golden.hybrid_confidence));
        assert_eq!(golden.prediction_source, PredictionSource::RuleBased);
        assert_eq!(golden.hybrid_confidence, golden.rule_confidence);
        assert!(!analysis.metadata.model_used);
        assert!(analysis.levels().all(|l| l.projection.is_some()));
    }

    #[test]
    fn test_output_invariants() {
        let closes: Vec<f64> = (0..400)
            .map(|i| {
                let t = i as f64;
                100.0 + 12.0 * (t * 0.11).sin() + 5.0 * (t * 0.037).cos() + (i % 5) as f64 * 0.3
            })
            .collect();
        let series = series_from_closes("WAVE", &closes);
        let params = AnalysisParams {
            min_strength: 0.0,
            max_levels: 20,
            ..AnalysisParams::default().with_projection(30)
        };
        let analysis = run(&series, &params);

        assert!(analysis.summary.total_levels > 0);
        for level in analysis.levels() {
            assert!((0.0..=100.0).contains(&level.strength));
            assert!((0.0..=100.0).contains(&level.breakout_probability));
            assert!((0.0..=100.0).contains(&level.volume_percentile));
            assert!(level.touch_count > 0);
            assert!(level.first_touch_ms <= level.last_touch_ms);
            let projection = level.projection.unwrap();
            assert!(projection.projected_strength <= level.strength);
        }
        assert!(analysis.support_levels.len() <= 20);
        assert!(
            analysis
                .support_levels
                .windows(2)
                .all(|w| w[0].strength >= w[1].strength)
        );
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let closes = path(
            50.0,
            &[(60.0, 12), (52.0, 9), (61.0, 11), (51.5, 10), (58.0, 8), (52.5, 9), (57.0, 7)],
        );
        let series = series_from_closes("DET", &closes);
        let params = AnalysisParams::default().with_projection(15);
        assert_eq!(run(&series, &params), run(&series, &params));
    }

    #[test]
    fn test_min_strength_and_cap_respected() {
        let series = double_bottom_series("CAP");
        let params = AnalysisParams {
            min_strength: 0.0,
            max_levels: 1,
            ..AnalysisParams::default()
        };
        let analysis = run(&series, &params);
        assert!(analysis.support_levels.len() <= 1);
        assert!(analysis.resistance_levels.len() <= 1);

        let strict = AnalysisParams {
            min_strength: 100.0,
            ..AnalysisParams::default()
        };
        assert_eq!(run(&series, &strict).summary.total_levels, 0);
    }
}
