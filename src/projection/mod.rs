//! Forward-looking extensions of a scored level set: decay-based validity and
//! rule-generated future levels with optional learned confidence.

pub mod confidence;
pub mod features;
pub mod rules;
pub mod validity;

pub use confidence::{ConfidenceModel, LogisticConfidenceModel, NullConfidenceModel, ScalerParams};
pub use features::{CandidateFeatures, FeatureContext};
pub use rules::RuleCandidate;
pub use validity::apply_projections;

use crate::analysis::volume_profile::VolumeProfile;
use crate::config::ProjectionSettings;
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::models::{LevelKind, OhlcvTimeSeries, PredictedLevel, PredictionSource, PriceLevel};
use crate::utils::maths_utils::relative_distance;

/// Predicted levels plus whether a model contributed to any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionOutcome {
    pub levels: Vec<PredictedLevel>,
    pub model_used: bool,
}

/// Generate, filter and score future level candidates.
///
/// Candidates too far from the current price, or within `dedupe_tolerance` of a
/// historical level or of a more confident candidate, are discarded. When the model
/// cannot score a candidate the rule confidence stands on its own.
pub fn predict_future_levels(
    series: &OhlcvTimeSeries,
    historical: &[PriceLevel],
    profile: Option<&VolumeProfile>,
    model: &dyn ConfidenceModel,
    horizon_cap: usize,
    settings: &ProjectionSettings,
) -> PredictionOutcome {
    let Some(current_price) = series.last_close() else {
        return PredictionOutcome::default();
    };

    let historical_prices: Vec<f64> = historical.iter().map(|l| l.price).collect();
    let validated_prices: Vec<f64> = historical
        .iter()
        .filter(|l| l.is_validated)
        .map(|l| l.price)
        .collect();

    let mut candidates: Vec<RuleCandidate> = rules::fibonacci_levels(series, settings);
    candidates.extend(rules::round_number_levels(current_price, settings.round_levels_per_side));
    candidates.extend(rules::spacing_levels(&validated_prices));

    candidates.retain(|c| {
        c.price > 0.0
            && relative_distance(current_price, c.price) <= settings.max_candidate_distance_pct
            && !historical_prices
                .iter()
                .any(|&h| relative_distance(h, c.price) <= settings.dedupe_tolerance)
    });

    // Most confident first so near-duplicates resolve in its favour
    candidates.sort_by(|a, b| {
        b.rule_confidence
            .total_cmp(&a.rule_confidence)
            .then(a.price.total_cmp(&b.price))
    });
    let mut kept: Vec<RuleCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !kept
            .iter()
            .any(|k| relative_distance(k.price, candidate.price) <= settings.dedupe_tolerance)
        {
            kept.push(candidate);
        }
    }

    let context = FeatureContext::new(series, profile, historical_prices, settings);
    let mut model_used = false;
    let mut fallback_logged = false;

    let mut levels: Vec<PredictedLevel> = kept
        .into_iter()
        .map(|candidate| {
            let features = context.features_for(candidate.price, candidate.source);
            let model_confidence = match model.score(&features) {
                Ok(score) => Some(score.clamp(0.0, 100.0)),
                Err(e) => {
                    if !fallback_logged {
                        log::debug!(
                            "{}: rule-based confidence only ({}: {})",
                            series.key,
                            model.name(),
                            e
                        );
                        fallback_logged = true;
                    }
                    None
                }
            };
            model_used |= model_confidence.is_some();

            let rule_confidence = candidate.rule_confidence.clamp(0.0, 100.0);
            let (hybrid_confidence, prediction_source) = match model_confidence {
                Some(m) => (
                    confidence::blend_confidence(rule_confidence, m, settings),
                    PredictionSource::Hybrid,
                ),
                None => (rule_confidence, PredictionSource::RuleBased),
            };

            PredictedLevel {
                price: candidate.price,
                kind: LevelKind::relative_to(candidate.price, current_price),
                source: candidate.source,
                label: candidate.label,
                rule_confidence,
                model_confidence,
                hybrid_confidence,
                prediction_source,
                horizon_periods: context.horizon_periods(candidate.price, horizon_cap),
            }
        })
        .collect();

    levels.sort_by(|a, b| a.price.total_cmp(&b.price));

    #[cfg(debug_assertions)]
    if DEBUG_FLAGS.print_projection_details {
        for level in &levels {
            log::info!(
                "{} predicted {} {} @ {:.4}: rule {:.1}, model {:?}, hybrid {:.1}, ~{} bars",
                series.key,
                level.label,
                level.kind,
                level.price,
                level.rule_confidence,
                level.model_confidence,
                level.hybrid_confidence,
                level.horizon_periods
            );
        }
    }

    PredictionOutcome { levels, model_used }
}
