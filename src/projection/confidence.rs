//! Optional learned confidence for predicted levels.
//!
//! The model is chosen when the engine is built. `NullConfidenceModel` is the
//! default and always reports itself unavailable, which callers treat as the
//! normal rule-only configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ProjectionSettings;
use crate::error::{LevelError, Result};
use crate::projection::features::{CandidateFeatures, FEATURE_COUNT};
use crate::utils::maths_utils::sigmoid;

/// Scores a candidate from its engineered features.
pub trait ConfidenceModel: Send + Sync {
    /// Confidence in 0..=100
    fn score(&self, features: &CandidateFeatures) -> Result<f64>;

    fn name(&self) -> &str;
}

/// No trained model configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConfidenceModel;

impl ConfidenceModel for NullConfidenceModel {
    fn score(&self, _features: &CandidateFeatures) -> Result<f64> {
        Err(LevelError::ModelUnavailable(
            "no confidence model configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Feature standardisation fitted alongside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl ScalerParams {
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mean = self.mean.get(i).copied().unwrap_or(0.0);
                let scale = self.scale.get(i).copied().unwrap_or(1.0);
                if scale.abs() > f64::EPSILON {
                    (f - mean) / scale
                } else {
                    f - mean
                }
            })
            .collect()
    }
}

/// Logistic regression over `FEATURE_NAMES`: `100 * sigmoid(w . x + b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfidenceModel {
    #[serde(default = "default_model_name")]
    pub name: String,
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub scaler: Option<ScalerParams>,
}

fn default_model_name() -> String {
    "logistic".to_string()
}

impl LogisticConfidenceModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self> {
        let model = Self {
            name: default_model_name(),
            weights,
            bias,
            scaler: None,
        };
        model.check_shape()?;
        Ok(model)
    }

    pub fn with_scaler(mut self, scaler: ScalerParams) -> Self {
        self.scaler = Some(scaler);
        self
    }

    /// Load weights exported by the training job.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let model: LogisticConfidenceModel = serde_json::from_str(content)?;
        model.check_shape()?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<()> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(LevelError::Decode(format!(
                "model expects {} weights, found {}",
                FEATURE_COUNT,
                self.weights.len()
            )));
        }
        Ok(())
    }
}

impl ConfidenceModel for LogisticConfidenceModel {
    fn score(&self, features: &CandidateFeatures) -> Result<f64> {
        let raw = features.to_vector();
        let inputs = match &self.scaler {
            Some(scaler) => scaler.transform(&raw),
            None => raw.to_vec(),
        };
        let logit: f64 = self
            .weights
            .iter()
            .zip(&inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        if !logit.is_finite() {
            return Err(LevelError::Internal(format!(
                "{} produced a non-finite logit",
                self.name
            )));
        }
        Ok(100.0 * sigmoid(logit))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `rule_weight * rule + model_weight * model`, normalised by the weight sum and clamped.
pub fn blend_confidence(rule_confidence: f64, model_confidence: f64, settings: &ProjectionSettings) -> f64 {
    let total = settings.rule_weight + settings.model_weight;
    if total <= 0.0 {
        return rule_confidence.clamp(0.0, 100.0);
    }
    ((settings.rule_weight * rule_confidence + settings.model_weight * model_confidence) / total)
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ANALYSIS;

    fn features() -> CandidateFeatures {
        CandidateFeatures {
            normalized_distance: -0.05,
            source_fibonacci: 1.0,
            source_round_number: 0.0,
            source_spacing_pattern: 0.0,
            volatility: 0.02,
            volume_percentile: 0.8,
            level_density: 0.25,
            trend_direction: 0.3,
        }
    }

    #[test]
    fn test_null_model_is_unavailable() {
        assert!(matches!(
            NullConfidenceModel.score(&features()),
            Err(LevelError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_logistic_model_scores_in_range() {
        let model = LogisticConfidenceModel::new(vec![0.0; FEATURE_COUNT], 0.0).unwrap();
        assert!((model.score(&features()).unwrap() - 50.0).abs() < 1e-9);

        let mut weights = vec![0.0; FEATURE_COUNT];
        weights[1] = 4.0; // favour fibonacci candidates
        let model = LogisticConfidenceModel::new(weights, 0.0).unwrap();
        let score = model.score(&features()).unwrap();
        assert!(score > 90.0 && score <= 100.0);
    }

    #[test]
    fn test_scaler_centres_inputs() {
        let mut weights = vec![0.0; FEATURE_COUNT];
        weights[1] = 4.0;
        let mut mean = vec![0.0; FEATURE_COUNT];
        mean[1] = 1.0;
        let model = LogisticConfidenceModel::new(weights, 0.0)
            .unwrap()
            .with_scaler(ScalerParams {
                mean,
                scale: vec![1.0; FEATURE_COUNT],
            });
        // The fibonacci flag sits exactly on its mean, so the logit is zero
        assert!((model.score(&features()).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_from_json_checks_shape() {
        let json = r#"{"weights": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8], "bias": -1.0,
                       "scaler": {"mean": [0,0,0,0,0,0,0,0], "scale": [1,1,1,1,1,1,1,1]}}"#;
        let model = LogisticConfidenceModel::from_json_str(json).unwrap();
        assert_eq!(model.name(), "logistic");
        assert!(model.scaler.is_some());

        let short = r#"{"weights": [0.1, 0.2], "bias": 0.0}"#;
        assert!(matches!(
            LogisticConfidenceModel::from_json_str(short),
            Err(LevelError::Decode(_))
        ));
    }

    #[test]
    fn test_blend_uses_configured_weights() {
        let settings = ANALYSIS.projection;
        assert!((blend_confidence(50.0, 100.0, &settings) - 80.0).abs() < 1e-9);

        let mut rule_only = settings;
        rule_only.model_weight = 0.0;
        assert!((blend_confidence(50.0, 100.0, &rule_only) - 50.0).abs() < 1e-9);
    }
}
