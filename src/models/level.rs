use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::prediction::PredictedLevel;

/// Kind of local extremum
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremumKind {
    Peak,
    Valley,
}

/// A local peak (on highs) or valley (on lows) found by the extrema detector.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ExtremumPoint {
    pub index: usize,
    pub price: f64,
    pub kind: ExtremumKind,
}

/// Extrema of one kind sharing a price neighbourhood.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelCluster {
    pub kind: ExtremumKind,
    pub members: Vec<ExtremumPoint>,
    /// Mean price of the members
    pub centroid: f64,
    pub first_index: usize,
    pub last_index: usize,
}

impl LevelCluster {
    pub fn from_members(kind: ExtremumKind, members: Vec<ExtremumPoint>) -> Option<Self> {
        if members.is_empty() {
            return None;
        }
        let centroid = members.iter().map(|p| p.price).sum::<f64>() / members.len() as f64;
        let first_index = members.iter().map(|p| p.index).min()?;
        let last_index = members.iter().map(|p| p.index).max()?;
        Some(Self {
            kind,
            members,
            centroid,
            first_index,
            last_index,
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn level_kind(&self) -> LevelKind {
        LevelKind::from(self.kind)
    }
}

/// Support or resistance
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
}

impl From<ExtremumKind> for LevelKind {
    fn from(kind: ExtremumKind) -> Self {
        match kind {
            ExtremumKind::Valley => LevelKind::Support,
            ExtremumKind::Peak => LevelKind::Resistance,
        }
    }
}

impl LevelKind {
    /// Kind implied by a price's position relative to the current price.
    pub fn relative_to(price: f64, current_price: f64) -> Self {
        if price <= current_price {
            LevelKind::Support
        } else {
            LevelKind::Resistance
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LevelKind::Support => write!(f, "support"),
            LevelKind::Resistance => write!(f, "resistance"),
        }
    }
}

/// Where a candidate level came from
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOrigin {
    /// Clustered extrema (volume-confirmed or not)
    PriceCluster,
    /// High-volume node with no matching price cluster
    VolumeNode,
}

/// Projection fields appended to a scored level. Never feeds back into the scored core.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct LevelProjection {
    pub horizon_periods: usize,
    /// Strength evaluated `horizon_periods` ahead under the decay model
    pub projected_strength: f64,
    /// 0..=100
    pub projected_validity_probability: f64,
    /// Timestamp at which projected strength crosses the minimum-validity threshold
    pub projected_valid_until_ms: i64,
    pub half_life_bars: f64,
}

/// A validated and scored support/resistance level.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceLevel {
    pub price: f64,
    pub kind: LevelKind,
    pub origin: LevelOrigin,
    pub touch_count: usize,
    /// Fraction (0..=1) of touches followed by a qualifying reaction
    pub validation_rate: f64,
    pub is_validated: bool,
    /// 0..=100
    pub strength: f64,
    /// 0..=100
    pub breakout_probability: f64,
    pub volume: f64,
    /// 0..=100
    pub volume_percentile: f64,
    pub has_volume_confirmation: bool,
    pub first_touch_ms: i64,
    pub last_touch_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<LevelProjection>,
}

impl PriceLevel {
    pub fn distance_to(&self, price: f64) -> f64 {
        (self.price - price).abs()
    }
}

/// Closed set of level records for consumers wanting one merged view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Level {
    Historical(PriceLevel),
    Predicted(PredictedLevel),
}

impl Level {
    pub fn price(&self) -> f64 {
        match self {
            Level::Historical(level) => level.price,
            Level::Predicted(level) => level.price,
        }
    }

    pub fn kind(&self) -> LevelKind {
        match self {
            Level::Historical(level) => level.kind,
            Level::Predicted(level) => level.kind,
        }
    }

    /// Strength for historical levels, hybrid confidence for predicted ones
    pub fn score(&self) -> f64 {
        match self {
            Level::Historical(level) => level.strength,
            Level::Predicted(level) => level.hybrid_confidence,
        }
    }
}
