//! Analysis and computation configuration

use std::time::Duration;

/// Settings for local extremum detection
#[derive(Debug, Clone, Copy)]
pub struct ExtremaSettings {
    // Window radius: a bar must be the strict extreme of [i - order, i + order]
    pub order: usize,
}

/// Settings for density clustering of extrema
#[derive(Debug, Clone, Copy)]
pub struct ClusterSettings {
    // Fractional price tolerance (0.02 = 2%), measured as |p1 - p2| / p1
    pub eps: f64,
    // Minimum touches to form a cluster
    pub min_samples: usize,
}

/// Settings for the volume profile
#[derive(Debug, Clone, Copy)]
pub struct VolumeProfileSettings {
    pub bins: usize,
    // Bins in the top fraction of the volume distribution become high-volume nodes
    pub top_fraction: f64,
}

/// Settings for historical validation of candidate levels
#[derive(Debug, Clone, Copy)]
pub struct ValidationSettings {
    // A bar touches a level when its range comes within this fraction of the level price
    pub touch_tolerance: f64,
    // Bars after a touch in which a reaction must happen
    pub reaction_window_bars: usize,
    // Minimum move away from the level (fractional) to count as a reaction
    pub min_reaction_pct: f64,
    // Levels below this rate are kept but flagged unvalidated
    pub min_validation_rate: f64,
}

/// Settings for strength and breakout scoring
#[derive(Debug, Clone, Copy)]
pub struct StrengthSettings {
    pub touch_weight: f64,
    pub recency_weight: f64,
    pub reaction_weight: f64,
    pub proximity_weight: f64,
    pub weakness_weight: f64,
    pub direction_weight: f64,
    // touch_score = 1 - exp(-touches / touch_saturation)
    pub touch_saturation: f64,
    // recency_score halves every `recency_half_life_bars` since the last touch
    pub recency_half_life_bars: f64,
    // proximity_score = 1 / (1 + distance_pct / proximity_scale)
    pub proximity_scale: f64,
    // Bars used to measure the current price momentum
    pub momentum_bars: usize,
    // Momentum (fractional) at which the direction score is ~0.88
    pub direction_scale: f64,
}

/// Settings for validity projection and future level prediction
#[derive(Debug, Clone, Copy)]
pub struct ProjectionSettings {
    // Half-life of a level's strength, interpolated by strength between these bounds
    pub min_half_life_bars: f64,
    pub max_half_life_bars: f64,
    // A level stops being valid once its projected strength drops below this
    pub min_valid_strength: f64,
    pub fib_ratios: &'static [f64],
    // Window searched for the most recent significant swing
    pub swing_lookback_bars: usize,
    // Swings smaller than this (fractional, low to high) are not significant
    pub min_swing_pct: f64,
    // Round-number candidates emitted above and below the current price
    pub round_levels_per_side: usize,
    // Candidates further than this from the current price are discarded
    pub max_candidate_distance_pct: f64,
    // Hybrid blend: rule_weight * rule + model_weight * model
    pub rule_weight: f64,
    pub model_weight: f64,
    // Bars used for local volatility and trend features
    pub volatility_window: usize,
    // Historical levels within this fraction of a candidate count toward its density
    pub density_radius_pct: f64,
    // Predicted levels closer than this to an existing level are dropped
    pub dedupe_tolerance: f64,
}

/// Retry schedule for the data-loading collaborator
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

/// Orchestrator and cache settings
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    // Maximum per-symbol pipelines running at once in a batch
    pub max_concurrency: usize,
    pub load_timeout_ms: u64,
    pub retry: RetrySettings,
}

/// Defaults and bounds for the per-request parameters
#[derive(Debug, Clone, Copy)]
pub struct ParamDefaults {
    pub min_strength: f64,
    pub max_levels: usize,
    pub projection_periods: usize,
    pub max_projection_periods: usize,
    pub max_lookback_days: u32,
}

/// The Master Analysis Configuration
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    pub extrema: ExtremaSettings,
    pub clustering: ClusterSettings,
    pub volume_profile: VolumeProfileSettings,
    pub validation: ValidationSettings,
    pub strength: StrengthSettings,
    pub projection: ProjectionSettings,
    pub engine: EngineSettings,
    pub params: ParamDefaults,
}

impl EngineSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        ANALYSIS
    }
}

pub const ANALYSIS: AnalysisConfig = AnalysisConfig {
    extrema: ExtremaSettings { order: 5 },

    clustering: ClusterSettings {
        eps: 0.02,
        min_samples: 2,
    },

    volume_profile: VolumeProfileSettings {
        bins: 50,
        top_fraction: 0.40,
    },

    validation: ValidationSettings {
        touch_tolerance: 0.02,
        reaction_window_bars: 10,
        min_reaction_pct: 0.02,
        min_validation_rate: 0.60,
    },

    strength: StrengthSettings {
        touch_weight: 0.4,
        recency_weight: 0.3,
        reaction_weight: 0.3,
        proximity_weight: 0.4,
        weakness_weight: 0.3,
        direction_weight: 0.3,
        touch_saturation: 3.0,
        recency_half_life_bars: 50.0,
        proximity_scale: 0.02,
        momentum_bars: 5,
        direction_scale: 0.02,
    },

    projection: ProjectionSettings {
        min_half_life_bars: 20.0,
        max_half_life_bars: 200.0,
        min_valid_strength: 30.0,
        fib_ratios: &[0.236, 0.382, 0.5, 0.618, 0.786],
        swing_lookback_bars: 120,
        min_swing_pct: 0.05,
        round_levels_per_side: 2,
        max_candidate_distance_pct: 0.30,
        rule_weight: 0.4,
        model_weight: 0.6,
        volatility_window: 20,
        density_radius_pct: 0.05,
        dedupe_tolerance: 0.01,
    },

    engine: EngineSettings {
        cache_ttl_secs: 300,
        cache_capacity: 128,
        max_concurrency: 8,
        load_timeout_ms: 10_000,
        retry: RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 250,
            multiplier: 2.0,
            max_backoff_ms: 4_000,
        },
    },

    params: ParamDefaults {
        min_strength: 50.0,
        max_levels: 5,
        projection_periods: 20,
        max_projection_periods: 500,
        max_lookback_days: 3_650,
    },
};
