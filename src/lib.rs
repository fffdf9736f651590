#![allow(clippy::type_complexity)]

// Core modules
pub mod analysis;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod models;
pub mod projection;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

// Re-export commonly used types
pub use analysis::run_pipeline;
pub use config::{ANALYSIS, AnalysisConfig};
pub use data::{BarSource, FallbackSource, FileSource, InMemorySource, SeriesFile};
pub use domain::{Bar, SeriesKey, Timeframe};
pub use engine::{BatchReport, CancellationFlag, LevelCache, LevelEngine, RetryPolicy};
pub use error::{LevelError, Result};
pub use models::{
    AnalysisParams, Level, LevelAnalysis, LevelKind, OhlcvTimeSeries, PredictedLevel, PriceLevel,
};
pub use projection::{ConfidenceModel, LogisticConfidenceModel, NullConfidenceModel};

// CLI argument parsing
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Support and resistance levels from OHLCV series", long_about = None)]
pub struct Cli {
    /// Directory holding <SYMBOL>_<timeframe>.bin or .json series files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Comma-separated symbols, e.g. BTCUSDT,ETHUSDT
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    #[arg(long, default_value = "1d")]
    pub timeframe: Timeframe,

    /// Levels weaker than this (0-100) are left out
    #[arg(long, default_value_t = ANALYSIS.params.min_strength)]
    pub min_strength: f64,

    /// Maximum levels per kind
    #[arg(long, default_value_t = ANALYSIS.params.max_levels)]
    pub max_levels: usize,

    /// Add validity projections and predicted future levels
    #[arg(long, default_value_t = false)]
    pub project_future: bool,

    #[arg(long, default_value_t = ANALYSIS.params.projection_periods)]
    pub projection_periods: usize,

    /// Override the timeframe's default history window
    #[arg(long)]
    pub lookback_days: Option<u32>,

    /// Logistic confidence model weights (JSON)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Symbols analyzed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

impl Cli {
    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            min_strength: self.min_strength,
            max_levels: self.max_levels,
            timeframe: self.timeframe,
            project_future: self.project_future,
            projection_periods: self.projection_periods,
            lookback_days: self.lookback_days,
        }
    }
}

/// Build an engine over the data directory and analyze every requested symbol.
/// This is the public API for the binary to call
pub async fn run_cli(cli: &Cli) -> anyhow::Result<BatchReport> {
    let params = cli.params();
    params
        .validate(&ANALYSIS.params)
        .context("Invalid analysis parameters")?;

    let mut engine = LevelEngine::new(Arc::new(FileSource::new(cli.data_dir.clone())));
    if let Some(path) = &cli.model {
        let model = LogisticConfidenceModel::from_json_file(path)
            .with_context(|| format!("Failed to load confidence model: {}", path.display()))?;
        log::info!("Using confidence model '{}'", model.name);
        engine = engine.with_model(Arc::new(model));
    }
    if let Some(concurrency) = cli.concurrency {
        engine = engine.with_max_concurrency(concurrency);
    }

    Ok(engine
        .analyze_batch(&cli.symbols, &params, &CancellationFlag::new())
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_symbol_list_and_params() {
        let cli = Cli::try_parse_from([
            "level-scope",
            "--symbols",
            "BTCUSDT,ETHUSDT",
            "--timeframe",
            "4h",
            "--project-future",
            "--lookback-days",
            "90",
        ])
        .unwrap();

        assert_eq!(cli.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        let params = cli.params();
        assert_eq!(params.timeframe, Timeframe::Hour4);
        assert!(params.project_future);
        assert_eq!(params.lookback_days, Some(90));
        assert_eq!(params.min_strength, 50.0);
        assert_eq!(params.max_levels, 5);
    }

    #[test]
    fn test_cli_rejects_unknown_timeframe() {
        assert!(Cli::try_parse_from(["level-scope", "--symbols", "X", "--timeframe", "2h"]).is_err());
        assert!(Cli::try_parse_from(["level-scope"]).is_err());
    }

    #[tokio::test]
    async fn test_run_cli_over_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let series = test_support::double_bottom_series("BTCUSDT");
        FileSource::new(dir.path()).store(&series).await.unwrap();

        let cli = Cli::try_parse_from([
            "level-scope",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--symbols",
            "BTCUSDT,MISSING",
        ])
        .unwrap();
        let report = run_cli(&cli).await.unwrap();

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        let json = report.to_json().unwrap();
        assert!(json["BTCUSDT"]["support_levels"].is_array());
        assert!(json["MISSING"]["error"].is_string());
    }
}
