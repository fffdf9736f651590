use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};

use crate::error::LevelError;
use crate::models::LevelAnalysis;

/// Cooperative cancellation for a batch. Work already started runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-symbol outcome of a batch, keyed by symbol regardless of completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: BTreeMap<String, Result<Arc<LevelAnalysis>, LevelError>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&String, &Arc<LevelAnalysis>)> {
        self.results
            .iter()
            .filter_map(|(symbol, result)| result.as_ref().ok().map(|a| (symbol, a)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&String, &LevelError)> {
        self.results
            .iter()
            .filter_map(|(symbol, result)| result.as_ref().err().map(|e| (symbol, e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn get(&self, symbol: &str) -> Option<&Result<Arc<LevelAnalysis>, LevelError>> {
        self.results.get(symbol)
    }

    /// `{symbol: analysis}` for successes and `{symbol: {"error": message}}` for failures.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        let mut map = serde_json::Map::new();
        for (symbol, result) in &self.results {
            let value = match result {
                Ok(analysis) => serde_json::to_value(analysis.as_ref())?,
                Err(e) => json!({ "error": e.to_string() }),
            };
            map.insert(symbol.clone(), value);
        }
        Ok(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisMetadata;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_cancelled());
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_report_json_mixes_results_and_errors() {
        let mut report = BatchReport::default();
        report.results.insert(
            "BTCUSDT".to_string(),
            Ok(Arc::new(LevelAnalysis::empty(
                "BTCUSDT",
                100.0,
                AnalysisMetadata::default(),
            ))),
        );
        report.results.insert(
            "ETHUSDT".to_string(),
            Err(LevelError::Cancelled("ETHUSDT".to_string())),
        );

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        let json = report.to_json().unwrap();
        assert_eq!(json["BTCUSDT"]["symbol"], "BTCUSDT");
        assert!(json["BTCUSDT"].get("predicted_future_levels").is_none());
        assert!(
            json["ETHUSDT"]["error"]
                .as_str()
                .unwrap()
                .contains("cancelled")
        );
    }
}
