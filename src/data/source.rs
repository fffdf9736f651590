use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::SeriesKey;
use crate::error::{LevelError, Result};
use crate::models::OhlcvTimeSeries;

/// Supplies bar series to the engine. Where the bars come from is the source's concern.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Load the most recent `lookback_days` of history for `key`.
    async fn load(&self, key: &SeriesKey, lookback_days: u32) -> Result<OhlcvTimeSeries>;

    /// A unique identifier for this implementation (so that afterwards we know which one we used).
    fn signature(&self) -> &'static str;
}

/// Series held in memory, keyed by symbol and timeframe.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    series: HashMap<SeriesKey, OhlcvTimeSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: OhlcvTimeSeries) -> Self {
        self.insert(series);
        self
    }

    pub fn insert(&mut self, series: OhlcvTimeSeries) {
        self.series.insert(series.key.clone(), series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[async_trait]
impl BarSource for InMemorySource {
    async fn load(&self, key: &SeriesKey, lookback_days: u32) -> Result<OhlcvTimeSeries> {
        self.series
            .get(key)
            .map(|series| series.with_lookback_days(lookback_days))
            .ok_or_else(|| LevelError::SeriesNotFound(key.to_string()))
    }

    fn signature(&self) -> &'static str {
        "In Memory"
    }
}

/// Tries each source in priority order; the first success wins.
#[derive(Clone, Default)]
pub struct FallbackSource {
    sources: Vec<Arc<dyn BarSource>>,
}

impl FallbackSource {
    pub fn new(sources: Vec<Arc<dyn BarSource>>) -> Self {
        Self { sources }
    }

    pub fn push(mut self, source: Arc<dyn BarSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Load from the first source that succeeds, returning which one it was.
    pub async fn load_with_signature(
        &self,
        key: &SeriesKey,
        lookback_days: u32,
    ) -> Result<(OhlcvTimeSeries, &'static str)> {
        let mut last_error = None;
        for source in &self.sources {
            match source.load(key, lookback_days).await {
                Ok(series) => return Ok((series, source.signature())),
                Err(e) => {
                    log::info!("{} could not load {}: {}", source.signature(), key, e);
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            // Keep the last error's retry classification
            Some(e) if e.is_retryable() => LevelError::DataSource {
                symbol: key.symbol.clone(),
                reason: format!("all sources failed, last: {}", e),
            },
            Some(e) => e,
            None => LevelError::SeriesNotFound(key.to_string()),
        })
    }
}

#[async_trait]
impl BarSource for FallbackSource {
    async fn load(&self, key: &SeriesKey, lookback_days: u32) -> Result<OhlcvTimeSeries> {
        self.load_with_signature(key, lookback_days)
            .await
            .map(|(series, _)| series)
    }

    fn signature(&self) -> &'static str {
        "Fallback Chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::test_support::series_from_closes;

    struct Failing;

    #[async_trait]
    impl BarSource for Failing {
        async fn load(&self, key: &SeriesKey, _lookback_days: u32) -> Result<OhlcvTimeSeries> {
            Err(LevelError::DataSource {
                symbol: key.symbol.clone(),
                reason: "offline".to_string(),
            })
        }

        fn signature(&self) -> &'static str {
            "Failing"
        }
    }

    #[tokio::test]
    async fn test_in_memory_applies_lookback() {
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let source = InMemorySource::new().with_series(series_from_closes("BTCUSDT", &closes));
        let key = SeriesKey::new("BTCUSDT", Timeframe::Day1);

        let series = source.load(&key, 10).await.unwrap();
        assert_eq!(series.len(), 11);
        assert_eq!(series.last_close(), Some(199.0));

        let missing = SeriesKey::new("ETHUSDT", Timeframe::Day1);
        assert!(matches!(
            source.load(&missing, 10).await,
            Err(LevelError::SeriesNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fallback_uses_first_success() {
        let memory = InMemorySource::new().with_series(series_from_closes("BTCUSDT", &[1.0, 2.0]));
        let chain = FallbackSource::new(vec![Arc::new(Failing), Arc::new(memory)]);
        let key = SeriesKey::new("BTCUSDT", Timeframe::Day1);

        let (series, signature) = chain.load_with_signature(&key, 30).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(signature, "In Memory");
    }

    #[tokio::test]
    async fn test_fallback_reports_failure() {
        let chain = FallbackSource::new(vec![Arc::new(Failing)]);
        let key = SeriesKey::new("BTCUSDT", Timeframe::Day1);
        let err = chain.load(&key, 30).await.unwrap_err();
        assert!(err.is_retryable());

        let empty = FallbackSource::default();
        assert!(matches!(
            empty.load(&key, 30).await,
            Err(LevelError::SeriesNotFound(_))
        ));
    }
}
