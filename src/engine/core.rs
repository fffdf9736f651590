use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use itertools::Itertools;

use crate::analysis::run_pipeline;
use crate::config::{ANALYSIS, AnalysisConfig};
#[allow(unused_imports)]
use crate::config::DEBUG_FLAGS;
use crate::data::BarSource;
use crate::domain::SeriesKey;
use crate::error::{LevelError, Result};
use crate::models::{AnalysisParams, LevelAnalysis, OhlcvTimeSeries};
use crate::projection::{ConfidenceModel, NullConfidenceModel};

use super::batch::{BatchReport, CancellationFlag};
use super::cache::{CacheKey, LevelCache};
use super::retry::RetryPolicy;

/// Entry point for level analysis: loads series, runs the pipeline and caches results.
///
/// Cloning is cheap and clones share the cache and the computation counter.
#[derive(Clone)]
pub struct LevelEngine {
    source: Arc<dyn BarSource>,
    model: Arc<dyn ConfidenceModel>,
    cache: LevelCache,
    retry: RetryPolicy,
    load_timeout: Duration,
    max_concurrency: usize,
    config: AnalysisConfig,
    computations: Arc<AtomicUsize>,
}

impl LevelEngine {
    /// Engine with the default configuration and no confidence model.
    pub fn new(source: Arc<dyn BarSource>) -> Self {
        let config = ANALYSIS;
        Self {
            source,
            model: Arc::new(NullConfidenceModel),
            cache: LevelCache::from_settings(&config.engine),
            retry: RetryPolicy::from_settings(&config.engine.retry),
            load_timeout: config.engine.load_timeout(),
            max_concurrency: config.engine.max_concurrency,
            config,
            computations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ConfidenceModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_cache(mut self, cache: LevelCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &LevelCache {
        &self.cache
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Full pipeline computations performed so far (cache hits excluded).
    pub fn computation_count(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    /// Cached analysis of one symbol. At most one computation runs per key: concurrent
    /// callers for the same key wait for it and then read the cached result.
    pub async fn analyze(&self, symbol: &str, params: &AnalysisParams) -> Result<Arc<LevelAnalysis>> {
        params.validate(&self.config.params)?;
        let key = CacheKey::new(symbol, params);

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let lock = self.cache.key_lock(&key);
        let result = {
            let _guard = lock.lock().await;
            self.compute_and_cache(&key, symbol, params).await
        };
        self.cache.release_key_lock(&key, lock);
        result
    }

    /// Runs under the key's lock.
    async fn compute_and_cache(
        &self,
        key: &CacheKey,
        symbol: &str,
        params: &AnalysisParams,
    ) -> Result<Arc<LevelAnalysis>> {
        // Someone else may have finished while we waited
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }

        let series_key = SeriesKey::new(symbol, params.timeframe);
        let series = self
            .load_series(&series_key, params.effective_lookback_days())
            .await?;

        let model = Arc::clone(&self.model);
        let config = self.config;
        let owned_params = params.clone();
        let analysis = tokio::task::spawn_blocking(move || {
            run_pipeline(&series, &owned_params, &config, model.as_ref())
        })
        .await
        .map_err(|e| LevelError::Internal(format!("pipeline task for {} failed: {}", symbol, e)))?;
        self.computations.fetch_add(1, Ordering::SeqCst);

        let analysis = Arc::new(analysis);
        self.cache.insert(key.clone(), Arc::clone(&analysis));
        Ok(analysis)
    }

    /// Uncached pipeline run over a series the caller already holds.
    pub fn analyze_series(&self, series: &OhlcvTimeSeries, params: &AnalysisParams) -> Result<LevelAnalysis> {
        params.validate(&self.config.params)?;
        let analysis = run_pipeline(series, params, &self.config, self.model.as_ref());
        self.computations.fetch_add(1, Ordering::SeqCst);
        Ok(analysis)
    }

    /// Analyze many symbols with at most `max_concurrency` in flight. One symbol's failure
    /// is recorded against that symbol only. Once `cancel` is set, symbols that have not
    /// started are reported as `Cancelled`.
    pub async fn analyze_batch(
        &self,
        symbols: &[String],
        params: &AnalysisParams,
        cancel: &CancellationFlag,
    ) -> BatchReport {
        #[cfg(debug_assertions)]
        if DEBUG_FLAGS.print_batch_progress {
            log::info!(
                "Batch of {} symbols ({}) at {}, {} in flight",
                symbols.len(),
                symbols.iter().join(", "),
                params.timeframe,
                self.max_concurrency
            );
        }

        let results: Vec<(String, Result<Arc<LevelAnalysis>>)> = futures::stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                if cancel.is_cancelled() {
                    let err = LevelError::Cancelled(symbol.clone());
                    return (symbol, Err(err));
                }
                let result = self.analyze(&symbol, params).await;
                match &result {
                    Ok(_analysis) => {
                        #[cfg(debug_assertions)]
                        if DEBUG_FLAGS.print_batch_progress {
                            log::info!(
                                "{}: {} levels",
                                symbol,
                                _analysis.summary.total_levels
                            );
                        }
                    }
                    Err(e) => log::warn!("{}: analysis failed: {}", symbol, e),
                }
                (symbol, result)
            })
            .buffer_unordered(self.max_concurrency.max(1))
            .collect()
            .await;

        let report = BatchReport {
            results: results.into_iter().collect(),
        };
        if report.failure_count() > 0 {
            log::warn!(
                "Batch finished with {} failures: {}",
                report.failure_count(),
                report.failed().map(|(symbol, _)| symbol).join(", ")
            );
        }
        report
    }

    async fn load_series(&self, key: &SeriesKey, lookback_days: u32) -> Result<OhlcvTimeSeries> {
        let timeout = self.load_timeout;
        let label = key.to_string();
        self.retry
            .run(&label, |_attempt| async move {
                match tokio::time::timeout(timeout, self.source.load(key, lookback_days)).await {
                    Ok(loaded) => loaded,
                    Err(_) => Err(LevelError::Timeout {
                        symbol: key.symbol.clone(),
                        after_ms: timeout.as_millis() as u64,
                    }),
                }
            })
            .await
    }
}
