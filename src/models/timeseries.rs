use serde::{Deserialize, Serialize};

use crate::domain::{Bar, SeriesKey};
use crate::error::{LevelError, Result};
use crate::utils::TimeUtils;
use crate::utils::maths_utils::{get_max, get_min};

// ============================================================================
// OhlcvTimeSeries: Immutable bar series for one symbol/timeframe
// ============================================================================

/// Columnar OHLCV storage. Timestamps are strictly increasing; the series is
/// never mutated once built, only sliced into new series.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OhlcvTimeSeries {
    pub key: SeriesKey,

    pub timestamps_ms: Vec<i64>,

    // Prices
    pub open_prices: Vec<f64>,
    pub high_prices: Vec<f64>,
    pub low_prices: Vec<f64>,
    pub close_prices: Vec<f64>,

    // Volumes
    pub volumes: Vec<f64>,
}

impl OhlcvTimeSeries {
    /// Build a series from bars, rejecting malformed bars and non-increasing timestamps.
    pub fn from_bars(key: SeriesKey, bars: &[Bar]) -> Result<Self> {
        for (idx, bar) in bars.iter().enumerate() {
            if !bar.is_well_formed() {
                return Err(LevelError::InvalidSeries(format!(
                    "{}: malformed bar at index {} ({:?})",
                    key, idx, bar
                )));
            }
        }

        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp_ms <= w[0].timestamp_ms)
        {
            return Err(LevelError::InvalidSeries(format!(
                "{}: timestamps not strictly increasing at index {} ({} -> {})",
                key,
                pos + 1,
                bars[pos].timestamp_ms,
                bars[pos + 1].timestamp_ms
            )));
        }

        Ok(OhlcvTimeSeries {
            key,
            timestamps_ms: bars.iter().map(|b| b.timestamp_ms).collect(),
            open_prices: bars.iter().map(|b| b.open).collect(),
            high_prices: bars.iter().map(|b| b.high).collect(),
            low_prices: bars.iter().map(|b| b.low).collect(),
            close_prices: bars.iter().map(|b| b.close).collect(),
            volumes: bars.iter().map(|b| b.volume).collect(),
        })
    }

    pub fn bar(&self, idx: usize) -> Bar {
        Bar::new(
            self.timestamps_ms[idx],
            self.open_prices[idx],
            self.high_prices[idx],
            self.low_prices[idx],
            self.close_prices[idx],
            self.volumes[idx],
        )
    }

    pub fn bars(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).map(|idx| self.bar(idx))
    }

    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    pub fn index_of_timestamp(&self, timestamp_ms: i64) -> Option<usize> {
        self.timestamps_ms.binary_search(&timestamp_ms).ok()
    }

    pub fn first_timestamp_ms(&self) -> Option<i64> {
        self.timestamps_ms.first().copied()
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.timestamps_ms.last().copied()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices.last().copied()
    }

    /// (lowest low, highest high) across the series
    pub fn price_bounds(&self) -> Option<(f64, f64)> {
        Some((get_min(&self.low_prices)?, get_max(&self.high_prices)?))
    }

    /// Keep only the most recent `days` of history, measured back from the last bar.
    pub fn with_lookback_days(&self, days: u32) -> OhlcvTimeSeries {
        let Some(last_ts) = self.last_timestamp_ms() else {
            return self.clone();
        };
        let cutoff = last_ts - days as i64 * TimeUtils::MS_IN_D;
        let start_index = self.timestamps_ms.partition_point(|&ts| ts < cutoff);
        self.slice(start_index, self.len())
    }

    /// Copy of the bars in `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> OhlcvTimeSeries {
        let end = end.min(self.len());
        let start = start.min(end);
        OhlcvTimeSeries {
            key: self.key.clone(),
            timestamps_ms: self.timestamps_ms[start..end].to_vec(),
            open_prices: self.open_prices[start..end].to_vec(),
            high_prices: self.high_prices[start..end].to_vec(),
            low_prices: self.low_prices[start..end].to_vec(),
            close_prices: self.close_prices[start..end].to_vec(),
            volumes: self.volumes[start..end].to_vec(),
        }
    }
}
