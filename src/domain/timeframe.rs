use serde::{Deserialize, Serialize};

use crate::utils::TimeUtils;

/// Bar interval of a series, from intraday to yearly.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    #[strum(serialize = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    #[strum(serialize = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    #[strum(serialize = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    #[strum(serialize = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    #[strum(serialize = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    #[strum(serialize = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    #[strum(serialize = "1d")]
    Day1,
    #[serde(rename = "1w")]
    #[strum(serialize = "1w")]
    Week1,
    #[serde(rename = "1M")]
    #[strum(serialize = "1M")]
    Month1,
    #[serde(rename = "1y")]
    #[strum(serialize = "1y")]
    Year1,
}

impl Timeframe {
    pub fn interval_ms(&self) -> i64 {
        match self {
            Timeframe::Minute1 => TimeUtils::MS_IN_MIN,
            Timeframe::Minute5 => TimeUtils::MS_IN_5_MIN,
            Timeframe::Minute15 => TimeUtils::MS_IN_15_MIN,
            Timeframe::Minute30 => TimeUtils::MS_IN_30_MIN,
            Timeframe::Hour1 => TimeUtils::MS_IN_H,
            Timeframe::Hour4 => TimeUtils::MS_IN_4_H,
            Timeframe::Day1 => TimeUtils::MS_IN_D,
            Timeframe::Week1 => TimeUtils::MS_IN_W,
            Timeframe::Month1 => TimeUtils::MS_IN_1_M,
            Timeframe::Year1 => TimeUtils::MS_IN_Y,
        }
    }

    /// History requested from the loader when the caller gives no override.
    pub fn default_lookback_days(&self) -> u32 {
        match self {
            Timeframe::Minute1 => 7,
            Timeframe::Minute5 => 30,
            Timeframe::Minute15 => 60,
            Timeframe::Minute30 => 90,
            Timeframe::Hour1 => 180,
            Timeframe::Hour4 => 365,
            Timeframe::Day1 => 730,
            Timeframe::Week1 => 1_825,
            Timeframe::Month1 | Timeframe::Year1 => 3_650,
        }
    }
}

/// Identifies one series: a symbol at one timeframe.
#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl SeriesKey {
    pub fn new(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
        }
    }

    /// File stem used by file-backed sources, e.g. "BTCUSDT_1h"
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.symbol, self.timeframe)
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} @ {}", self.symbol, self.timeframe)
    }
}
