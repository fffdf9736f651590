use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, SeriesKey};
use crate::models::OhlcvTimeSeries;

pub const SERIES_FILE_VERSION: f64 = 1.0;

/// Serialized bar cache for one series (bincode on disk).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeriesFile {
    pub version: f64,
    pub timestamp_ms: i64,
    pub key: SeriesKey,
    pub bars: Vec<Bar>,
}

impl SeriesFile {
    pub fn new(key: SeriesKey, bars: Vec<Bar>) -> Self {
        Self {
            version: SERIES_FILE_VERSION,
            timestamp_ms: Utc::now().timestamp_millis(),
            key,
            bars,
        }
    }

    pub fn from_series(series: &OhlcvTimeSeries) -> Self {
        Self::new(series.key.clone(), series.bars().collect())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).context(format!("Failed to open series file: {:?}", path))?;
        let mut reader = BufReader::new(file);
        let cache = bincode::deserialize_from(&mut reader)
            .context(format!("Failed to deserialize series file: {:?}", path))?;
        Ok(cache)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }
        let file =
            File::create(path).context(format!("Failed to create file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)
            .context(format!("Failed to serialize series to: {}", path.display()))
    }

    pub fn path_in(dir: &Path, key: &SeriesKey) -> PathBuf {
        dir.join(format!("{}.bin", key.file_stem()))
    }

    /// Validate the stored bars into a series.
    pub fn into_series(self) -> crate::error::Result<OhlcvTimeSeries> {
        OhlcvTimeSeries::from_bars(self.key, &self.bars)
    }
}
