use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::data::series_file::SeriesFile;
use crate::data::source::BarSource;
use crate::domain::{Bar, SeriesKey};
use crate::error::{LevelError, Result};
use crate::models::OhlcvTimeSeries;

/// Reads `<dir>/<SYMBOL>_<tf>.bin` (bincode `SeriesFile`), falling back to
/// `<dir>/<SYMBOL>_<tf>.json` (a JSON array of bars).
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn json_path(&self, key: &SeriesKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    /// Write `series` as this source's bincode file for its key.
    pub async fn store(&self, series: &OhlcvTimeSeries) -> Result<PathBuf> {
        let path = SeriesFile::path_in(&self.dir, &series.key);
        let file = SeriesFile::from_series(series);
        let target = path.clone();
        tokio::task::spawn_blocking(move || file.save_to_path(&target))
            .await
            .map_err(|e| LevelError::Internal(format!("series writer failed: {}", e)))?
            .map_err(|e| LevelError::DataSource {
                symbol: series.key.symbol.clone(),
                reason: format!("{:#}", e),
            })?;
        Ok(path)
    }

    async fn load_series_file(path: PathBuf) -> Result<SeriesFile> {
        tokio::task::spawn_blocking(move || SeriesFile::load_from_path(&path))
            .await
            .map_err(|e| LevelError::Internal(format!("series reader failed: {}", e)))?
            .map_err(|e| LevelError::Decode(format!("{:#}", e)))
    }

    async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LevelError::Io(e)),
        }
    }
}

#[async_trait]
impl BarSource for FileSource {
    async fn load(&self, key: &SeriesKey, lookback_days: u32) -> Result<OhlcvTimeSeries> {
        let bin_path = SeriesFile::path_in(&self.dir, key);
        let series = if tokio::fs::try_exists(&bin_path).await? {
            let file = Self::load_series_file(bin_path.clone()).await?;
            if file.key != *key {
                return Err(LevelError::Decode(format!(
                    "{} holds {}, expected {}",
                    bin_path.display(),
                    file.key,
                    key
                )));
            }
            file.into_series()?
        } else if let Some(bytes) = Self::read_if_exists(&self.json_path(key)).await? {
            let bars: Vec<Bar> = serde_json::from_slice(&bytes)?;
            OhlcvTimeSeries::from_bars(key.clone(), &bars)?
        } else {
            return Err(LevelError::SeriesNotFound(format!(
                "{} (looked in {})",
                key,
                self.dir.display()
            )));
        };

        Ok(series.with_lookback_days(lookback_days))
    }

    fn signature(&self) -> &'static str {
        "Local Files"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::test_support::series_from_closes;

    #[tokio::test]
    async fn test_loads_bincode_file() {
        let dir = tempfile::tempdir().unwrap();
        let series = series_from_closes("BTCUSDT", &[100.0, 101.0, 102.0]);
        let source = FileSource::new(dir.path());
        let path = source.store(&series).await.unwrap();
        assert!(path.ends_with("BTCUSDT_1d.bin"));

        let loaded = source.load(&series.key, 365).await.unwrap();
        assert_eq!(loaded, series);
    }

    #[tokio::test]
    async fn test_corrupt_bincode_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let key = SeriesKey::new("BTCUSDT", Timeframe::Day1);
        std::fs::write(SeriesFile::path_in(dir.path(), &key), [1u8, 2, 3]).unwrap();

        let err = FileSource::new(dir.path()).load(&key, 30).await.unwrap_err();
        match err {
            LevelError::Decode(msg) => assert!(msg.contains("Failed to deserialize series file")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_file_for_another_key() {
        let dir = tempfile::tempdir().unwrap();
        let series = series_from_closes("BTCUSDT", &[100.0, 101.0, 102.0]);
        let stored = FileSource::new(dir.path()).store(&series).await.unwrap();
        let other = SeriesKey::new("ETHUSDT", Timeframe::Day1);
        std::fs::rename(stored, SeriesFile::path_in(dir.path(), &other)).unwrap();

        assert!(matches!(
            FileSource::new(dir.path()).load(&other, 30).await,
            Err(LevelError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_loads_json_bars() {
        let dir = tempfile::tempdir().unwrap();
        let key = SeriesKey::new("ETHUSDT", Timeframe::Hour4);
        let json = r#"[
            {"timestamp_ms": 0, "open": 10.0, "high": 11.0, "low": 9.5, "close": 10.5, "volume": 3.0},
            {"timestamp_ms": 14400000, "open": 10.5, "high": 12.0, "low": 10.0, "close": 11.5, "volume": 4.0}
        ]"#;
        std::fs::write(dir.path().join("ETHUSDT_4h.json"), json).unwrap();

        let loaded = FileSource::new(dir.path()).load(&key, 30).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.key, key);
        assert_eq!(loaded.last_close(), Some(11.5));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let key = SeriesKey::new("XRPUSDT", Timeframe::Day1);
        assert!(matches!(
            source.load(&key, 30).await,
            Err(LevelError::SeriesNotFound(_))
        ));

        // Timestamps out of order
        let json = r#"[
            {"timestamp_ms": 5, "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0},
            {"timestamp_ms": 5, "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1.0}
        ]"#;
        std::fs::write(source.json_path(&key), json).unwrap();
        let err = source.load(&key, 30).await.unwrap_err();
        assert!(matches!(err, LevelError::InvalidSeries(_)));
        assert!(!err.is_retryable());
    }
}
