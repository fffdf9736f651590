use chrono::DateTime;

pub struct TimeUtils;

impl TimeUtils {
    pub const MS_IN_S: i64 = 1000;
    pub const MS_IN_MIN: i64 = Self::MS_IN_S * 60;
    pub const MS_IN_5_MIN: i64 = Self::MS_IN_MIN * 5;
    pub const MS_IN_15_MIN: i64 = Self::MS_IN_MIN * 15;
    pub const MS_IN_30_MIN: i64 = Self::MS_IN_MIN * 30;
    pub const MS_IN_H: i64 = Self::MS_IN_MIN * 60;
    pub const MS_IN_4_H: i64 = Self::MS_IN_H * 4;
    pub const MS_IN_D: i64 = Self::MS_IN_H * 24;
    pub const MS_IN_W: i64 = Self::MS_IN_D * 7;
    pub const MS_IN_1_M: i64 = Self::MS_IN_D * 30;
    pub const MS_IN_Y: i64 = Self::MS_IN_D * 365;
    pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";
}

/// Format an epoch-ms timestamp for logs. Out-of-range values render as the raw number.
pub fn epoch_ms_to_utc(epoch_ms: i64) -> String {
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format(TimeUtils::STANDARD_TIME_FORMAT).to_string(),
        None => epoch_ms.to_string(),
    }
}

/// Number of whole days spanned between two epoch-ms timestamps
pub fn span_days(start_ms: i64, end_ms: i64) -> f64 {
    (end_ms - start_ms).max(0) as f64 / TimeUtils::MS_IN_D as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formatting() {
        assert_eq!(epoch_ms_to_utc(0), "1970-01-01 00:00");
        assert_eq!(epoch_ms_to_utc(TimeUtils::MS_IN_D + TimeUtils::MS_IN_H), "1970-01-02 01:00");
    }

    #[test]
    fn test_span_days() {
        assert!((span_days(0, TimeUtils::MS_IN_D * 3) - 3.0).abs() < 1e-12);
        assert_eq!(span_days(10, 5), 0.0);
    }
}
