use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BarType {
    Bullish,
    Bearish,
}

/// One OHLCV bar. Timestamps are epoch milliseconds of the bar open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Bar {
            timestamp_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn get_type(&self) -> BarType {
        if self.close >= self.open {
            BarType::Bullish
        } else {
            BarType::Bearish
        }
    }

    // Returns the low and high of the bar body as a tuple
    pub fn body_range(&self) -> (f64, f64) {
        match self.get_type() {
            BarType::Bullish => (self.open, self.close),
            BarType::Bearish => (self.close, self.open),
        }
    }

    /// True when the bar's [low, high] range comes within `tolerance` (fractional) of `price`.
    pub fn touches(&self, price: f64, tolerance: f64) -> bool {
        let band = price * tolerance;
        self.low <= price + band && self.high >= price - band
    }

    /// Wilder's true range against the previous close.
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        let hl = self.high - self.low;
        match prev_close {
            Some(pc) => hl.max((self.high - pc).abs()).max((self.low - pc).abs()),
            None => hl,
        }
    }

    /// Values must be finite and non-negative, with low <= high.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            && self.low <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_range_and_type() {
        let bull = Bar::new(0, 10.0, 12.0, 9.0, 11.0, 5.0);
        assert_eq!(bull.get_type(), BarType::Bullish);
        assert_eq!(bull.body_range(), (10.0, 11.0));

        let bear = Bar::new(0, 11.0, 12.0, 9.0, 10.0, 5.0);
        assert_eq!(bear.get_type(), BarType::Bearish);
        assert_eq!(bear.body_range(), (10.0, 11.0));
    }

    #[test]
    fn test_touches_within_tolerance() {
        let bar = Bar::new(0, 103.0, 104.0, 101.5, 102.0, 1.0);
        assert!(bar.touches(100.0, 0.02));
        assert!(!bar.touches(100.0, 0.01));
    }

    #[test]
    fn test_true_range_uses_gap() {
        let bar = Bar::new(0, 105.0, 106.0, 104.0, 105.0, 1.0);
        assert_eq!(bar.true_range(None), 2.0);
        assert_eq!(bar.true_range(Some(100.0)), 6.0);
    }

    #[test]
    fn test_well_formed() {
        assert!(Bar::new(0, 1.0, 2.0, 0.5, 1.5, 0.0).is_well_formed());
        assert!(!Bar::new(0, 1.0, 0.4, 0.5, 1.5, 0.0).is_well_formed());
        assert!(!Bar::new(0, f64::NAN, 2.0, 0.5, 1.5, 0.0).is_well_formed());
        assert!(!Bar::new(0, 1.0, 2.0, 0.5, 1.5, -1.0).is_well_formed());
        assert!(!Bar::new(0, -5.0, -4.5, -5.5, -5.0, 1.0).is_well_formed());
        assert!(!Bar::new(0, 1.0, 2.0, -0.5, 1.5, 1.0).is_well_formed());
    }
}
