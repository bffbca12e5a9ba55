//! OHLCV bar representation.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// All prices finite and positive, volume finite and non-negative,
    /// low <= open/close <= high.
    pub fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return false;
        }
        self.low <= self.high
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            code: "AAPL".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn well_formed_bar() {
        assert!(sample_bar().is_well_formed());
    }

    #[test]
    fn high_below_low_is_malformed() {
        let mut bar = sample_bar();
        bar.high = 80.0;
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn close_above_high_is_malformed() {
        let mut bar = sample_bar();
        bar.close = 111.0;
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn nan_price_is_malformed() {
        let mut bar = sample_bar();
        bar.open = f64::NAN;
        assert!(!bar.is_well_formed());
    }

    #[test]
    fn negative_volume_is_malformed() {
        let mut bar = sample_bar();
        bar.volume = -1.0;
        assert!(!bar.is_well_formed());
    }
}
