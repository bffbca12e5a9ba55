//! Volume baseline: simple moving average of bar volume.
//!
//! SMA(n)[i] = sum(volume[i-n+1..=i]) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

/// Volume baseline used for high-volume confirmation.
pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::VolumeSma(period);
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = i + 1 >= period;
            let mean = if valid {
                bars[i + 1 - period..=i].iter().map(|b| b.volume).sum::<f64>() / period as f64
            } else {
                0.0
            };
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Simple(mean),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::make_bars;

    fn with_volumes(volumes: &[f64]) -> Vec<OhlcvBar> {
        let mut bars = make_bars(&vec![10.0; volumes.len()]);
        for (bar, &v) in bars.iter_mut().zip(volumes) {
            bar.volume = v;
        }
        bars
    }

    #[test]
    fn volume_sma_warmup() {
        let series = calculate_volume_sma(&with_volumes(&[100.0, 200.0, 300.0, 400.0]), 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn volume_sma_rolls_window() {
        let series = calculate_volume_sma(&with_volumes(&[100.0, 200.0, 300.0, 400.0]), 3);

        assert_eq!(series.indicator_type, IndicatorType::VolumeSma(3));
        assert_eq!(series.values[2].value, IndicatorValue::Simple(200.0));
        assert_eq!(series.values[3].value, IndicatorValue::Simple(300.0));
    }

    #[test]
    fn volume_sma_period_0() {
        assert!(calculate_volume_sma(&with_volumes(&[1.0, 2.0]), 0).values.is_empty());
    }
}
