//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_bollinger(bars: &[OhlcvBar], period: usize, stddev_mult: f64) -> IndicatorSeries {
    let indicator_type = IndicatorType::Bollinger {
        period,
        stddev_mult,
    };
    if period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(bars.len());
    let mut window: Vec<f64> = Vec::with_capacity(period);

    for (i, bar) in bars.iter().enumerate() {
        let valid = i + 1 >= period;

        let (upper, middle, lower) = if valid {
            window.clear();
            window.extend(bars[i + 1 - period..=i].iter().map(|b| b.close));
            bands(&window, stddev_mult)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// (upper, middle, lower) for one full window, oldest value first.
pub(crate) fn bands<'a, I>(window: I, stddev_mult: f64) -> (f64, f64, f64)
where
    I: IntoIterator<Item = &'a f64> + Copy,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    for v in window {
        sum += v;
        n += 1;
    }
    let middle = sum / n as f64;

    let variance: f64 = window
        .into_iter()
        .map(|v| {
            let diff = v - middle;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;

    let stddev = variance.sqrt();
    (middle + stddev_mult * stddev, middle, middle - stddev_mult * stddev)
}
