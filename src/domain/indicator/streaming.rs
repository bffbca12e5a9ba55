//! Streaming indicator state machines.
//!
//! Each `update` consumes one new value in bar order and returns `None` until
//! the indicator has warmed up. Warmup lengths and arithmetic mirror the batch
//! `calculate_*` functions so a streamed history reproduces a full
//! recomputation.

use std::collections::VecDeque;

use super::bollinger::bands;
use super::rsi::rsi_from_averages;

/// Fixed-length window mean (SMA of close or volume).
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        push_bounded(&mut self.window, self.period, value);
        if self.period == 0 || self.window.len() < self.period {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }
}

#[derive(Debug, Clone)]
pub struct StreamingEma {
    period: usize,
    k: f64,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl StreamingEma {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, input: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        self.count += 1;
        self.value = match self.value {
            Some(prev) => Some(input * self.k + prev * (1.0 - self.k)),
            None => {
                self.seed_sum += input;
                if self.count == self.period {
                    Some(self.seed_sum / self.period as f64)
                } else {
                    None
                }
            }
        };
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Wilder-smoothed RSI.
#[derive(Debug, Clone)]
pub struct StreamingRsi {
    period: usize,
    prev_close: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
    averages: Option<(f64, f64)>,
}

impl StreamingRsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            averages: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        if self.period == 0 {
            return None;
        }

        let change = close - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        self.changes += 1;

        let n = self.period as f64;
        let (avg_gain, avg_loss) = match self.averages {
            Some((g, l)) => ((g * (n - 1.0) + gain) / n, (l * (n - 1.0) + loss) / n),
            None => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                if self.changes < self.period {
                    return None;
                }
                (self.gain_sum / n, self.loss_sum / n)
            }
        };

        self.averages = Some((avg_gain, avg_loss));
        Some(rsi_from_averages(avg_gain, avg_loss))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone)]
pub struct StreamingMacd {
    fast: StreamingEma,
    slow: StreamingEma,
    signal: StreamingEma,
}

impl StreamingMacd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: StreamingEma::new(fast),
            slow: StreamingEma::new(slow),
            signal: StreamingEma::new(signal),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let line = fast? - slow?;
        let signal = self.signal.update(line)?;
        Some(MacdValue {
            line,
            signal,
            histogram: line - signal,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct StreamingBollinger {
    period: usize,
    stddev_mult: f64,
    window: VecDeque<f64>,
}

impl StreamingBollinger {
    pub fn new(period: usize, stddev_mult: f64) -> Self {
        Self {
            period,
            stddev_mult,
            window: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<BandValue> {
        push_bounded(&mut self.window, self.period, close);
        if self.period == 0 || self.window.len() < self.period {
            return None;
        }
        let (upper, middle, lower) = bands(&self.window, self.stddev_mult);
        Some(BandValue {
            upper,
            middle,
            lower,
        })
    }
}

fn push_bounded(window: &mut VecDeque<f64>, capacity: usize, value: f64) {
    if capacity == 0 {
        return;
    }
    if window.len() == capacity {
        window.pop_front();
    }
    window.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_warmup_and_roll() {
        let mut sma = RollingMean::new(3);
        assert_eq!(sma.update(1.0), None);
        assert_eq!(sma.update(2.0), None);
        assert_eq!(sma.update(3.0), Some(2.0));
        assert_eq!(sma.update(6.0), Some(11.0 / 3.0));
    }

    #[test]
    fn rolling_mean_zero_period_never_warms() {
        let mut sma = RollingMean::new(0);
        assert_eq!(sma.update(1.0), None);
        assert_eq!(sma.update(1.0), None);
    }

    #[test]
    fn ema_seeds_with_sma() {
        let mut ema = StreamingEma::new(3);
        assert_eq!(ema.update(10.0), None);
        assert_eq!(ema.update(20.0), None);
        assert_eq!(ema.update(30.0), Some(20.0));
        assert_eq!(ema.update(40.0), Some(40.0 * 0.5 + 20.0 * 0.5));
        assert_eq!(ema.value(), Some(30.0));
    }

    #[test]
    fn rsi_needs_period_changes() {
        let mut rsi = StreamingRsi::new(2);
        assert_eq!(rsi.update(10.0), None);
        assert_eq!(rsi.update(12.0), None);
        let first = rsi.update(11.0).unwrap();
        assert!((first - (100.0 - 100.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn rsi_flat_prices_is_neutral() {
        let mut rsi = StreamingRsi::new(2);
        rsi.update(10.0);
        rsi.update(10.0);
        assert_eq!(rsi.update(10.0), Some(50.0));
        assert_eq!(rsi.update(11.0), Some(100.0));
    }

    #[test]
    fn macd_warms_after_slow_plus_signal() {
        let mut macd = StreamingMacd::new(2, 3, 2);
        let outputs: Vec<_> = [10.0, 11.0, 13.0, 12.0, 15.0]
            .iter()
            .map(|&c| macd.update(c))
            .collect();
        assert!(outputs[..3].iter().all(Option::is_none));
        assert!(outputs[3].is_some());
        let v = outputs[4].unwrap();
        assert!((v.histogram - (v.line - v.signal)).abs() < f64::EPSILON);
    }

    #[test]
    fn bollinger_flat_window_collapses_bands() {
        let mut bb = StreamingBollinger::new(3, 2.0);
        bb.update(5.0);
        bb.update(5.0);
        let v = bb.update(5.0).unwrap();
        assert_eq!(v.upper, 5.0);
        assert_eq!(v.middle, 5.0);
        assert_eq!(v.lower, 5.0);
    }
}
