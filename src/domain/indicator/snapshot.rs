//! Per-bar indicator snapshot and the incremental engine that produces it.

use chrono::NaiveDateTime;

use super::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW, macd_warmup};
use super::streaming::{RollingMean, StreamingBollinger, StreamingEma, StreamingMacd, StreamingRsi};
use super::{
    IndicatorType, IndicatorValue, calculate_bollinger, calculate_ema, calculate_macd,
    calculate_rsi, calculate_volume_sma,
};
use crate::domain::ohlcv::OhlcvBar;

/// Lookback periods for every indicator in the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_stddev: f64,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub volume_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            macd_fast: DEFAULT_FAST,
            macd_slow: DEFAULT_SLOW,
            macd_signal: DEFAULT_SIGNAL,
            bb_period: 20,
            bb_stddev: 2.0,
            ema_fast: 9,
            ema_slow: 21,
            volume_period: 20,
        }
    }
}

impl IndicatorParams {
    /// Bars required before every indicator is valid (34 for the defaults).
    pub fn min_history(&self) -> usize {
        [
            self.rsi_period + 1,
            macd_warmup(self.macd_fast, self.macd_slow, self.macd_signal) + 1,
            self.bb_period,
            self.ema_fast,
            self.ema_slow,
            self.volume_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Rsi(self.rsi_period),
            IndicatorType::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            },
            IndicatorType::Bollinger {
                period: self.bb_period,
                stddev_mult: self.bb_stddev,
            },
            IndicatorType::Ema(self.ema_fast),
            IndicatorType::Ema(self.ema_slow),
            IndicatorType::VolumeSma(self.volume_period),
        ]
    }
}

/// All indicator values for one instrument at one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub volume: f64,
    pub rsi: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub avg_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient history: have {have} bars, need {need}")]
pub struct Insufficient {
    pub have: usize,
    pub need: usize,
}

/// Full recomputation: the snapshot for the last bar of `history`.
pub fn compute(
    history: &[OhlcvBar],
    params: &IndicatorParams,
) -> Result<IndicatorSnapshot, Insufficient> {
    let insufficient = Insufficient {
        have: history.len(),
        need: params.min_history(),
    };
    if history.len() < insufficient.need {
        return Err(insufficient);
    }
    snapshots_from_history(history, params)
        .pop()
        .flatten()
        .ok_or(insufficient)
}

/// Full recomputation of the snapshot at every bar; `None` during warmup.
pub fn snapshots_from_history(
    history: &[OhlcvBar],
    params: &IndicatorParams,
) -> Vec<Option<IndicatorSnapshot>> {
    let rsi = calculate_rsi(history, params.rsi_period);
    let macd = calculate_macd(history, params.macd_fast, params.macd_slow, params.macd_signal);
    let bb = calculate_bollinger(history, params.bb_period, params.bb_stddev);
    let ema_fast = calculate_ema(history, params.ema_fast);
    let ema_slow = calculate_ema(history, params.ema_slow);
    let volume = calculate_volume_sma(history, params.volume_period);

    let simple_at = |series: &super::IndicatorSeries, i: usize| {
        series
            .values
            .get(i)
            .filter(|p| p.valid)
            .and_then(|p| p.value.simple())
    };

    history
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (macd_line, macd_signal, macd_hist) = match macd.values.get(i) {
                Some(p) if p.valid => match p.value {
                    IndicatorValue::Macd {
                        line,
                        signal,
                        histogram,
                    } => (line, signal, histogram),
                    _ => return None,
                },
                _ => return None,
            };
            let (bb_upper, bb_mid, bb_lower) = match bb.values.get(i) {
                Some(p) if p.valid => match p.value {
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    } => (upper, middle, lower),
                    _ => return None,
                },
                _ => return None,
            };

            Some(IndicatorSnapshot {
                timestamp: bar.timestamp,
                close: bar.close,
                volume: bar.volume,
                rsi: simple_at(&rsi, i)?,
                macd_line,
                macd_signal,
                macd_hist,
                bb_upper,
                bb_mid,
                bb_lower,
                ema_fast: simple_at(&ema_fast, i)?,
                ema_slow: simple_at(&ema_slow, i)?,
                avg_volume: simple_at(&volume, i)?,
            })
        })
        .collect()
}

/// Streaming indicator state for a single instrument.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi: StreamingRsi,
    macd: StreamingMacd,
    bollinger: StreamingBollinger,
    ema_fast: StreamingEma,
    ema_slow: StreamingEma,
    volume: RollingMean,
    bars_seen: usize,
}

impl IndicatorEngine {
    pub fn new(params: &IndicatorParams) -> Self {
        Self {
            rsi: StreamingRsi::new(params.rsi_period),
            macd: StreamingMacd::new(params.macd_fast, params.macd_slow, params.macd_signal),
            bollinger: StreamingBollinger::new(params.bb_period, params.bb_stddev),
            ema_fast: StreamingEma::new(params.ema_fast),
            ema_slow: StreamingEma::new(params.ema_slow),
            volume: RollingMean::new(params.volume_period),
            bars_seen: 0,
        }
    }

    /// Feed the next bar. Every indicator advances even while others are
    /// still warming up.
    pub fn update(&mut self, bar: &OhlcvBar) -> Option<IndicatorSnapshot> {
        self.bars_seen += 1;
        let rsi = self.rsi.update(bar.close);
        let macd = self.macd.update(bar.close);
        let bands = self.bollinger.update(bar.close);
        let ema_fast = self.ema_fast.update(bar.close);
        let ema_slow = self.ema_slow.update(bar.close);
        let avg_volume = self.volume.update(bar.volume);

        let macd = macd?;
        let bands = bands?;
        Some(IndicatorSnapshot {
            timestamp: bar.timestamp,
            close: bar.close,
            volume: bar.volume,
            rsi: rsi?,
            macd_line: macd.line,
            macd_signal: macd.signal,
            macd_hist: macd.histogram,
            bb_upper: bands.upper,
            bb_mid: bands.middle,
            bb_lower: bands.lower,
            ema_fast: ema_fast?,
            ema_slow: ema_slow?,
            avg_volume: avg_volume?,
        })
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }
}
