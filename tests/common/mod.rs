#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use confluence::domain::backtest::{BacktestConfig, Simulator};
use confluence::domain::code_data::CodeData;
use confluence::domain::error::ConfluenceError;
use confluence::domain::indicator::snapshot::IndicatorParams;
pub use confluence::domain::ohlcv::OhlcvBar;
use confluence::domain::signal::{Contributor, SignalContext, SignalGenerator, Vote};
use confluence::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(ConfluenceError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start_date.is_none_or(|s| b.timestamp.date() >= s))
                    .filter(|b| end_date.is_none_or(|e| b.timestamp.date() <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(n: i64) -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap() + Duration::days(n)
}

/// Daily bars from 2024-01-01 whose open, high and low equal the close.
pub fn flat_bars(code: &str, prices: &[f64]) -> Vec<OhlcvBar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            code: code.to_string(),
            timestamp: day(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Daily bars tracing a slow sine wave with varying volume.
pub fn wave_bars(code: &str, count: usize, base: f64) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| {
            let close = base + 8.0 * (i as f64 * 0.21).sin() + (i as f64 * 0.05);
            OhlcvBar {
                code: code.to_string(),
                timestamp: day(i as i64),
                open: close - 0.3,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0 + ((i * 37) % 11) as f64 * 200.0,
            }
        })
        .collect()
}

pub fn code_data(code: &str, bars: Vec<OhlcvBar>) -> CodeData {
    CodeData::new(code, bars)
}

/// Short lookbacks: four bars to the first snapshot.
pub fn small_config() -> BacktestConfig {
    BacktestConfig {
        indicators: IndicatorParams {
            rsi_period: 2,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
            bb_period: 3,
            bb_stddev: 2.0,
            ema_fast: 2,
            ema_slow: 3,
            volume_period: 2,
        },
        ..BacktestConfig::default()
    }
}

/// Votes BUY below `0`, SELL above it.
#[derive(Debug)]
pub struct PriceLevel(pub f64);

impl Contributor for PriceLevel {
    fn name(&self) -> &str {
        "price_level"
    }
    fn weight(&self) -> f64 {
        1.0
    }
    fn vote(&self, ctx: &SignalContext<'_>) -> Vote {
        if ctx.price < self.0 {
            Vote::Buy
        } else if ctx.price > self.0 {
            Vote::Sell
        } else {
            Vote::Abstain
        }
    }
}

pub fn level_simulator(config: BacktestConfig, level: f64) -> Simulator {
    let mut signals = SignalGenerator::empty(1.0);
    signals.register(Box::new(PriceLevel(level)));
    Simulator::new(config)
        .unwrap()
        .with_signal_generator(signals)
}
