//! Instrument universe: parsing the configured code list and loading bars
//! for every code that has enough of them.

use crate::domain::code_data::CodeData;
use crate::domain::error::ConfluenceError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for ConfluenceError {
    fn from(err: UniverseError) -> Self {
        ConfluenceError::invalid("backtest", "codes", err.to_string())
    }
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientBars { bars } => write!(f, "only {} bars", bars),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    /// In configured code order.
    pub data: Vec<CodeData>,
    pub skipped: Vec<SkippedCode>,
}

/// Fetch bars for each code, skipping codes that fail to load or have fewer
/// than `min_bars`. Fails only when every code was skipped.
pub fn load_universe(
    data_port: &dyn DataPort,
    codes: &[String],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    min_bars: usize,
) -> Result<LoadedUniverse, ConfluenceError> {
    let mut data = Vec::new();
    let mut skipped = Vec::new();

    for code in codes {
        let bars = match data_port.fetch_ohlcv(code, start_date, end_date) {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!("skipping {} (no data found)", code);
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(e) => {
                warn!("skipping {} ({})", code, e);
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.len() < min_bars {
            warn!(
                "skipping {} (only {} bars, minimum {} required)",
                code,
                bars.len(),
                min_bars
            );
            skipped.push(SkippedCode {
                code: code.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        info!("{}: {} bars", code, bars.len());
        data.push(CodeData::new(code.clone(), bars));
    }

    if data.is_empty() {
        return Err(ConfluenceError::InsufficientData {
            code: "all".to_string(),
            bars: 0,
            minimum: min_bars,
        });
    }

    Ok(LoadedUniverse { data, skipped })
}
