//! CSV file data adapter.
//!
//! One file per instrument, `<data_dir>/<CODE>.csv`, with the header
//! `timestamp,open,high,low,close,volume`. Rows are returned in file order;
//! ordering faults are left for the simulator to report.

use crate::domain::error::ConfluenceError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use std::fs;
use std::path::PathBuf;

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn data_error(reason: String) -> ConfluenceError {
    ConfluenceError::Data { reason }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers()?.clone();
        let mut index = [0usize; 6];
        for (slot, name) in index.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    data_error(format!("{}: missing {} column", path.display(), name))
                })?;
        }

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let line = row + 2;
            let raw = |col: usize| record.get(index[col]).unwrap_or("").trim();

            let Some(timestamp) = parse_timestamp(raw(0)) else {
                warn!("{} line {}: invalid timestamp, row dropped", path.display(), line);
                continue;
            };
            let date = timestamp.date();
            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            // An unparsable value becomes NaN so the simulator rejects the bar
            // for its own step only.
            let number = |col: usize| match raw(col).parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    warn!(
                        "{} line {}: invalid {} value {:?}",
                        path.display(),
                        line,
                        COLUMNS[col],
                        raw(col)
                    );
                    f64::NAN
                }
            };

            bars.push(OhlcvBar {
                code: code.to_string(),
                timestamp,
                open: number(1),
                high: number(2),
                low: number(3),
                close: number(4),
                volume: number(5),
            });
        }

        Ok(bars)
    }
}
