//! CSV trade ledger writer implementing ReportPort.

use std::path::Path;

use crate::domain::error::ConfluenceError;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;

const HEADER: [&str; 9] = [
    "code",
    "side",
    "quantity",
    "entry_timestamp",
    "entry_price",
    "exit_timestamp",
    "exit_price",
    "exit_reason",
    "realized_pnl",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

fn trade_record(trade: &Trade) -> [String; 9] {
    [
        trade.code.clone(),
        trade.side.to_string(),
        trade.quantity.to_string(),
        trade.entry_timestamp.format(TIMESTAMP_FORMAT).to_string(),
        format!("{:.4}", trade.entry_price),
        trade.exit_timestamp.format(TIMESTAMP_FORMAT).to_string(),
        format!("{:.4}", trade.exit_price),
        trade.exit_reason.to_string(),
        format!("{:.4}", trade.realized_pnl),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[Trade], output_path: &Path) -> Result<(), ConfluenceError> {
        let mut writer = csv::Writer::from_path(output_path)?;
        writer.write_record(HEADER)?;
        for trade in trades {
            writer.write_record(trade_record(trade))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{ExitReason, PositionSide};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn sample_trade() -> Trade {
        let day = |d| {
            NaiveDate::from_ymd_opt(2024, 3, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        Trade {
            code: "BHP".into(),
            side: PositionSide::Long,
            quantity: 10,
            entry_timestamp: day(1),
            entry_price: 100.0,
            exit_timestamp: day(4),
            exit_price: 104.0,
            exit_reason: ExitReason::TakeProfit,
            realized_pnl: 40.0,
        }
    }

    #[test]
    fn writes_header_and_one_row_per_trade() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");

        CsvReportAdapter::new()
            .write_trades(&[sample_trade(), sample_trade()], &path)
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "code,side,quantity,entry_timestamp,entry_price,exit_timestamp,exit_price,exit_reason,realized_pnl"
        );
        assert_eq!(
            lines[1],
            "BHP,long,10,2024-03-01 00:00:00,100.0000,2024-03-04 00:00:00,104.0000,take_profit,40.0000"
        );
    }

    #[test]
    fn empty_ledger_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");

        CsvReportAdapter::new().write_trades(&[], &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("trades.csv");
        assert!(CsvReportAdapter::new().write_trades(&[], &path).is_err());
    }
}
