//! Report generation port trait.

use crate::domain::error::ConfluenceError;
use crate::domain::position::Trade;
use std::path::Path;

/// Port for writing the trade ledger of a finished run.
pub trait ReportPort {
    fn write_trades(&self, trades: &[Trade], output_path: &Path) -> Result<(), ConfluenceError>;
}
