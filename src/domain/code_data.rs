//! Per-instrument bar series and the merged timeline the simulator walks.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;

/// Bars for one instrument in the order the source delivered them.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeData {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
}

impl CodeData {
    pub fn new(code: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        Self {
            code: code.into(),
            bars,
        }
    }
}

/// Every distinct timestamp across all instruments, ascending.
pub fn build_unified_timeline(codes: &[CodeData]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = codes
        .iter()
        .flat_map(|cd| cd.bars.iter().map(|bar| bar.timestamp))
        .collect();
    unique.into_iter().collect()
}
