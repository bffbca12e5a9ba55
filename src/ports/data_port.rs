//! Data access port trait.

use crate::domain::error::ConfluenceError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` in source order, limited to the inclusive date range
    /// when bounds are given.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError>;
}
