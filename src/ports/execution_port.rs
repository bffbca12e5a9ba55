//! Order sink port.

use crate::domain::execution::Fill;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::{OrderIntent, OrderSide};

/// Receives market orders and reports fills against the bar they were placed
/// on.
pub trait ExecutionPort {
    /// Price a market order on `side` would fill at on this bar.
    fn quote(&self, side: OrderSide, bar: &OhlcvBar) -> f64;

    /// `None` when the order was not filled.
    fn submit(&mut self, intent: &OrderIntent, bar: &OhlcvBar) -> Option<Fill>;
}
