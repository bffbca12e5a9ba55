//! Open positions, closed trades and the bookkeeping that moves one into the
//! other.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDateTime};

use super::error::StateError;
use super::execution::Fill;
use super::ohlcv::OhlcvBar;
use super::risk::{OrderIntent, OrderSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    /// Order side that opens a position on this side.
    pub fn entry_order(self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position on this side.
    pub fn exit_order(self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SignalReversal,
    ForcedClose,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::SignalReversal => write!(f, "signal_reversal"),
            ExitReason::ForcedClose => write!(f, "forced_close"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub side: PositionSide,
    pub quantity: u64,
    pub entry_price: f64,
    pub entry_timestamp: NaiveDateTime,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    pub fn entry_notional(&self) -> f64 {
        self.quantity as f64 * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity as f64 * self.side.sign()
    }

    /// Cash the position is worth if closed at `price`.
    pub fn settlement_value(&self, price: f64) -> f64 {
        self.entry_notional() + self.unrealized_pnl(price)
    }

    /// Whether the bar's adverse extreme reached the stop.
    pub fn stop_hit(&self, bar: &OhlcvBar) -> bool {
        match (self.stop_loss, self.side) {
            (Some(stop), PositionSide::Long) => bar.low <= stop,
            (Some(stop), PositionSide::Short) => bar.high >= stop,
            (None, _) => false,
        }
    }

    /// Whether the bar's favourable extreme reached the target.
    pub fn target_hit(&self, bar: &OhlcvBar) -> bool {
        match (self.take_profit, self.side) {
            (Some(target), PositionSide::Long) => bar.high >= target,
            (Some(target), PositionSide::Short) => bar.low <= target,
            (None, _) => false,
        }
    }
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub code: String,
    pub side: PositionSide,
    pub quantity: u64,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub realized_pnl: f64,
}

impl Trade {
    pub fn holding_period(&self) -> Duration {
        self.exit_timestamp - self.entry_timestamp
    }
}

/// One open position per instrument code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTracker {
    positions: BTreeMap<String, Position>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a position from a filled entry order. Fails without touching any
    /// state if the instrument already has one.
    pub fn open(&mut self, intent: &OrderIntent, fill: &Fill) -> Result<&Position, StateError> {
        if self.positions.contains_key(&intent.code) {
            return Err(StateError::AlreadyOpen(intent.code.clone()));
        }
        let side = match intent.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };
        let position = Position {
            code: intent.code.clone(),
            side,
            quantity: fill.quantity,
            entry_price: fill.price,
            entry_timestamp: fill.timestamp,
            stop_loss: intent.stop_loss,
            take_profit: intent.take_profit,
        };
        Ok(self
            .positions
            .entry(intent.code.clone())
            .or_insert(position))
    }

    /// Close the open position on `code` and compute its realized P&L.
    pub fn close(
        &mut self,
        code: &str,
        exit_price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Result<Trade, StateError> {
        let position = self
            .positions
            .remove(code)
            .ok_or_else(|| StateError::NotOpen(code.to_string()))?;

        Ok(Trade {
            realized_pnl: position.unrealized_pnl(exit_price),
            code: position.code,
            side: position.side,
            quantity: position.quantity,
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            exit_timestamp: timestamp,
            exit_price,
            exit_reason: reason,
        })
    }

    pub fn get(&self, code: &str) -> Option<&Position> {
        self.positions.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }
}

/// Append-only list of closed trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
