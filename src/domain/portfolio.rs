//! Cash, open positions, the trade ledger and the equity curve of one run.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::error::StateError;
use super::execution::Fill;
use super::position::{ExitReason, Position, PositionTracker, Trade, TradeLedger};
use super::risk::OrderIntent;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    tracker: PositionTracker,
    ledger: TradeLedger,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            tracker: PositionTracker::new(),
            ledger: TradeLedger::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn positions(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn trades(&self) -> &[Trade] {
        self.ledger.trades()
    }

    pub fn has_position(&self, code: &str) -> bool {
        self.tracker.contains(code)
    }

    /// Book a filled entry. Both longs and shorts reserve their entry
    /// notional from cash.
    pub fn open_position(&mut self, intent: &OrderIntent, fill: &Fill) -> Result<&Position, StateError> {
        let position = self.tracker.open(intent, fill)?;
        self.cash -= position.entry_notional();
        Ok(position)
    }

    /// Close a position, release its settlement value into cash and append
    /// the trade to the ledger.
    pub fn close_position(
        &mut self,
        code: &str,
        exit_price: f64,
        timestamp: NaiveDateTime,
        reason: ExitReason,
    ) -> Result<Trade, StateError> {
        let trade = self.tracker.close(code, exit_price, timestamp, reason)?;
        self.cash += trade.quantity as f64 * trade.entry_price + trade.realized_pnl;
        self.ledger.append(trade.clone());
        Ok(trade)
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Cash plus every open position marked at its last known price, or at
    /// entry when none is known yet.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .tracker
            .iter()
            .map(|pos| {
                let price = price_map.get(&pos.code).copied().unwrap_or(pos.entry_price);
                pos.settlement_value(price)
            })
            .sum();
        self.cash + position_value
    }
}
