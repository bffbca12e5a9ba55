//! Simulated fills for the backtest.
//!
//! Signal-driven market orders fill at the bar close moved against the trader
//! by `slippage_pct`. Bracket exits and forced closes do not go through the
//! execution port; they settle at their level or the final close.

use chrono::NaiveDateTime;

use super::ohlcv::OhlcvBar;
use super::risk::{OrderIntent, OrderSide};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    /// Adverse price move per fill as a fraction (0.001 = 0.1%).
    pub slippage_pct: f64,
}

/// Buying fills above the market.
pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct)
}

/// Selling fills below the market.
pub fn apply_slippage_sell(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub code: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
    pub timestamp: NaiveDateTime,
}

/// Fills every order in full on the bar it was placed.
/// Holds no state between orders, so repeated runs see identical fills.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecution {
    config: ExecutionConfig,
}

impl SimulatedExecution {
    pub fn new(config: ExecutionConfig) -> Self {
        SimulatedExecution { config }
    }
}

impl ExecutionPort for SimulatedExecution {
    fn quote(&self, side: OrderSide, bar: &OhlcvBar) -> f64 {
        match side {
            OrderSide::Buy => apply_slippage_buy(bar.close, self.config.slippage_pct),
            OrderSide::Sell => apply_slippage_sell(bar.close, self.config.slippage_pct),
        }
    }

    fn submit(&mut self, intent: &OrderIntent, bar: &OhlcvBar) -> Option<Fill> {
        if intent.quantity == 0 {
            return None;
        }
        Some(Fill {
            code: intent.code.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price: self.quote(intent.side, bar),
            timestamp: bar.timestamp,
        })
    }
}
