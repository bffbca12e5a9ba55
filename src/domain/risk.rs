//! Turns signals into sized orders, or vetoes them.

use std::fmt;

use super::ohlcv::OhlcvBar;
use super::position::{ExitReason, Position, PositionSide, PositionTracker};
use super::signal::{Action, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
}

/// Order handed to the execution port. Entries carry the bracket levels.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub code: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub order_type: OrderType,
    /// Expected fill price used for sizing and the bracket.
    pub reference_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Veto {
    #[error("{open} positions open, maximum is {max}")]
    MaxPositionsReached { open: usize, max: usize },

    #[error("position already open for {0}")]
    AlreadyOpen(String),

    #[error("no position to close for {0}")]
    NoPosition(String),

    #[error("insufficient capital for {code} at {price:.4}")]
    InsufficientCapital { code: String, price: f64 },

    #[error("no actionable signal for {0}")]
    NoSignal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    /// Fraction of equity committed per entry.
    pub position_size_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_positions: usize,
    pub allow_shorting: bool,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            position_size_pct: 0.1,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            max_positions: 5,
            allow_shorting: false,
        }
    }
}

/// Funds available when an entry is sized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    /// Mark-to-market equity.
    pub equity: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskManager {
    params: RiskParams,
}

impl RiskManager {
    pub fn new(params: RiskParams) -> Self {
        RiskManager { params }
    }

    /// Map a signal onto an order given the open positions.
    ///
    /// BUY while flat opens a long; BUY on a short covers it. SELL on a long
    /// closes it; SELL while flat opens a short only when shorting is enabled.
    /// `price` is the expected fill price of the order.
    pub fn evaluate(
        &self,
        signal: &Signal,
        price: f64,
        account: Account,
        positions: &PositionTracker,
    ) -> Result<OrderIntent, Veto> {
        let code = &signal.code;
        match (signal.action, positions.get(code)) {
            (Action::Hold, _) => Err(Veto::NoSignal(code.clone())),
            (Action::Buy, Some(pos)) if pos.is_long() => Err(Veto::AlreadyOpen(code.clone())),
            (Action::Sell, Some(pos)) if pos.is_short() => Err(Veto::AlreadyOpen(code.clone())),
            (_, Some(pos)) => Ok(self.exit_intent(pos, price)),
            (Action::Buy, None) => self.entry_intent(code, PositionSide::Long, price, account, positions),
            (Action::Sell, None) if self.params.allow_shorting => {
                self.entry_intent(code, PositionSide::Short, price, account, positions)
            }
            (Action::Sell, None) => Err(Veto::NoPosition(code.clone())),
        }
    }

    fn entry_intent(
        &self,
        code: &str,
        side: PositionSide,
        price: f64,
        account: Account,
        positions: &PositionTracker,
    ) -> Result<OrderIntent, Veto> {
        if positions.len() >= self.params.max_positions {
            return Err(Veto::MaxPositionsReached {
                open: positions.len(),
                max: self.params.max_positions,
            });
        }

        let insufficient = || Veto::InsufficientCapital {
            code: code.to_string(),
            price,
        };
        if !(price > 0.0) {
            return Err(insufficient());
        }
        let quantity = (account.equity * self.params.position_size_pct / price).floor();
        if !(quantity >= 1.0) {
            return Err(insufficient());
        }
        if quantity * price > account.cash {
            return Err(insufficient());
        }

        let (stop_loss, take_profit) = self.bracket(side, price);
        Ok(OrderIntent {
            code: code.to_string(),
            side: side.entry_order(),
            quantity: quantity as u64,
            order_type: OrderType::Market,
            reference_price: price,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        })
    }

    fn exit_intent(&self, position: &Position, price: f64) -> OrderIntent {
        OrderIntent {
            code: position.code.clone(),
            side: position.side.exit_order(),
            quantity: position.quantity,
            order_type: OrderType::Market,
            reference_price: price,
            stop_loss: None,
            take_profit: None,
        }
    }

    /// (stop-loss, take-profit) around an entry price.
    pub fn bracket(&self, side: PositionSide, entry_price: f64) -> (f64, f64) {
        let stop = self.params.stop_loss_pct;
        let target = self.params.take_profit_pct;
        match side {
            PositionSide::Long => (entry_price * (1.0 - stop), entry_price * (1.0 + target)),
            PositionSide::Short => (entry_price * (1.0 + stop), entry_price * (1.0 - target)),
        }
    }

    /// Bracket exit for this bar, if any. The stop wins when both levels
    /// fall inside the bar's range.
    pub fn check_exit(&self, position: &Position, bar: &OhlcvBar) -> Option<(f64, ExitReason)> {
        if position.stop_hit(bar) {
            position.stop_loss.map(|p| (p, ExitReason::StopLoss))
        } else if position.target_hit(bar) {
            position.take_profit.map(|p| (p, ExitReason::TakeProfit))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::Fill;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::BTreeMap;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn signal(code: &str, action: Action) -> Signal {
        Signal {
            code: code.into(),
            timestamp: ts(),
            action,
            score: match action {
                Action::Buy => 5.0,
                Action::Sell => -5.0,
                Action::Hold => 0.0,
            },
            contributions: BTreeMap::new(),
        }
    }

    fn account(equity: f64) -> Account {
        Account { equity, cash: equity }
    }

    fn open(tracker: &mut PositionTracker, manager: &RiskManager, code: &str, action: Action) {
        let intent = manager
            .evaluate(&signal(code, action), 100.0, account(100_000.0), tracker)
            .unwrap();
        let fill = Fill {
            code: code.into(),
            side: intent.side,
            quantity: intent.quantity,
            price: 100.0,
            timestamp: ts(),
        };
        tracker.open(&intent, &fill).unwrap();
    }

    fn bar(high: f64, low: f64) -> OhlcvBar {
        OhlcvBar {
            code: "BHP".into(),
            timestamp: ts(),
            open: 100.0,
            high,
            low,
            close: 100.0,
            volume: 500.0,
        }
    }

    #[test]
    fn buy_sizes_from_equity_fraction() {
        let manager = RiskManager::new(RiskParams::default());
        let intent = manager
            .evaluate(&signal("BHP", Action::Buy), 33.0, account(10_000.0), &PositionTracker::new())
            .unwrap();

        // floor(10000 * 0.1 / 33) = 30
        assert_eq!(intent.quantity, 30);
        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.order_type, OrderType::Market);
        assert!(intent.quantity as f64 * 33.0 <= 10_000.0 * 0.1);
        assert!((intent.stop_loss.unwrap() - 33.0 * 0.98).abs() < 1e-12);
        assert!((intent.take_profit.unwrap() - 33.0 * 1.04).abs() < 1e-12);
    }

    #[test]
    fn hold_is_vetoed() {
        let manager = RiskManager::new(RiskParams::default());
        let veto = manager
            .evaluate(&signal("BHP", Action::Hold), 100.0, account(10_000.0), &PositionTracker::new())
            .unwrap_err();
        assert_eq!(veto, Veto::NoSignal("BHP".into()));
    }

    #[test]
    fn quantity_below_one_share_is_insufficient_capital() {
        let manager = RiskManager::new(RiskParams::default());
        let veto = manager
            .evaluate(&signal("BHP", Action::Buy), 5_000.0, account(10_000.0), &PositionTracker::new())
            .unwrap_err();
        assert!(matches!(veto, Veto::InsufficientCapital { .. }));
    }

    #[test]
    fn cash_must_cover_notional() {
        let manager = RiskManager::new(RiskParams::default());
        let veto = manager
            .evaluate(
                &signal("BHP", Action::Buy),
                100.0,
                Account {
                    equity: 100_000.0,
                    cash: 500.0,
                },
                &PositionTracker::new(),
            )
            .unwrap_err();
        assert!(matches!(veto, Veto::InsufficientCapital { .. }));
    }

    #[test]
    fn second_buy_is_already_open() {
        let manager = RiskManager::new(RiskParams::default());
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Buy);

        let veto = manager
            .evaluate(&signal("BHP", Action::Buy), 100.0, account(100_000.0), &tracker)
            .unwrap_err();
        assert_eq!(veto, Veto::AlreadyOpen("BHP".into()));
    }

    #[test]
    fn max_positions_caps_new_entries() {
        let manager = RiskManager::new(RiskParams {
            max_positions: 2,
            ..RiskParams::default()
        });
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Buy);
        open(&mut tracker, &manager, "CBA", Action::Buy);

        let veto = manager
            .evaluate(&signal("WBC", Action::Buy), 100.0, account(100_000.0), &tracker)
            .unwrap_err();
        assert_eq!(veto, Veto::MaxPositionsReached { open: 2, max: 2 });
    }

    #[test]
    fn sell_closes_long_even_at_max_positions() {
        let manager = RiskManager::new(RiskParams {
            max_positions: 1,
            ..RiskParams::default()
        });
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Buy);
        let qty = tracker.get("BHP").unwrap().quantity;

        let intent = manager
            .evaluate(&signal("BHP", Action::Sell), 101.0, account(100_000.0), &tracker)
            .unwrap();
        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.quantity, qty);
        assert_eq!(intent.stop_loss, None);
    }

    #[test]
    fn sell_when_flat_without_shorting_is_no_position() {
        let manager = RiskManager::new(RiskParams::default());
        let veto = manager
            .evaluate(&signal("BHP", Action::Sell), 100.0, account(10_000.0), &PositionTracker::new())
            .unwrap_err();
        assert_eq!(veto, Veto::NoPosition("BHP".into()));
    }

    #[test]
    fn sell_when_flat_with_shorting_opens_short() {
        let manager = RiskManager::new(RiskParams {
            allow_shorting: true,
            ..RiskParams::default()
        });
        let intent = manager
            .evaluate(&signal("BHP", Action::Sell), 100.0, account(10_000.0), &PositionTracker::new())
            .unwrap();
        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.quantity, 10);
        assert!((intent.stop_loss.unwrap() - 102.0).abs() < 1e-9);
        assert!((intent.take_profit.unwrap() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn buy_covers_short() {
        let manager = RiskManager::new(RiskParams {
            allow_shorting: true,
            ..RiskParams::default()
        });
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Sell);

        let intent = manager
            .evaluate(&signal("BHP", Action::Buy), 99.0, account(100_000.0), &tracker)
            .unwrap();
        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.stop_loss, None);
    }

    #[test]
    fn stop_wins_when_both_levels_in_bar() {
        let manager = RiskManager::new(RiskParams::default());
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Buy);
        let position = tracker.get("BHP").unwrap();

        let (price, reason) = manager.check_exit(position, &bar(105.0, 97.0)).unwrap();
        assert_eq!(reason, ExitReason::StopLoss);
        assert!((price - 98.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_exit_at_level() {
        let manager = RiskManager::new(RiskParams::default());
        let mut tracker = PositionTracker::new();
        open(&mut tracker, &manager, "BHP", Action::Buy);
        let position = tracker.get("BHP").unwrap();

        let (price, reason) = manager.check_exit(position, &bar(104.5, 99.0)).unwrap();
        assert_eq!(reason, ExitReason::TakeProfit);
        assert!((price - 104.0).abs() < 1e-9);
        assert_eq!(manager.check_exit(position, &bar(103.0, 99.0)), None);
    }
}
