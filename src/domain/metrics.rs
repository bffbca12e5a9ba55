//! Performance metrics computed from the trade ledger.

use super::position::Trade;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub net_pnl: f64,
    /// Sum of realized P&L over initial equity.
    pub total_return: f64,
    pub final_equity: f64,
    pub win_rate: f64,
    /// Gross profit over gross loss. Infinite when no trade lost money,
    /// zero when there are no trades.
    pub profit_factor: f64,
    /// Largest peak-to-trough fall of realized equity, as a fraction of the
    /// peak.
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean holding period in hours.
    pub avg_trade_duration: f64,
}

impl Metrics {
    pub fn compute(trades: &[Trade], initial_equity: f64) -> Self {
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_secs = 0i64;

        for trade in trades {
            let pnl = trade.realized_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_duration_secs += trade.holding_period().num_seconds();
        }

        let total_trades = trades.len();
        let net_pnl: f64 = trades.iter().map(|t| t.realized_pnl).sum();

        let total_return = if initial_equity > 0.0 {
            net_pnl / initial_equity
        } else {
            0.0
        };

        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_trades == 0 {
            0.0
        } else if trades_lost == 0 {
            f64::INFINITY
        } else {
            total_wins / total_losses
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_trade_duration = if total_trades > 0 {
            total_duration_secs as f64 / 3600.0 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            net_pnl,
            total_return,
            final_equity: initial_equity + net_pnl,
            win_rate,
            profit_factor,
            max_drawdown: compute_drawdown(trades, initial_equity),
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_trade_duration,
        }
    }
}

/// Drawdown of the equity built by applying trades in exit order. Trades
/// exiting at the same timestamp keep their ledger order.
fn compute_drawdown(trades: &[Trade], initial_equity: f64) -> f64 {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_timestamp);

    let mut equity = initial_equity;
    let mut peak = initial_equity;
    let mut max_dd = 0.0_f64;

    for trade in ordered {
        equity += trade.realized_pnl;
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
        }
    }

    max_dd
}

/// Trade summary for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeResult {
    pub code: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl CodeResult {
    /// One entry per traded code, sorted by code.
    pub fn compute_per_code(trades: &[Trade]) -> Vec<CodeResult> {
        let mut by_code: BTreeMap<&str, Vec<&Trade>> = BTreeMap::new();
        for trade in trades {
            by_code.entry(trade.code.as_str()).or_default().push(trade);
        }

        by_code
            .into_iter()
            .map(|(code, trades)| {
                let winning_trades = trades.iter().filter(|t| t.realized_pnl > 0.0).count();
                let losing_trades = trades.iter().filter(|t| t.realized_pnl < 0.0).count();
                let pnls = trades.iter().map(|t| t.realized_pnl);
                CodeResult {
                    code: code.to_string(),
                    total_trades: trades.len(),
                    winning_trades,
                    losing_trades,
                    total_pnl: pnls.clone().sum(),
                    win_rate: winning_trades as f64 / trades.len() as f64,
                    largest_win: pnls.clone().fold(0.0, f64::max),
                    largest_loss: pnls.map(|p| -p).fold(0.0, f64::max),
                }
            })
            .collect()
    }
}
