//! Backtest configuration and the timestamp-aligned simulation loop.
//!
//! Every step of the merged timeline runs in a fixed order:
//! 1. accept at most one bar per instrument and update its indicators
//! 2. score instruments that have both a current and a previous snapshot
//! 3. exits: bracket levels first, then opposing signals
//! 4. entries, in input order, skipping anything closed in step 3
//! 5. mark the portfolio to market
//!
//! Open positions are force-closed at each instrument's final close once the
//! timeline is exhausted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDateTime;
use log::{debug, info, warn};

use super::code_data::{CodeData, build_unified_timeline};
use super::config_validation::validate_backtest_config;
use super::error::{ConfluenceError, DataErrorKind, DataIssue};
use super::execution::{ExecutionConfig, SimulatedExecution};
use super::indicator::snapshot::{IndicatorEngine, IndicatorParams, IndicatorSnapshot};
use super::ohlcv::OhlcvBar;
use super::portfolio::Portfolio;
use super::position::{ExitReason, Trade};
use super::risk::{Account, OrderSide, RiskManager, RiskParams, Veto};
use super::signal::{Action, Signal, SignalGenerator, SignalParams};
use crate::ports::execution_port::ExecutionPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub indicators: IndicatorParams,
    pub signal: SignalParams,
    pub risk: RiskParams,
    pub execution: ExecutionConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            indicators: IndicatorParams::default(),
            signal: SignalParams::default(),
            risk: RiskParams::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

/// Lifecycle of one instrument inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Not enough bars yet for a complete snapshot.
    Warming,
    /// Producing snapshots and signals.
    Active,
    /// Timeline exhausted and any position force-closed.
    Finished,
}

impl fmt::Display for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationState::Warming => write!(f, "warming"),
            SimulationState::Active => write!(f, "active"),
            SimulationState::Finished => write!(f, "finished"),
        }
    }
}

/// A signal the risk manager refused.
#[derive(Debug, Clone, PartialEq)]
pub struct VetoEvent {
    pub code: String,
    pub timestamp: NaiveDateTime,
    pub action: Action,
    pub veto: Veto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSummary {
    pub code: String,
    pub bars_accepted: usize,
    pub bars_rejected: usize,
    /// First bar with a complete indicator snapshot.
    pub active_from: Option<NaiveDateTime>,
    /// `Warming` if the instrument never produced a snapshot.
    pub final_state: SimulationState,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub vetoes: Vec<VetoEvent>,
    pub data_issues: Vec<DataIssue>,
    pub instruments: Vec<InstrumentSummary>,
    pub signals_generated: usize,
    pub steps: usize,
}

impl BacktestResult {
    pub fn trades(&self) -> &[Trade] {
        self.portfolio.trades()
    }

    pub fn final_equity(&self) -> f64 {
        self.portfolio
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.portfolio.cash)
    }
}

/// Per-instrument stream position and indicator state.
struct InstrumentRun {
    engine: IndicatorEngine,
    cursor: usize,
    last_accepted: Option<NaiveDateTime>,
    last_bar: Option<OhlcvBar>,
    previous: Option<IndicatorSnapshot>,
    state: SimulationState,
    summary: InstrumentSummary,
}

impl InstrumentRun {
    fn new(code: &str, params: &IndicatorParams) -> Self {
        InstrumentRun {
            engine: IndicatorEngine::new(params),
            cursor: 0,
            last_accepted: None,
            last_bar: None,
            previous: None,
            state: SimulationState::Warming,
            summary: InstrumentSummary {
                code: code.to_string(),
                bars_accepted: 0,
                bars_rejected: 0,
                active_from: None,
                final_state: SimulationState::Warming,
            },
        }
    }

    /// Take this instrument's bar for `timestamp`, rejecting anything that
    /// does not move strictly forward or is malformed.
    fn take_bar(
        &mut self,
        code: &str,
        bars: &[OhlcvBar],
        timestamp: NaiveDateTime,
        issues: &mut Vec<DataIssue>,
    ) -> Option<OhlcvBar> {
        while let Some(bar) = bars.get(self.cursor) {
            let kind = match self.last_accepted {
                Some(last) if bar.timestamp == last => Some(DataErrorKind::Duplicate),
                Some(last) if bar.timestamp < last => Some(DataErrorKind::OutOfOrder),
                _ if bar.timestamp < timestamp => Some(DataErrorKind::OutOfOrder),
                _ => None,
            };
            if let Some(kind) = kind {
                self.reject(code, bar.timestamp, kind, issues);
                self.cursor += 1;
                continue;
            }
            if bar.timestamp > timestamp {
                return None;
            }

            self.cursor += 1;
            if !bar.is_well_formed() {
                self.reject(code, bar.timestamp, DataErrorKind::Malformed, issues);
                return None;
            }
            self.last_accepted = Some(bar.timestamp);
            self.summary.bars_accepted += 1;
            return Some(bar.clone());
        }
        None
    }

    /// Reject whatever the timeline walk never reached.
    fn drain(&mut self, code: &str, bars: &[OhlcvBar], issues: &mut Vec<DataIssue>) {
        while let Some(bar) = bars.get(self.cursor) {
            let kind = match self.last_accepted {
                Some(last) if bar.timestamp == last => DataErrorKind::Duplicate,
                _ => DataErrorKind::OutOfOrder,
            };
            self.reject(code, bar.timestamp, kind, issues);
            self.cursor += 1;
        }
    }

    fn reject(
        &mut self,
        code: &str,
        timestamp: NaiveDateTime,
        kind: DataErrorKind,
        issues: &mut Vec<DataIssue>,
    ) {
        warn!("{}: skipping {} at {}", code, kind, timestamp);
        self.summary.bars_rejected += 1;
        issues.push(DataIssue {
            code: code.to_string(),
            timestamp,
            kind,
        });
    }
}

/// What one instrument contributed to the current step.
struct StepInput {
    index: usize,
    bar: OhlcvBar,
    signal: Option<Signal>,
}

pub struct Simulator<E: ExecutionPort = SimulatedExecution> {
    config: BacktestConfig,
    signals: SignalGenerator,
    risk: RiskManager,
    execution: E,
}

impl Simulator<SimulatedExecution> {
    pub fn new(config: BacktestConfig) -> Result<Self, ConfluenceError> {
        let execution = SimulatedExecution::new(config.execution.clone());
        Self::with_execution(config, execution)
    }
}

impl<E: ExecutionPort> Simulator<E> {
    pub fn with_execution(config: BacktestConfig, execution: E) -> Result<Self, ConfluenceError> {
        validate_backtest_config(&config)?;
        Ok(Simulator {
            signals: SignalGenerator::new(&config.signal),
            risk: RiskManager::new(config.risk.clone()),
            config,
            execution,
        })
    }

    /// Replace the built-in contributors.
    pub fn with_signal_generator(mut self, signals: SignalGenerator) -> Self {
        self.signals = signals;
        self
    }

    /// Run one backtest over `data`. Each call starts from a fresh
    /// portfolio, so repeated runs over the same data are identical.
    pub fn run(&mut self, data: &[CodeData]) -> BacktestResult {
        let timeline = build_unified_timeline(data);
        info!(
            "backtest: {} instruments, {} steps, warmup {} bars",
            data.len(),
            timeline.len(),
            self.config.indicators.min_history()
        );

        let mut portfolio = Portfolio::new(self.config.initial_capital);
        let mut runs: Vec<InstrumentRun> = data
            .iter()
            .map(|cd| InstrumentRun::new(&cd.code, &self.config.indicators))
            .collect();
        let mut last_close: HashMap<String, f64> = HashMap::new();
        let mut vetoes = Vec::new();
        let mut issues = Vec::new();
        let mut signals_generated = 0;

        for &timestamp in &timeline {
            let mut step = Vec::new();
            for (index, (cd, run)) in data.iter().zip(runs.iter_mut()).enumerate() {
                let Some(bar) = run.take_bar(&cd.code, &cd.bars, timestamp, &mut issues) else {
                    continue;
                };
                let snapshot = run.engine.update(&bar);
                let signal = match (&snapshot, &run.previous) {
                    (Some(current), Some(previous)) => {
                        signals_generated += 1;
                        Some(self.signals.generate(&cd.code, current, previous, bar.close))
                    }
                    _ => None,
                };
                if snapshot.is_some() && run.state == SimulationState::Warming {
                    run.state = SimulationState::Active;
                    run.summary.active_from = Some(bar.timestamp);
                    info!(
                        "{}: indicators ready after {} bars at {}",
                        cd.code,
                        run.engine.bars_seen(),
                        bar.timestamp
                    );
                }
                run.previous = snapshot;
                run.last_bar = Some(bar.clone());
                last_close.insert(cd.code.clone(), bar.close);
                step.push(StepInput { index, bar, signal });
            }

            let held_at_start: HashSet<usize> = step
                .iter()
                .filter(|s| portfolio.has_position(&data[s.index].code))
                .map(|s| s.index)
                .collect();

            for input in step.iter().filter(|s| held_at_start.contains(&s.index)) {
                self.process_exit(input, &data[input.index].code, &mut portfolio, &last_close, &mut vetoes);
            }

            let equity = portfolio.total_equity(&last_close);
            for input in step.iter().filter(|s| !held_at_start.contains(&s.index)) {
                self.process_entry(input, equity, &mut portfolio, &mut vetoes);
            }

            let equity = portfolio.total_equity(&last_close);
            portfolio.record_equity(timestamp, equity);
        }

        for (cd, run) in data.iter().zip(runs.iter_mut()) {
            run.drain(&cd.code, &cd.bars, &mut issues);
            if let Some(bar) = &run.last_bar {
                if portfolio.has_position(&cd.code) {
                    match portfolio.close_position(&cd.code, bar.close, bar.timestamp, ExitReason::ForcedClose) {
                        Ok(trade) => info!(
                            "{}: forced close at {:.4} ({:+.2})",
                            trade.code, trade.exit_price, trade.realized_pnl
                        ),
                        Err(e) => warn!("{}: {}", cd.code, e),
                    }
                }
            }
            if run.state == SimulationState::Active {
                run.state = SimulationState::Finished;
            }
            run.summary.final_state = run.state;
        }

        info!(
            "backtest finished: {} trades, {} vetoes, {} data issues",
            portfolio.trades().len(),
            vetoes.len(),
            issues.len()
        );

        BacktestResult {
            portfolio,
            vetoes,
            data_issues: issues,
            instruments: runs.into_iter().map(|r| r.summary).collect(),
            signals_generated,
            steps: timeline.len(),
        }
    }

    fn process_exit(
        &mut self,
        input: &StepInput,
        code: &str,
        portfolio: &mut Portfolio,
        last_close: &HashMap<String, f64>,
        vetoes: &mut Vec<VetoEvent>,
    ) {
        let Some(position) = portfolio.positions().get(code) else {
            return;
        };

        if let Some((price, reason)) = self.risk.check_exit(position, &input.bar) {
            close(portfolio, code, price, input.bar.timestamp, reason);
            return;
        }

        let Some(signal) = &input.signal else {
            return;
        };
        if signal.action == Action::Hold {
            return;
        }

        let side = position.side.exit_order();
        let price = self.execution.quote(side, &input.bar);
        let account = Account {
            equity: portfolio.total_equity(last_close),
            cash: portfolio.cash,
        };
        match self.risk.evaluate(signal, price, account, portfolio.positions()) {
            Ok(intent) => match self.execution.submit(&intent, &input.bar) {
                Some(fill) => close(portfolio, code, fill.price, fill.timestamp, ExitReason::SignalReversal),
                None => warn!("{}: exit order not filled at {}", code, input.bar.timestamp),
            },
            Err(veto) => record_veto(vetoes, signal, veto),
        }
    }

    fn process_entry(
        &mut self,
        input: &StepInput,
        equity: f64,
        portfolio: &mut Portfolio,
        vetoes: &mut Vec<VetoEvent>,
    ) {
        let Some(signal) = &input.signal else {
            return;
        };
        let side = match signal.action {
            Action::Hold => return,
            Action::Buy => OrderSide::Buy,
            Action::Sell => OrderSide::Sell,
        };

        let price = self.execution.quote(side, &input.bar);
        let account = Account {
            equity,
            cash: portfolio.cash,
        };
        let intent = match self.risk.evaluate(signal, price, account, portfolio.positions()) {
            Ok(intent) => intent,
            Err(veto) => {
                record_veto(vetoes, signal, veto);
                return;
            }
        };

        let Some(fill) = self.execution.submit(&intent, &input.bar) else {
            warn!("{}: entry order not filled at {}", signal.code, input.bar.timestamp);
            return;
        };
        match portfolio.open_position(&intent, &fill) {
            Ok(position) => info!(
                "{}: open {} {} @ {:.4} (stop {:?}, target {:?})",
                position.code,
                position.side,
                position.quantity,
                position.entry_price,
                position.stop_loss,
                position.take_profit
            ),
            Err(e) => warn!("{}: {}", signal.code, e),
        }
    }
}

fn close(
    portfolio: &mut Portfolio,
    code: &str,
    price: f64,
    timestamp: NaiveDateTime,
    reason: ExitReason,
) {
    match portfolio.close_position(code, price, timestamp, reason) {
        Ok(trade) => info!(
            "{}: close {} @ {:.4} ({}, {:+.2})",
            trade.code, trade.side, trade.exit_price, trade.exit_reason, trade.realized_pnl
        ),
        Err(e) => warn!("{}: {}", code, e),
    }
}

fn record_veto(vetoes: &mut Vec<VetoEvent>, signal: &Signal, veto: Veto) {
    debug!("{}: {} vetoed at {}: {}", signal.code, signal.action, signal.timestamp, veto);
    vetoes.push(VetoEvent {
        code: signal.code.clone(),
        timestamp: signal.timestamp,
        action: signal.action,
        veto,
    });
}
