//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, Simulator};
use crate::domain::config_validation::{
    parse_optional_date, validate_backtest_config, validate_config_file,
};
use crate::domain::error::ConfluenceError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::snapshot::IndicatorParams;
use crate::domain::metrics::{CodeResult, Metrics};
use crate::domain::risk::RiskParams;
use crate::domain::signal::{SignalParams, Weights};
use crate::domain::sweep::{run_sweep, threshold_grid};
use crate::domain::universe::{LoadedUniverse, load_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "confluence", about = "Indicator-confluence signal backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single code instead of the configured list
        #[arg(long)]
        code: Option<String>,
        /// Write the trade ledger as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration and print the resolved parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run one backtest per signal threshold and compare them
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        thresholds: Vec<f64>,
        #[arg(long)]
        code: Option<String>,
        /// Run the simulations one after another
        #[arg(long)]
        sequential: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            code,
            output,
        } => run_backtest(&config, code.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            thresholds,
            code,
            sequential,
        } => run_threshold_sweep(&config, &thresholds, code.as_deref(), !sequential),
    }
}

fn fail(err: ConfluenceError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Reads a float, failing when the key is present but not a number.
fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ConfluenceError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            ConfluenceError::invalid(section, key, format!("{} must be a number", key))
        }),
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, ConfluenceError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            ConfluenceError::invalid(
                section,
                key,
                format!("{} must be a non-negative integer", key),
            )
        }),
    }
}

/// Builds the typed configuration from `[backtest]`, `[indicators]`,
/// `[weights]`, `[signal]` and `[risk]`, then validates it.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, ConfluenceError> {
    let defaults = BacktestConfig::default();
    let ind = &defaults.indicators;
    let sig = &defaults.signal;
    let risk = &defaults.risk;

    let indicators = IndicatorParams {
        rsi_period: read_usize(config, "indicators", "rsi_period", ind.rsi_period)?,
        macd_fast: read_usize(config, "indicators", "macd_fast", ind.macd_fast)?,
        macd_slow: read_usize(config, "indicators", "macd_slow", ind.macd_slow)?,
        macd_signal: read_usize(config, "indicators", "macd_signal", ind.macd_signal)?,
        bb_period: read_usize(config, "indicators", "bb_period", ind.bb_period)?,
        bb_stddev: read_double(config, "indicators", "bb_stddev", ind.bb_stddev)?,
        ema_fast: read_usize(config, "indicators", "ema_fast", ind.ema_fast)?,
        ema_slow: read_usize(config, "indicators", "ema_slow", ind.ema_slow)?,
        volume_period: read_usize(config, "indicators", "volume_period", ind.volume_period)?,
    };

    let weights = Weights {
        rsi: read_double(config, "weights", "rsi", sig.weights.rsi)?,
        macd: read_double(config, "weights", "macd", sig.weights.macd)?,
        bollinger: read_double(config, "weights", "bollinger", sig.weights.bollinger)?,
        ema_cross: read_double(config, "weights", "ema_cross", sig.weights.ema_cross)?,
        volume: read_double(config, "weights", "volume", sig.weights.volume)?,
        trend: read_double(config, "weights", "trend", sig.weights.trend)?,
    };

    let signal = SignalParams {
        weights,
        threshold: read_double(config, "signal", "threshold", sig.threshold)?,
        rsi_oversold: read_double(config, "indicators", "rsi_oversold", sig.rsi_oversold)?,
        rsi_overbought: read_double(config, "indicators", "rsi_overbought", sig.rsi_overbought)?,
        volume_multiplier: read_double(
            config,
            "indicators",
            "volume_multiplier",
            sig.volume_multiplier,
        )?,
    };

    let risk = RiskParams {
        position_size_pct: read_double(config, "risk", "position_size_pct", risk.position_size_pct)?,
        stop_loss_pct: read_double(config, "risk", "stop_loss_pct", risk.stop_loss_pct)?,
        take_profit_pct: read_double(config, "risk", "take_profit_pct", risk.take_profit_pct)?,
        max_positions: read_usize(config, "risk", "max_positions", risk.max_positions)?,
        allow_shorting: config.get_bool("backtest", "allow_shorting", risk.allow_shorting),
    };

    let bt_config = BacktestConfig {
        initial_capital: read_double(
            config,
            "backtest",
            "initial_capital",
            defaults.initial_capital,
        )?,
        indicators,
        signal,
        risk,
        execution: ExecutionConfig {
            slippage_pct: read_double(
                config,
                "backtest",
                "slippage_pct",
                defaults.execution.slippage_pct,
            )?,
        },
    };

    validate_backtest_config(&bt_config)?;
    Ok(bt_config)
}

/// `--code` wins over `[backtest] codes`, which wins over `[backtest] code`.
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, ConfluenceError> {
    let raw = code_override
        .map(str::to_string)
        .or_else(|| {
            config
                .get_string("backtest", "codes")
                .filter(|s| !s.trim().is_empty())
        })
        .or_else(|| config.get_string("backtest", "code"))
        .ok_or_else(|| ConfluenceError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        })?;

    Ok(parse_codes(&raw)?)
}

/// Everything a run needs, resolved from one config file.
struct RunSetup {
    bt_config: BacktestConfig,
    codes: Vec<String>,
    data_dir: PathBuf,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

fn prepare(config: &dyn ConfigPort, code_override: Option<&str>) -> Result<RunSetup, ConfluenceError> {
    validate_config_file(config)?;
    let bt_config = build_backtest_config(config)?;
    let codes = resolve_codes(code_override, config)?;
    let data_dir = config
        .get_string("backtest", "data_dir")
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| ConfluenceError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        })?;

    Ok(RunSetup {
        bt_config,
        codes,
        data_dir,
        start_date: parse_optional_date(config, "start_date")?,
        end_date: parse_optional_date(config, "end_date")?,
    })
}

fn load_data(setup: &RunSetup, data_port: &dyn DataPort) -> Result<LoadedUniverse, ConfluenceError> {
    eprintln!(
        "Loading {} codes from {}...",
        setup.codes.len(),
        setup.data_dir.display()
    );
    let min_bars = setup.bt_config.indicators.min_history() + 1;
    let universe = load_universe(
        data_port,
        &setup.codes,
        setup.start_date,
        setup.end_date,
        min_bars,
    )?;
    for skipped in &universe.skipped {
        eprintln!("  skipped {} ({})", skipped.code, skipped.reason);
    }
    Ok(universe)
}

fn run_backtest(config_path: &Path, code_override: Option<&str>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let setup = match prepare(&adapter, code_override) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(setup.data_dir.clone());
    let universe = match load_data(&setup, &data_port) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    let mut simulator = match Simulator::new(setup.bt_config.clone()) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("Running backtest: {} codes", universe.data.len());
    let result = simulator.run(&universe.data);

    print_summary(&result, setup.bt_config.initial_capital);

    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter::new().write_trades(result.trades(), path) {
            return fail(e);
        }
        eprintln!("\nTrade ledger written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, initial_capital: f64) {
    let metrics = Metrics::compute(result.trades(), initial_capital);
    let code_results = CodeResult::compute_per_code(result.trades());

    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Steps:            {}", result.steps);
    eprintln!("Signals:          {}", result.signals_generated);
    eprintln!("Vetoes:           {}", result.vetoes.len());
    eprintln!("Rejected Bars:    {}", result.data_issues.len());
    eprintln!("Final Equity:     {:.2}", result.final_equity());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!(
        "Total Trades:     {} ({} won, {} lost, {} flat)",
        metrics.total_trades, metrics.trades_won, metrics.trades_lost, metrics.trades_breakeven
    );
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Win:          {:.2}", metrics.avg_win);
    eprintln!("Avg Loss:         {:.2}", metrics.avg_loss);
    eprintln!("Avg Holding:      {:.1}h", metrics.avg_trade_duration);

    if !code_results.is_empty() {
        eprintln!("\n=== Per-Code Summary ===");
        for cr in &code_results {
            let pnl_sign = if cr.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}${:.2}",
                cr.code,
                cr.total_trades,
                cr.win_rate * 100.0,
                pnl_sign,
                cr.total_pnl,
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let setup = match prepare(&adapter, None) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let cfg = &setup.bt_config;

    eprintln!("\nUniverse:");
    eprintln!("  data_dir: {}", setup.data_dir.display());
    eprintln!("  codes: {}", setup.codes.join(", "));
    if let Some(start) = setup.start_date {
        eprintln!("  start_date: {}", start);
    }
    if let Some(end) = setup.end_date {
        eprintln!("  end_date: {}", end);
    }

    eprintln!("\nIndicators:");
    for indicator in cfg.indicators.indicator_types() {
        eprintln!("  {}", indicator);
    }
    eprintln!("  warm-up: {} bars", cfg.indicators.min_history());

    let w = &cfg.signal.weights;
    eprintln!("\nSignal:");
    eprintln!(
        "  weights: rsi={} macd={} bollinger={} ema_cross={} volume={} trend={}",
        w.rsi, w.macd, w.bollinger, w.ema_cross, w.volume, w.trend
    );
    eprintln!("  threshold: {}", cfg.signal.threshold);
    eprintln!(
        "  rsi bands: {} / {}",
        cfg.signal.rsi_oversold, cfg.signal.rsi_overbought
    );

    eprintln!("\nRisk:");
    eprintln!("  initial_capital: {:.2}", cfg.initial_capital);
    eprintln!("  position_size_pct: {}", cfg.risk.position_size_pct);
    eprintln!("  stop_loss_pct: {}", cfg.risk.stop_loss_pct);
    eprintln!("  take_profit_pct: {}", cfg.risk.take_profit_pct);
    eprintln!("  max_positions: {}", cfg.risk.max_positions);
    eprintln!("  allow_shorting: {}", cfg.risk.allow_shorting);
    eprintln!("  slippage_pct: {}", cfg.execution.slippage_pct);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_threshold_sweep(
    config_path: &Path,
    thresholds: &[f64],
    code_override: Option<&str>,
    parallel: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let setup = match prepare(&adapter, code_override) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(setup.data_dir.clone());
    let universe = match load_data(&setup, &data_port) {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    let configs = threshold_grid(&setup.bt_config, thresholds);
    eprintln!("Running {} simulations...", configs.len());
    let outcomes = match run_sweep(&universe.data, &configs, parallel) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    println!(
        "{:>9}  {:>6}  {:>8}  {:>8}  {:>8}  {:>8}  {:>6}",
        "threshold", "trades", "win%", "return%", "maxdd%", "pf", "vetoes"
    );
    for outcome in &outcomes {
        let m = &outcome.metrics;
        println!(
            "{:>9.2}  {:>6}  {:>8.1}  {:>8.2}  {:>8.1}  {:>8.2}  {:>6}",
            outcome.config.signal.threshold,
            m.total_trades,
            m.win_rate * 100.0,
            m.total_return * 100.0,
            m.max_drawdown * 100.0,
            m.profit_factor,
            outcome.vetoes,
        );
    }

    ExitCode::SUCCESS
}
