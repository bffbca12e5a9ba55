//! Configuration validation.
//!
//! `validate_config_file` checks the `[backtest]` keys that are not part of
//! the typed parameters; `validate_backtest_config` checks the typed
//! parameters and is run again by the simulator constructor.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::snapshot::IndicatorParams;
use crate::domain::risk::RiskParams;
use crate::domain::signal::SignalParams;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_config_file(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    validate_data_dir(config)?;
    validate_dates(config)
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), ConfluenceError> {
    if !(config.initial_capital > 0.0) {
        return Err(ConfluenceError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if !(config.execution.slippage_pct >= 0.0 && config.execution.slippage_pct < 1.0) {
        return Err(ConfluenceError::invalid(
            "backtest",
            "slippage_pct",
            "slippage_pct must be in [0, 1)",
        ));
    }
    validate_indicator_params(&config.indicators)?;
    validate_signal_params(&config.signal)?;
    validate_risk_params(&config.risk)?;
    Ok(())
}

pub fn validate_indicator_params(params: &IndicatorParams) -> Result<(), ConfluenceError> {
    let periods = [
        ("rsi_period", params.rsi_period),
        ("macd_fast", params.macd_fast),
        ("macd_slow", params.macd_slow),
        ("macd_signal", params.macd_signal),
        ("bb_period", params.bb_period),
        ("ema_fast", params.ema_fast),
        ("ema_slow", params.ema_slow),
        ("volume_period", params.volume_period),
    ];
    for (key, value) in periods {
        if value == 0 {
            return Err(ConfluenceError::invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    if params.macd_fast >= params.macd_slow {
        return Err(ConfluenceError::invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be less than macd_slow",
        ));
    }
    if params.ema_fast >= params.ema_slow {
        return Err(ConfluenceError::invalid(
            "indicators",
            "ema_fast",
            "ema_fast must be less than ema_slow",
        ));
    }
    if !(params.bb_stddev > 0.0) {
        return Err(ConfluenceError::invalid(
            "indicators",
            "bb_stddev",
            "bb_stddev must be positive",
        ));
    }
    Ok(())
}

pub fn validate_signal_params(params: &SignalParams) -> Result<(), ConfluenceError> {
    if !(0.0..=100.0).contains(&params.rsi_oversold)
        || !(0.0..=100.0).contains(&params.rsi_overbought)
        || params.rsi_oversold >= params.rsi_overbought
    {
        return Err(ConfluenceError::invalid(
            "indicators",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought, both within 0..100",
        ));
    }
    if !(params.volume_multiplier > 0.0) {
        return Err(ConfluenceError::invalid(
            "indicators",
            "volume_multiplier",
            "volume_multiplier must be positive",
        ));
    }

    let w = &params.weights;
    let weights = [
        ("rsi", w.rsi),
        ("macd", w.macd),
        ("bollinger", w.bollinger),
        ("ema_cross", w.ema_cross),
        ("volume", w.volume),
        ("trend", w.trend),
    ];
    for (key, value) in weights {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(ConfluenceError::invalid(
                "weights",
                key,
                "weights must be finite and non-negative",
            ));
        }
    }

    if !(params.threshold > 0.0) || !params.threshold.is_finite() {
        return Err(ConfluenceError::invalid(
            "signal",
            "threshold",
            "threshold must be positive",
        ));
    }
    Ok(())
}

pub fn validate_risk_params(params: &RiskParams) -> Result<(), ConfluenceError> {
    let fractions = [
        ("position_size_pct", params.position_size_pct),
        ("stop_loss_pct", params.stop_loss_pct),
        ("take_profit_pct", params.take_profit_pct),
    ];
    for (key, value) in fractions {
        if !(value > 0.0 && value <= 1.0) {
            return Err(ConfluenceError::invalid(
                "risk",
                key,
                format!("{} must be in (0, 1]", key),
            ));
        }
    }
    if params.max_positions == 0 {
        return Err(ConfluenceError::invalid(
            "risk",
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    Ok(())
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    match config.get_string("backtest", "data_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(ConfluenceError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ConfluenceError> {
    let start = parse_optional_date(config, "start_date")?;
    let end = parse_optional_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(ConfluenceError::invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

/// Reads an optional `YYYY-MM-DD` value from `[backtest]`.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    field: &str,
) -> Result<Option<NaiveDate>, ConfluenceError> {
    match config.get_string("backtest", field) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ConfluenceError::invalid(
                    "backtest",
                    field,
                    format!("invalid {} format, expected YYYY-MM-DD", field),
                )
            }),
    }
}
