//! Core domain types and logic.

pub mod backtest;
pub mod code_data;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod risk;
pub mod signal;
pub mod sweep;
pub mod universe;
