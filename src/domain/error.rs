//! Domain error types.

use chrono::NaiveDateTime;
use std::fmt;

/// Top-level error type for confluence.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfluenceError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ConfluenceError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ConfluenceError::ConfigParse { .. }
                | ConfluenceError::ConfigMissing { .. }
                | ConfluenceError::ConfigInvalid { .. }
        )
    }
}

impl From<&ConfluenceError> for std::process::ExitCode {
    fn from(err: &ConfluenceError) -> Self {
        let code: u8 = match err {
            ConfluenceError::Io(_) | ConfluenceError::Csv(_) => 1,
            ConfluenceError::ConfigParse { .. }
            | ConfluenceError::ConfigMissing { .. }
            | ConfluenceError::ConfigInvalid { .. } => 2,
            ConfluenceError::Data { .. }
            | ConfluenceError::NoData { .. }
            | ConfluenceError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Position bookkeeping faults raised by the position tracker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("position already open for {0}")]
    AlreadyOpen(String),

    #[error("no open position for {0}")]
    NotOpen(String),
}

/// Ways a single bar can be rejected during a simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataErrorKind {
    /// Timestamp earlier than the last accepted bar.
    OutOfOrder,
    /// Timestamp equal to the last accepted bar.
    Duplicate,
    /// Non-finite or inconsistent OHLCV values.
    Malformed,
}

impl fmt::Display for DataErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErrorKind::OutOfOrder => write!(f, "out-of-order bar"),
            DataErrorKind::Duplicate => write!(f, "duplicate bar"),
            DataErrorKind::Malformed => write!(f, "malformed bar"),
        }
    }
}

/// A bar skipped by the simulator. The run continues without it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataIssue {
    pub code: String,
    pub timestamp: NaiveDateTime,
    pub kind: DataErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn config_errors_map_to_exit_code_2() {
        let err = ConfluenceError::invalid("risk", "max_positions", "must be positive");
        assert!(err.is_config());
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }

    #[test]
    fn data_errors_map_to_exit_code_5() {
        let err = ConfluenceError::NoData { code: "AAPL".into() };
        assert!(!err.is_config());
        assert_eq!(ExitCode::from(&err), ExitCode::from(5));
    }

    #[test]
    fn config_invalid_message() {
        let err = ConfluenceError::invalid("indicators", "rsi_period", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [indicators] rsi_period: must be positive"
        );
    }

    #[test]
    fn state_error_message() {
        assert_eq!(
            StateError::AlreadyOpen("TSLA".into()).to_string(),
            "position already open for TSLA"
        );
        assert_eq!(
            StateError::NotOpen("TSLA".into()).to_string(),
            "no open position for TSLA"
        );
    }

    #[test]
    fn data_error_kind_display() {
        assert_eq!(DataErrorKind::OutOfOrder.to_string(), "out-of-order bar");
        assert_eq!(DataErrorKind::Duplicate.to_string(), "duplicate bar");
        assert_eq!(DataErrorKind::Malformed.to_string(), "malformed bar");
    }
}
