//! Error taxonomy shared by the simulation core.
//!
//! - [`DomainError`]: invalid inputs (bad provision rate, look-back longer than
//!   the data, malformed series). Fatal to the operation that raised it.
//! - [`StateError`]: the environment was driven out of order (stepping a
//!   finished episode, observing before reset). Signals a programmer error.
//!
//! Numerically indeterminate metrics are not errors; they degrade to NaN.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("provision rate {0} outside [0, 1)")]
    InvalidProvision(f64),

    #[error("look-back {look_back} requires more than {look_back} rows, series has {rows}")]
    LookBackTooLong { look_back: usize, rows: usize },

    #[error("window was cut with a {prefix_len}-row prefix but the backtest uses look-back {look_back}")]
    PrefixMismatch { prefix_len: usize, look_back: usize },

    #[error("look-back must be at least 1")]
    ZeroLookBack,

    #[error("dataset is empty")]
    EmptySeries,

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("timestamps must be strictly increasing (row {row})")]
    UnorderedTimestamps { row: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("start index {start} leaves no tradable rows (series has {rows} rows, look-back {look_back})")]
    StartOutOfRange {
        start: usize,
        look_back: usize,
        rows: usize,
    },

    #[error("invalid action index {0} (expected 0, 1 or 2)")]
    InvalidAction(usize),

    #[error("invalid window span '{0}'")]
    InvalidSpan(String),

    #[error("{name} must be finite and positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("environment has not been reset")]
    NotReset,

    #[error("episode is done at step {step}; reset before stepping again")]
    EpisodeDone { step: usize },
}

/// Errors raised by [`crate::env::MarketEnvironment`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    State(#[from] StateError),
}
