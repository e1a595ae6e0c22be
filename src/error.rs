//! Error types for the influence engine.
use crate::store::IndicatorId;
use thiserror::Error;

/// Errors returned to callers of the interactive operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unknown indicator: {id}")]
    UnknownIndicator { id: IndicatorId },
    #[error("Non-finite value {value} for indicator {id}")]
    NonFiniteValue { id: IndicatorId, value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    /// No usable pivot remained in `column` after partial pivoting.
    #[error("Singular matrix: pivot {pivot:e} in column {column}")]
    Singular { column: usize, pivot: f64 },
    #[error("Dimension mismatch: {msg}")]
    DimensionMismatch { msg: String },
}

/// Why one parent was left out of a calibration run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Parent has no sibling children with usable data")]
    NoSiblings,
    #[error("Insufficient overlapping years: {years} < {required}")]
    InsufficientOverlap { years: usize, required: usize },
    #[error("Insufficient regression rows: {rows} < {required}")]
    InsufficientRows { rows: usize, required: usize },
    #[error("Parent has no normalized history")]
    MissingParentSeries,
    #[error("Regression failed: {0}")]
    Matrix(#[from] MatrixError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Malformed configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self { ConfigError::Parse(e.to_string()) }
}
