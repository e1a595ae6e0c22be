//! Offline estimation of relationship weights and scores from history.
pub mod engine;
pub mod matrix;
pub mod regression;
pub mod series;

pub use engine::{calibrate, CalibrationOutcome, CalibrationSummary, ParentSkip, Stage, ValueRange};
pub use matrix::Matrix;
pub use regression::{ordinary_least_squares, OlsFit};
