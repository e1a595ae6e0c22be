//! Host-facing surface: JSON payload shapes and the optional Python module.
pub mod payload;
#[cfg(feature = "python")]
pub mod python;

pub use payload::{CalibrationPayload, CalibrationReport, GraphPayload, SkippedParent};
