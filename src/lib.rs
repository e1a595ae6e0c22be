//! Influence graph engine: what-if propagation over community indicators,
//! driver ranking, hierarchies, and batch calibration of edge weights from
//! historical trends.
//!
//! Every operation takes its snapshot explicitly; nothing is cached between
//! calls.

pub mod analysis;
pub mod bindings;
pub mod calibration;
pub mod compute;
pub mod config;
pub mod display;
pub mod error;
pub mod store;

pub use config::EngineConfig;
pub use error::{CalibrationError, ConfigError, EngineError, MatrixError};
pub use store::{HistoricalTrend, Indicator, IndicatorGraph, IndicatorId, Relationship, SimulationChange};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
