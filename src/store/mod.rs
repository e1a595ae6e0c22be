//! Typed graph snapshot: indicators, relationships and the records derived
//! from them.
pub mod registry;
pub mod types;

pub use registry::{Adjacent, BuildReport, IndicatorGraph};
pub use types::*;
