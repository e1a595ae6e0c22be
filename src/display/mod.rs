//! Human-readable explanations of engine output.
pub mod trace;

pub use trace::{explain_simulation, format_simulation, format_subtree};
