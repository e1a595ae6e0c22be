//! Interactive what-if propagation over a snapshot.
pub mod propagation;

pub use propagation::{simulate, simulate_scenarios, PropagationStep, Scenario, SimulationResult};
