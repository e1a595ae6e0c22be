//! Tunable constants of the engine, grouped per component.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable configuration.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simulation: SimulationConfig,
    pub ranking: RankingConfig,
    pub hierarchy: HierarchyConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Minimum absolute delta for a propagated change to be recorded and
    /// propagated further. Inclusive.
    pub significance_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self { Self { significance_threshold: 0.1 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self { Self { top_n: 3 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self { Self { max_depth: 5 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Valid yearly observations an indicator needs to take part at all.
    pub min_observations: usize,
    /// Years all children must share before their correlations are used.
    pub min_score_overlap: usize,
    /// Years the parent and all children must share before regression.
    pub min_weight_overlap: usize,
    /// Lagged `(X, y)` rows required before solving.
    pub min_regression_rows: usize,
    /// Pivots below this magnitude mark the normal matrix as singular.
    pub pivot_epsilon: f64,
    pub score_floor: f64,
    pub score_ceiling: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_observations: 5,
            min_score_overlap: 3,
            min_weight_overlap: 5,
            min_regression_rows: 3,
            pivot_epsilon: 1e-10,
            score_floor: 0.01,
            score_ceiling: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.simulation.significance_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(invalid("simulation.significance_threshold", "must be a positive finite number"));
        }
        let cal = &self.calibration;
        if cal.min_observations < 2 {
            return Err(invalid("calibration.min_observations", "at least two observations are needed for a deviation"));
        }
        if cal.min_score_overlap < 2 {
            return Err(invalid("calibration.min_score_overlap", "correlation needs at least two years"));
        }
        if cal.min_regression_rows < 1 {
            return Err(invalid("calibration.min_regression_rows", "must be at least 1"));
        }
        if cal.pivot_epsilon.is_nan() || cal.pivot_epsilon <= 0.0 {
            return Err(invalid("calibration.pivot_epsilon", "must be positive"));
        }
        if !(0.0..=1.0).contains(&cal.score_floor) || !(0.0..=1.0).contains(&cal.score_ceiling) || cal.score_floor > cal.score_ceiling {
            return Err(invalid("calibration.score_floor", "floor and ceiling must satisfy 0 <= floor <= ceiling <= 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.to_string() }
}
