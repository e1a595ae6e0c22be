//! Wire shapes exchanged with the host application.
use crate::calibration::{CalibrationOutcome, CalibrationSummary};
use crate::store::{HistoricalTrend, Indicator, IndicatorGraph, Relationship, RelationshipUpdate};
use serde::{Deserialize, Serialize};

/// Read side for simulation, ranking, aggregation and hierarchy queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPayload {
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl GraphPayload {
    pub fn into_graph(self) -> IndicatorGraph {
        IndicatorGraph::from_parts(self.indicators, self.relationships)
    }
}

/// Read side for a calibration batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationPayload {
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub historical_trends: Vec<HistoricalTrend>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Write side of a calibration batch: the summary plus the per-edge fields
/// the host must persist, keyed by `(parent_id, child_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub summary: CalibrationSummary,
    pub updates: Vec<RelationshipUpdate>,
    pub skipped_parents: Vec<SkippedParent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedParent {
    pub parent_id: String,
    pub stage: String,
    pub reason: String,
}

impl From<CalibrationOutcome> for CalibrationReport {
    fn from(outcome: CalibrationOutcome) -> Self {
        Self {
            summary: outcome.summary,
            updates: outcome.updates,
            skipped_parents: outcome.skipped_parents.into_iter()
                .map(|s| SkippedParent {
                    parent_id: s.parent_id.0,
                    stage: format!("{:?}", s.stage),
                    reason: s.reason.to_string(),
                })
                .collect(),
        }
    }
}
