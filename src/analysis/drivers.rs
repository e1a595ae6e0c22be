//! Read-only scoring of an indicator against its neighbours.
use crate::store::{normalize_weight, Indicator, IndicatorGraph, IndicatorId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// A direct parent together with its signed impact on the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverImpact {
    pub indicator: Indicator,
    pub impact_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDrivers {
    pub positive_drivers: Vec<Indicator>,
    pub negative_drivers: Vec<Indicator>,
}

/// All direct parents of `target` (self-relationship excluded), sorted by
/// descending absolute impact. Ties keep relationship order.
///
/// `impact = parent_fraction * normalized_weight * influence_score`
pub fn rank_parents(graph: &IndicatorGraph, target: &IndicatorId) -> Vec<DriverImpact> {
    let Some(node) = graph.node_index(target) else {
        warn!(indicator = %target, "driver ranking requested for unknown indicator");
        return Vec::new();
    };

    let mut impacts: Vec<DriverImpact> = graph.incoming(node)
        .into_iter()
        .filter(|&(_, parent)| parent != node)
        .map(|(edge, parent)| {
            let rel = graph.relationship_at(edge);
            let indicator = graph.indicator_at(parent);
            let impact_score = indicator.current_value.fraction()
                * normalize_weight(rel.influence_weight)
                * rel.influence_score.get();
            DriverImpact { indicator: indicator.clone(), impact_score }
        })
        .collect();

    impacts.sort_by(|a, b| {
        b.impact_score.abs().partial_cmp(&a.impact_score.abs()).unwrap_or(Ordering::Equal)
    });
    impacts
}

/// The strongest `top_n` positive and negative drivers of `target`.
/// Zero-impact parents appear in neither list.
pub fn top_drivers(graph: &IndicatorGraph, target: &IndicatorId, top_n: usize) -> TopDrivers {
    let ranked = rank_parents(graph, target);
    let pick = |keep: fn(f64) -> bool| -> Vec<Indicator> {
        ranked.iter()
            .filter(|d| keep(d.impact_score))
            .take(top_n)
            .map(|d| d.indicator.clone())
            .collect()
    };
    TopDrivers {
        positive_drivers: pick(|s| s > 0.0),
        negative_drivers: pick(|s| s < 0.0),
    }
}

/// Composite score of `target`: its self-relationship score times its own
/// value, plus each child's value weighted by the edge score. Not clamped.
///
/// Returns `None` when `target` is not in the snapshot.
pub fn net_score(graph: &IndicatorGraph, target: &IndicatorId) -> Option<f64> {
    let node = graph.node_index(target)?;
    let own_value = graph.indicator_at(node).current_value.get();

    let total: f64 = graph.outgoing(node)
        .into_iter()
        .map(|(edge, child)| {
            let score = graph.relationship_at(edge).influence_score.get();
            if child == node {
                score * own_value
            } else {
                score * graph.indicator_at(child).current_value.get()
            }
        })
        .sum();
    Some(total)
}
