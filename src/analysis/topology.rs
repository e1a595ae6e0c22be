use crate::store::{IndicatorGraph, IndicatorId};
use petgraph::algo::tarjan_scc;
use serde::{Deserialize, Serialize};

/// Structural health of a snapshot.
///
/// Cycles are legal in an influence graph; they are reported so callers can
/// see where propagation will be cut by the processed-set guard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    pub indicator_count: usize,
    pub relationship_count: usize,
    pub self_relationships: usize,
    /// Relationships dropped at build time because an endpoint was missing.
    pub dangling_relationships: usize,
    pub duplicate_relationships: usize,
    pub duplicate_indicators: usize,
    /// Strongly connected components with more than one member, each sorted
    /// by id; the list itself is sorted by its first member.
    pub cycles: Vec<Vec<IndicatorId>>,
}

impl GraphDiagnostics {
    pub fn is_acyclic(&self) -> bool { self.cycles.is_empty() }
}

pub fn diagnose(graph: &IndicatorGraph) -> GraphDiagnostics {
    let report = graph.report();

    let mut cycles: Vec<Vec<IndicatorId>> = tarjan_scc(&graph.graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut ids: Vec<IndicatorId> = component.into_iter()
                .map(|n| graph.indicator_at(n).id.clone())
                .collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();

    GraphDiagnostics {
        indicator_count: graph.node_count(),
        relationship_count: graph.edge_count(),
        self_relationships: graph.relationships().filter(|r| r.is_self()).count(),
        dangling_relationships: report.dangling.len(),
        duplicate_relationships: report.duplicate_relationships.len(),
        duplicate_indicators: report.duplicate_indicators.len(),
        cycles,
    }
}
