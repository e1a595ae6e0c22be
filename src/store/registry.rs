use super::types::*;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::warn;

/// Adjacency list for one node: `(edge, neighbour)` pairs in insertion order.
pub type Adjacent = SmallVec<[(EdgeIndex, NodeIndex); 8]>;

/// What the builder had to discard while constructing a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    /// Relationships naming an indicator that is not in the snapshot.
    pub dangling: Vec<Relationship>,
    /// Second and later occurrences of an already-seen `(parent, child)` pair.
    pub duplicate_relationships: Vec<Relationship>,
    /// Second and later occurrences of an already-seen indicator id.
    pub duplicate_indicators: Vec<IndicatorId>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.duplicate_relationships.is_empty() && self.duplicate_indicators.is_empty()
    }
}

/// Immutable snapshot of indicators and their influence relationships.
///
/// Node indices are dense (`0..node_count`) and follow the order indicators
/// were supplied in; edge indices follow relationship order. Every query
/// that returns adjacency returns it in that order, so results are
/// deterministic for a given input.
#[derive(Debug, Clone, Default)]
pub struct IndicatorGraph {
    pub(crate) graph: DiGraph<Indicator, Relationship>,
    index: HashMap<IndicatorId, NodeIndex>,
    report: BuildReport,
}

impl IndicatorGraph {
    /// Builds a snapshot, skipping relationships whose endpoints are unknown
    /// and repeated ids or pairs. Never fails; see [`IndicatorGraph::report`].
    pub fn from_parts(indicators: Vec<Indicator>, relationships: Vec<Relationship>) -> Self {
        let mut graph = DiGraph::with_capacity(indicators.len(), relationships.len());
        let mut index = HashMap::with_capacity(indicators.len());
        let mut report = BuildReport::default();

        for indicator in indicators {
            if index.contains_key(&indicator.id) {
                warn!(indicator = %indicator.id, "duplicate indicator id ignored");
                report.duplicate_indicators.push(indicator.id);
                continue;
            }
            let id = indicator.id.clone();
            let node = graph.add_node(indicator);
            index.insert(id, node);
        }

        for rel in relationships {
            let (Some(&parent), Some(&child)) = (index.get(&rel.parent_id), index.get(&rel.child_id)) else {
                warn!(parent = %rel.parent_id, child = %rel.child_id, "dangling relationship skipped");
                report.dangling.push(rel);
                continue;
            };
            if graph.find_edge(parent, child).is_some() {
                warn!(parent = %rel.parent_id, child = %rel.child_id, "duplicate relationship ignored");
                report.duplicate_relationships.push(rel);
                continue;
            }
            graph.add_edge(parent, child, rel);
        }

        Self { graph, index, report }
    }

    pub fn report(&self) -> &BuildReport { &self.report }

    pub fn node_count(&self) -> usize { self.graph.node_count() }

    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    // --- Lookup ---

    #[inline]
    pub fn node_index(&self, id: &IndicatorId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn indicator(&self, id: &IndicatorId) -> Option<&Indicator> {
        self.node_index(id).map(|n| &self.graph[n])
    }

    #[inline(always)]
    pub fn indicator_at(&self, node: NodeIndex) -> &Indicator { &self.graph[node] }

    #[inline(always)]
    pub fn relationship_at(&self, edge: EdgeIndex) -> &Relationship { &self.graph[edge] }

    pub fn indicators(&self) -> impl Iterator<Item = &Indicator> {
        self.graph.node_weights()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph.edge_weights()
    }

    /// Current values indexed densely by node index.
    pub fn values(&self) -> Vec<f64> {
        self.graph.node_weights().map(|i| i.current_value.get()).collect()
    }

    // --- Adjacency ---

    /// Outgoing edges (`parent_id == node`), including a self edge.
    pub fn outgoing(&self, node: NodeIndex) -> Adjacent {
        self.adjacent(node, Direction::Outgoing)
    }

    /// Incoming edges (`child_id == node`), including a self edge.
    pub fn incoming(&self, node: NodeIndex) -> Adjacent {
        self.adjacent(node, Direction::Incoming)
    }

    fn adjacent(&self, node: NodeIndex, dir: Direction) -> Adjacent {
        // petgraph walks its edge lists newest-first; restore insertion order.
        let mut out: Adjacent = self.graph.edges_directed(node, dir)
            .map(|e| (e.id(), if dir == Direction::Outgoing { e.target() } else { e.source() }))
            .collect();
        out.sort_unstable_by_key(|(e, _)| *e);
        out
    }

    /// Relationships leaving `id`, in relationship order.
    pub fn children_of(&self, id: &IndicatorId) -> Vec<&Relationship> {
        self.node_index(id)
            .map(|n| self.outgoing(n).into_iter().map(|(e, _)| &self.graph[e]).collect())
            .unwrap_or_default()
    }

    /// Relationships entering `id`, in relationship order.
    pub fn parents_of(&self, id: &IndicatorId) -> Vec<&Relationship> {
        self.node_index(id)
            .map(|n| self.incoming(n).into_iter().map(|(e, _)| &self.graph[e]).collect())
            .unwrap_or_default()
    }

    pub fn self_relationship(&self, node: NodeIndex) -> Option<&Relationship> {
        self.graph.find_edge(node, node).map(|e| &self.graph[e])
    }

    pub fn relationship(&self, parent: &IndicatorId, child: &IndicatorId) -> Option<&Relationship> {
        let (p, c) = (self.node_index(parent)?, self.node_index(child)?);
        self.graph.find_edge(p, c).map(|e| &self.graph[e])
    }

    // --- Derived snapshots ---

    /// A new snapshot with `current_value` replaced for every indicator in
    /// `updated`. Unknown ids are ignored.
    pub fn with_values(&self, updated: &[Indicator]) -> Self {
        let mut next = self.clone();
        for ind in updated {
            if let Some(n) = next.node_index(&ind.id) {
                next.graph[n].current_value = ind.current_value;
            }
        }
        next
    }

    /// A new snapshot with calibrated fields written onto matching edges.
    pub fn apply_updates(&self, updates: &[RelationshipUpdate]) -> Self {
        let mut next = self.clone();
        for update in updates {
            let (Some(p), Some(c)) = (next.node_index(&update.parent_id), next.node_index(&update.child_id)) else {
                continue;
            };
            if let Some(e) = next.graph.find_edge(p, c) {
                update.apply_to(&mut next.graph[e]);
            }
        }
        next
    }
}
