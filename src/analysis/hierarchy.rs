//! Bounded descendant trees and upward ancestor walks, for hierarchical
//! displays such as sunbursts and breadcrumbs.
use crate::store::{Indicator, IndicatorGraph, IndicatorId, Relationship};
use petgraph::graph::NodeIndex;
use petgraph::visit::{VisitMap, Visitable};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeNode {
    pub indicator: Indicator,
    /// Shortest distance from the root in edges.
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtree {
    pub root: IndicatorId,
    /// The root first, then descendants in discovery order.
    pub nodes: Vec<SubtreeNode>,
    /// Every non-self relationship leaving an expanded node.
    pub edges: Vec<Relationship>,
}

impl Subtree {
    pub fn contains(&self, id: &IndicatorId) -> bool {
        self.nodes.iter().any(|n| &n.indicator.id == id)
    }
}

/// Materializes the descendants of `root` up to `max_depth` edges away.
///
/// The walk is breadth-first, so each node is first reached at its shortest
/// depth and expanded exactly once. Back-edges out of expanded nodes are
/// still listed.
pub fn subtree(graph: &IndicatorGraph, root: &IndicatorId, max_depth: usize) -> Option<Subtree> {
    let root_node = graph.node_index(root)?;
    let mut visited = graph.graph.visit_map();
    let mut queue = VecDeque::from([(root_node, 0usize)]);
    visited.visit(root_node);

    let mut nodes = vec![SubtreeNode { indicator: graph.indicator_at(root_node).clone(), depth: 0 }];
    let mut edges = Vec::new();

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for (edge, child) in graph.outgoing(node) {
            if child == node {
                continue;
            }
            edges.push(graph.relationship_at(edge).clone());
            if visited.visit(child) {
                nodes.push(SubtreeNode { indicator: graph.indicator_at(child).clone(), depth: depth + 1 });
                queue.push_back((child, depth + 1));
            }
        }
    }

    Some(Subtree { root: root.clone(), nodes, edges })
}

/// One subtree per root indicator, in indicator order. A root has no parent
/// other than itself.
pub fn forest(graph: &IndicatorGraph, max_depth: usize) -> Vec<Subtree> {
    roots(graph)
        .into_iter()
        .filter_map(|n| subtree(graph, &graph.indicator_at(n).id, max_depth))
        .collect()
}

fn roots(graph: &IndicatorGraph) -> Vec<NodeIndex> {
    graph.graph.node_indices()
        .filter(|&n| graph.incoming(n).iter().all(|&(_, parent)| parent == n))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AncestorChain {
    /// Every indicator upstream of the start, nearest first.
    pub ancestors: Vec<Indicator>,
    /// The top-most indicators reached: those with no parent besides
    /// themselves. The start is its own root when it has no parents.
    pub roots: Vec<IndicatorId>,
}

/// Walks upward from `start` through all parents to the root(s).
///
/// Depth is unbounded, so the visited set is what terminates the walk on
/// cyclic graphs.
pub fn ancestor_chain(graph: &IndicatorGraph, start: &IndicatorId) -> Option<AncestorChain> {
    let start_node = graph.node_index(start)?;
    let mut visited = graph.graph.visit_map();
    let mut queue = VecDeque::from([start_node]);
    visited.visit(start_node);

    let mut chain = AncestorChain::default();
    while let Some(node) = queue.pop_front() {
        let mut has_parent = false;
        for (_, parent) in graph.incoming(node) {
            if parent == node {
                continue;
            }
            has_parent = true;
            if visited.visit(parent) {
                chain.ancestors.push(graph.indicator_at(parent).clone());
                queue.push_back(parent);
            }
        }
        if !has_parent {
            chain.roots.push(graph.indicator_at(node).id.clone());
        }
    }
    Some(chain)
}
