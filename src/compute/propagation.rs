//! Breadth-first propagation of a single hypothetical change.
//!
//! The snapshot is never mutated: each run copies current values into a
//! dense working buffer indexed by node index and reports the result as a
//! fresh indicator set.
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::store::{normalize_weight, Indicator, IndicatorGraph, IndicatorId, Percent, SimulationChange};
use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use petgraph::visit::{VisitMap, Visitable};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Rounding slack for the threshold comparison, in units of the working
/// values' last place.
const ULP_SLACK: f64 = 8.0 * f64::EPSILON;

/// One hypothetical change to run against a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub indicator_id: IndicatorId,
    pub new_value: f64,
}

/// One evaluated edge during propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationStep {
    pub parent_id: IndicatorId,
    pub child_id: IndicatorId,
    /// Delta proposed for the child on the 0..=100 scale, before clamping.
    pub impact: f64,
    /// Product of normalized weight and score along the path to the parent.
    pub path_influence: f64,
    pub depth: u32,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub updated_indicators: Vec<Indicator>,
    /// The seed change first, then one record per significantly changed
    /// indicator in the order it was first reached.
    pub changes: Vec<SimulationChange>,
    pub steps: Vec<PropagationStep>,
    /// Number of nodes taken off the work queue.
    pub queue_pops: usize,
}

impl SimulationResult {
    pub fn change_for(&self, id: &IndicatorId) -> Option<&SimulationChange> {
        self.changes.iter().find(|c| &c.indicator_id == id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    node: NodeIndex,
    influence: f64,
    depth: u32,
}

/// Sets `changed` to `new_value` and propagates the effect downstream.
///
/// `new_value` is clamped into range rather than rejected. Propagation
/// terminates because every node is expanded at most once and edges into
/// already-expanded nodes are ignored.
pub fn simulate(
    graph: &IndicatorGraph,
    changed: &IndicatorId,
    new_value: f64,
    config: &SimulationConfig,
) -> Result<SimulationResult, EngineError> {
    let seed = graph.node_index(changed)
        .ok_or_else(|| EngineError::UnknownIndicator { id: changed.clone() })?;
    if !new_value.is_finite() {
        return Err(EngineError::NonFiniteValue { id: changed.clone(), value: new_value });
    }

    let now = Utc::now();
    let baseline = graph.values();
    let mut working = baseline.clone();
    let mut run = Run {
        graph,
        now,
        changes: Vec::new(),
        change_slot: vec![None; baseline.len()],
        steps: Vec::new(),
    };

    let seed_value = Percent::new(new_value).get();
    working[seed.index()] = seed_value;
    run.record(seed, baseline[seed.index()], seed_value);

    let mut queue = VecDeque::with_capacity(baseline.len());
    let mut processed = graph.graph.visit_map();
    let mut enqueued = graph.graph.visit_map();
    queue.push_back(Pending { node: seed, influence: 1.0, depth: 0 });
    enqueued.visit(seed);

    let threshold = config.significance_threshold;
    let mut queue_pops = 0;

    while let Some(current) = queue.pop_front() {
        queue_pops += 1;
        processed.visit(current.node);

        let p = current.node.index();
        let parent_change = (working[p] - baseline[p]) / Percent::MAX;

        for (edge, child) in graph.outgoing(current.node) {
            if processed.is_visited(&child) {
                continue;
            }
            let rel = graph.relationship_at(edge);
            let weight = normalize_weight(rel.influence_weight);
            let score = rel.influence_score.get();
            let impact = parent_change * weight * score * Percent::MAX;

            let c = child.index();
            let previous = working[c];
            let candidate = Percent::new(previous + impact).get();
            let significant = is_significant(previous, candidate, threshold);

            run.steps.push(PropagationStep {
                parent_id: rel.parent_id.clone(),
                child_id: rel.child_id.clone(),
                impact,
                path_influence: current.influence,
                depth: current.depth + 1,
                significant,
            });

            if !significant {
                debug!(parent = %rel.parent_id, child = %rel.child_id, impact, "sub-threshold change dropped");
                continue;
            }

            working[c] = candidate;
            run.record(child, baseline[c], candidate);
            debug!(child = %rel.child_id, from = previous, to = candidate, "propagated change");

            if enqueued.visit(child) {
                queue.push_back(Pending {
                    node: child,
                    influence: current.influence * weight * score,
                    depth: current.depth + 1,
                });
            }
        }
    }

    let updated_indicators = graph.indicators()
        .zip(&working)
        .map(|(ind, &v)| Indicator { current_value: Percent::new(v), ..ind.clone() })
        .collect();

    Ok(SimulationResult {
        updated_indicators,
        changes: run.changes,
        steps: run.steps,
        queue_pops,
    })
}

/// Runs independent scenarios against one snapshot in parallel. Results are
/// returned in scenario order.
pub fn simulate_scenarios(
    graph: &IndicatorGraph,
    scenarios: &[Scenario],
    config: &SimulationConfig,
) -> Vec<Result<SimulationResult, EngineError>> {
    scenarios
        .par_iter()
        .map(|s| simulate(graph, &s.indicator_id, s.new_value, config))
        .collect()
}

/// `|candidate - previous| >= threshold`, allowing only the rounding error
/// that subtracting two values on the 0..=100 scale can introduce.
fn is_significant(previous: f64, candidate: f64, threshold: f64) -> bool {
    let slack = ULP_SLACK * previous.abs().max(candidate.abs()).max(1.0);
    (candidate - previous).abs() + slack >= threshold
}

struct Run<'a> {
    graph: &'a IndicatorGraph,
    now: DateTime<Utc>,
    changes: Vec<SimulationChange>,
    change_slot: Vec<Option<usize>>,
    steps: Vec<PropagationStep>,
}

impl Run<'_> {
    /// Keeps one record per indicator: a later significant change to an
    /// indicator that already has a record only moves its `new_value`.
    fn record(&mut self, node: NodeIndex, baseline: f64, new_value: f64) {
        let new_value = Percent::new(new_value);
        match self.change_slot[node.index()] {
            Some(slot) => self.changes[slot].new_value = new_value,
            None => {
                self.change_slot[node.index()] = Some(self.changes.len());
                self.changes.push(SimulationChange {
                    indicator_id: self.graph.indicator_at(node).id.clone(),
                    previous_value: Percent::new(baseline),
                    new_value,
                    created_at: self.now,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Relationship;
    use rstest::rstest;

    fn two_node(weight: f64, score: f64) -> IndicatorGraph {
        IndicatorGraph::from_parts(
            vec![Indicator::new("P", "Parent", 50.0), Indicator::new("C", "Child", 50.0)],
            vec![
                Relationship::new("P", "C", weight, score),
                Relationship::new("P", "P", 0.0, 0.1),
            ],
        )
    }

    fn run(graph: &IndicatorGraph, id: &str, value: f64) -> SimulationResult {
        simulate(graph, &id.into(), value, &SimulationConfig::default()).unwrap()
    }

    #[test]
    fn test_parent_change_scales_child() {
        let g = two_node(50.0, 0.5);
        let res = run(&g, "P", 70.0);

        assert_eq!(res.changes.len(), 2);
        assert_eq!(res.changes[0].indicator_id.as_str(), "P");
        assert_eq!(res.changes[0].previous_value.get(), 50.0);
        assert_eq!(res.changes[0].new_value.get(), 70.0);

        let c = res.change_for(&"C".into()).unwrap();
        assert_eq!(c.previous_value.get(), 50.0);
        assert!((c.new_value.get() - 55.0).abs() < 1e-9);

        let updated_c = res.updated_indicators.iter().find(|i| i.id.as_str() == "C").unwrap();
        assert!((updated_c.current_value.get() - 55.0).abs() < 1e-9);
        // the snapshot itself is untouched
        assert_eq!(g.indicator(&"C".into()).unwrap().current_value.get(), 50.0);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let g = two_node(1.0, 0.5);
        let res = run(&g, "P", 70.0);
        let c = res.change_for(&"C".into()).expect("boundary delta must be emitted");
        assert!((c.delta() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_delta_just_below_threshold_is_dropped() {
        // parent moves by 19.99999992, so the child impact is 0.0999999996
        let g = two_node(1.0, 0.5);
        let res = run(&g, "P", 69.99999992);
        assert!(res.change_for(&"C".into()).is_none());
        assert!(!res.steps[0].significant);
        assert!((res.steps[0].impact - 0.0999999996).abs() < 1e-12);
    }

    #[test]
    fn test_rounding_slack_stays_within_a_few_ulps() {
        assert!(is_significant(50.0, 50.1, 0.1));
        assert!(is_significant(100.0, 99.9, 0.1));
        assert!(!is_significant(50.0, 50.0999999996, 0.1));
        assert!(!is_significant(0.0, 0.09999999999, 0.1));
    }

    #[test]
    fn test_sub_threshold_change_is_dropped() {
        let g = two_node(0.9, 0.5);
        let res = run(&g, "P", 70.0);
        assert_eq!(res.changes.len(), 1);
        assert!(res.change_for(&"C".into()).is_none());
        assert_eq!(res.steps.len(), 1);
        assert!(!res.steps[0].significant);
    }

    #[rstest]
    #[case(150.0, 100.0)]
    #[case(-40.0, 0.0)]
    fn test_out_of_range_seed_is_clamped(#[case] seed: f64, #[case] expected: f64) {
        let g = IndicatorGraph::from_parts(
            vec![Indicator::new("P", "P", 50.0), Indicator::new("C", "C", 95.0), Indicator::new("D", "D", 3.0)],
            vec![
                Relationship::new("P", "C", 100.0, 1.0),
                Relationship::new("P", "D", -100.0, 1.0),
            ],
        );
        let res = run(&g, "P", seed);
        assert_eq!(res.changes[0].new_value.get(), expected);
        for change in &res.changes {
            let v = change.new_value.get();
            assert!((0.0..=100.0).contains(&v), "{} out of range: {}", change.indicator_id, v);
        }
    }

    #[test]
    fn test_cycle_terminates_with_one_pop_per_node() {
        let g = IndicatorGraph::from_parts(
            vec![Indicator::new("A", "A", 50.0), Indicator::new("B", "B", 50.0), Indicator::new("C", "C", 50.0)],
            vec![
                Relationship::new("A", "B", 100.0, 1.0),
                Relationship::new("B", "C", 100.0, 1.0),
                Relationship::new("C", "A", 100.0, 1.0),
            ],
        );
        let res = run(&g, "A", 90.0);
        assert!(res.queue_pops <= g.node_count());
        assert_eq!(res.changes.len(), 3);
        // the edge back into A is never evaluated
        assert!(res.steps.iter().all(|s| s.child_id.as_str() != "A"));
        let a = res.updated_indicators.iter().find(|i| i.id.as_str() == "A").unwrap();
        assert_eq!(a.current_value.get(), 90.0);
    }

    #[test]
    fn test_diamond_keeps_one_record_per_indicator() {
        // A -> B, A -> C, B -> D, C -> D
        let g = IndicatorGraph::from_parts(
            vec![
                Indicator::new("A", "A", 50.0),
                Indicator::new("B", "B", 50.0),
                Indicator::new("C", "C", 50.0),
                Indicator::new("D", "D", 50.0),
            ],
            vec![
                Relationship::new("A", "B", 100.0, 1.0),
                Relationship::new("A", "C", 100.0, 1.0),
                Relationship::new("B", "D", 50.0, 1.0),
                Relationship::new("C", "D", 50.0, 1.0),
            ],
        );
        let res = run(&g, "A", 60.0);
        let d_records = res.changes.iter().filter(|c| c.indicator_id.as_str() == "D").count();
        assert_eq!(d_records, 1);
        // both parents contributed +5
        let d = res.change_for(&"D".into()).unwrap();
        assert!((d.new_value.get() - 60.0).abs() < 1e-9);
        assert_eq!(d.previous_value.get(), 50.0);
    }

    #[test]
    fn test_negative_weight_and_path_influence() {
        let g = IndicatorGraph::from_parts(
            vec![Indicator::new("A", "A", 50.0), Indicator::new("B", "B", 50.0), Indicator::new("C", "C", 50.0)],
            vec![
                Relationship::new("A", "B", -50.0, 1.0),
                Relationship::new("B", "C", 100.0, 0.5),
            ],
        );
        let res = run(&g, "A", 90.0);
        let b = res.change_for(&"B".into()).unwrap();
        assert!((b.new_value.get() - 30.0).abs() < 1e-9);
        let c = res.change_for(&"C".into()).unwrap();
        assert!((c.new_value.get() - 40.0).abs() < 1e-9);

        let last = res.steps.last().unwrap();
        assert_eq!(last.depth, 2);
        assert!((last.path_influence + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_and_non_finite_seeds_are_errors() {
        let g = two_node(50.0, 0.5);
        let cfg = SimulationConfig::default();
        assert_eq!(
            simulate(&g, &"nope".into(), 10.0, &cfg).unwrap_err(),
            EngineError::UnknownIndicator { id: "nope".into() }
        );
        assert!(matches!(
            simulate(&g, &"P".into(), f64::NAN, &cfg),
            Err(EngineError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn test_scenarios_run_independently() {
        let g = two_node(50.0, 0.5);
        let scenarios = vec![
            Scenario { indicator_id: "P".into(), new_value: 70.0 },
            Scenario { indicator_id: "P".into(), new_value: 30.0 },
            Scenario { indicator_id: "missing".into(), new_value: 30.0 },
        ];
        let results = simulate_scenarios(&g, &scenarios, &SimulationConfig::default());
        assert_eq!(results.len(), 3);
        let up = results[0].as_ref().unwrap().change_for(&"C".into()).unwrap().new_value.get();
        let down = results[1].as_ref().unwrap().change_for(&"C".into()).unwrap().new_value.get();
        assert!((up - 55.0).abs() < 1e-9);
        assert!((down - 45.0).abs() < 1e-9);
        assert!(results[2].is_err());
    }
}
