use crate::analysis::hierarchy::Subtree;
use crate::compute::{simulate, SimulationResult};
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::store::{IndicatorGraph, IndicatorId, Relationship};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders a simulation run as an indented audit trail: the seed change,
/// then every significant propagation step at its depth.
pub fn format_simulation(graph: &IndicatorGraph, result: &SimulationResult) -> String {
    let mut out = String::new();
    let Some(seed) = result.changes.first() else {
        let _ = writeln!(out, "Empty simulation result");
        return out;
    };

    let _ = writeln!(
        out,
        "SIMULATION TRACE for '{}': {:.3} -> {:.3}",
        display_name(graph, &seed.indicator_id),
        seed.previous_value.get(),
        seed.new_value.get()
    );
    let _ = writeln!(out, "--------------------------------------------------");

    let mut dropped = 0;
    for step in &result.steps {
        if !step.significant {
            dropped += 1;
            continue;
        }
        let indent = "   ".repeat(step.depth.saturating_sub(1) as usize);
        let rel = graph.relationship(&step.parent_id, &step.child_id);
        let edge = rel.map(format_edge).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}`-- [L{}] {} {:+.3} via {}{}",
            indent,
            step.depth,
            display_name(graph, &step.child_id),
            step.impact,
            display_name(graph, &step.parent_id),
            edge
        );
    }

    let _ = writeln!(out, "--------------------------------------------------");
    for change in result.changes.iter().skip(1) {
        let _ = writeln!(
            out,
            "{}: {:.3} -> {:.3}",
            display_name(graph, &change.indicator_id),
            change.previous_value.get(),
            change.new_value.get()
        );
    }
    let _ = writeln!(out, "{} change(s), {} step(s) below threshold", result.changes.len(), dropped);
    out
}

/// Runs one simulation under `config` and renders its trace.
pub fn explain_simulation(
    graph: &IndicatorGraph,
    changed: &IndicatorId,
    new_value: f64,
    config: &SimulationConfig,
) -> Result<String, EngineError> {
    let result = simulate(graph, changed, new_value, config)?;
    Ok(format_simulation(graph, &result))
}

/// Renders a subtree as an ASCII hierarchy. Nodes reached a second time
/// through another edge print as a back reference.
pub fn format_subtree(graph: &IndicatorGraph, tree: &Subtree) -> String {
    let mut children: HashMap<&IndicatorId, Vec<&IndicatorId>> = HashMap::new();
    for edge in &tree.edges {
        children.entry(&edge.parent_id).or_default().push(&edge.child_id);
    }
    let values: HashMap<&IndicatorId, f64> = tree.nodes.iter()
        .map(|n| (&n.indicator.id, n.indicator.current_value.get()))
        .collect();

    let mut output = String::new();
    let _ = writeln!(output, "HIERARCHY for '{}':", display_name(graph, &tree.root));
    let _ = writeln!(output, "--------------------------------------------------");

    // Explicit pre-order stack of (node, level, line prefix); children are
    // pushed in reverse so they pop in edge order.
    let mut seen_at_level: HashMap<&IndicatorId, usize> = HashMap::new();
    let mut stack: Vec<(&IndicatorId, usize, String)> = vec![(&tree.root, 0, String::new())];
    while let Some((id, level, prefix)) = stack.pop() {
        if let Some(&first_seen) = seen_at_level.get(id) {
            let _ = writeln!(output, "{}{} -> (Ref to L{})", prefix, display_name(graph, id), first_seen);
            continue;
        }
        seen_at_level.insert(id, level);

        let value = values.get(id).copied().unwrap_or_default();
        let _ = writeln!(output, "{}[L{}] {} [{:.3}]", prefix, level, display_name(graph, id), value);

        let Some(kids) = children.get(id) else { continue };
        let stem = prefix.replace("`--", "   ").replace("|--", "|  ");
        for (i, child) in kids.iter().enumerate().rev() {
            let connector = if i == kids.len() - 1 { "`--" } else { "|--" };
            stack.push((*child, level + 1, format!("{}{} ", stem, connector)));
        }
    }
    output
}

fn display_name(graph: &IndicatorGraph, id: &IndicatorId) -> String {
    match graph.indicator(id) {
        Some(ind) if !ind.name.is_empty() => ind.name.clone(),
        _ => id.to_string(),
    }
}

fn format_edge(rel: &Relationship) -> String {
    format!(" [w={:.1}, s={:.2}]", rel.influence_weight, rel.influence_score.get())
}
