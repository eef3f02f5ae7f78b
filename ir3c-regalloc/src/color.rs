//! Chaitin-style simplify/spill/select coloring (spec.md §4.5.3), ported
//! from `cgreg.colour_graph`.

use crate::graph::Graph;
use std::collections::{HashMap, HashSet};

pub enum ColorResult {
    Assigned {
        assignments: HashMap<String, String>,
        spills: HashSet<String>,
    },
    /// No free color was available for this variable during selection;
    /// the caller must spill it and retry from a clean allocation.
    NeedsSpill(String),
}

fn spill_cost(var: &str, uses: &HashMap<String, HashSet<usize>>, live_ranges: &HashMap<String, HashSet<usize>>, graph: &Graph) -> f64 {
    let use_count = uses.get(var).map(|s| s.len()).unwrap_or(0) as f64;
    let liveness = live_ranges.get(var).map(|s| s.len()).unwrap_or(0) as f64;
    use_count / (liveness + graph.degree(var) as f64)
}

pub fn colour_graph(
    graph: &Graph,
    registers: &[&str],
    uses: &HashMap<String, HashSet<usize>>,
    live_ranges: &HashMap<String, HashSet<usize>>,
    preferences: &HashMap<String, Vec<String>>,
    prespilled: &HashSet<String>,
) -> ColorResult {
    let mut graph = graph.clone();
    let mut prespilled: HashSet<String> = prespilled.clone();
    let mut stack: Vec<String> = Vec::new();
    let preassigned_vars: HashSet<String> = preferences.keys().cloned().collect();

    loop {
        let remaining = graph.remaining_nodes();
        if remaining.is_empty() {
            break;
        }

        if let Some(sel) = graph.simplifiable_node(registers.len(), &preassigned_vars) {
            graph.remove(&sel);
            stack.push(sel.clone());
            prespilled.remove(&sel);
            continue;
        }
        if let Some(sel) = graph.simplifiable_node(registers.len(), &HashSet::new()) {
            graph.remove(&sel);
            stack.push(sel.clone());
            prespilled.remove(&sel);
            continue;
        }

        let remaining_unspilled: Vec<String> = remaining.into_iter().filter(|v| !prespilled.contains(v)).collect();
        if remaining_unspilled.is_empty() {
            break;
        }

        let mut ranked: Vec<(String, f64)> = remaining_unspilled
            .into_iter()
            .map(|v| {
                let cost = spill_cost(&v, uses, live_ranges, &graph);
                (v, cost)
            })
            .collect();
        // Sort by name first, then by cost, so equal-cost ties land in
        // deterministic name order (spec.md §4.5.3).
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("spill cost is never NaN"));
        let sel = ranked.into_iter().next().expect("checked non-empty above").0;
        graph.remove(&sel);
        stack.push(sel);
    }

    let spills = prespilled.clone();
    let mut remaining_prespilled: Vec<String> = prespilled.into_iter().collect();
    remaining_prespilled.sort();
    for ps in remaining_prespilled {
        graph.remove(&ps);
        stack.push(ps);
    }

    let mut assignments: HashMap<String, String> = HashMap::new();
    while let Some(var) = stack.pop() {
        graph.unremove(&var);
        let neighbours = graph.neighbours(&var);
        let used_regs: HashSet<&str> = neighbours.iter().filter_map(|n| assignments.get(n).map(String::as_str)).collect();
        let free_regs: Vec<&str> = registers.iter().copied().filter(|r| !used_regs.contains(r)).collect();

        if free_regs.is_empty() {
            return ColorResult::NeedsSpill(var);
        }

        let chosen = preferences
            .get(&var)
            .and_then(|prefs| prefs.iter().find(|p| free_regs.contains(&p.as_str())))
            .cloned()
            .unwrap_or_else(|| free_regs[0].to_string());
        assignments.insert(var, chosen);
    }

    ColorResult::Assigned { assignments, spills }
}
