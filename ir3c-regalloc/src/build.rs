//! Builds the interference graph and the per-variable live-range/use/def
//! index sets that coloring and spill-cost estimation need (spec.md
//! §4.5.1), from a [`Liveness`] solution already computed over the
//! function's statement graph.

use crate::graph::Graph;
use ir3c_dataflow::Liveness;
use std::collections::{HashMap, HashSet};

pub struct Built {
    pub graph: Graph,
    /// `var -> { n : var is live-in at statement n }` (spec.md §4.5.1 — only
    /// live-*in* sets participate in interference; see the reference's own
    /// note on why OUT would be wrong).
    pub live_ranges: HashMap<String, HashSet<usize>>,
    pub var_uses: HashMap<String, HashSet<usize>>,
    pub var_defs: HashMap<String, HashSet<usize>>,
}

pub fn build_interference(liveness: &Liveness) -> Built {
    let n = liveness.ins.len();
    let mut live_ranges: HashMap<String, HashSet<usize>> = HashMap::new();
    for i in 0..n {
        for v in &liveness.ins[i] {
            live_ranges.entry(v.clone()).or_default().insert(i);
        }
    }

    let mut graph = Graph::new();
    for var in live_ranges.keys() {
        graph.add_node(var);
    }
    let vars: Vec<&String> = live_ranges.keys().collect();
    for (i, a) in vars.iter().enumerate() {
        for b in &vars[i + 1..] {
            if !live_ranges[*a].is_disjoint(&live_ranges[*b]) {
                graph.interfere(a, b);
            }
        }
    }

    let mut var_uses: HashMap<String, HashSet<usize>> = HashMap::new();
    let mut var_defs: HashMap<String, HashSet<usize>> = HashMap::new();
    for i in 0..n {
        for u in &liveness.uses[i] {
            var_uses.entry(u.clone()).or_default().insert(i);
        }
        for d in &liveness.defs[i] {
            var_defs.entry(d.clone()).or_default().insert(i);
        }
    }

    Built {
        graph,
        live_ranges,
        var_uses,
        var_defs,
    }
}
