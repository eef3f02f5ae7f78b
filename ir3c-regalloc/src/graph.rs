//! The undirected interference graph itself (spec.md §4.5.3), ported from
//! the reference compiler's `cgreg.Graph`: an adjacency map plus a
//! "removed" set standing in for the simplify/select decision stack's
//! notion of a node currently off the graph, rather than actually deleting
//! edges (which would have to be restored bit-for-bit on `unremove`).

use std::collections::{HashMap, HashSet};

#[derive(Clone, Default)]
pub struct Graph {
    edges: HashMap<String, HashSet<String>>,
    removed: HashSet<String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, var: &str) {
        self.edges.entry(var.to_string()).or_default();
    }

    pub fn interfere(&mut self, a: &str, b: &str) {
        self.edges.entry(a.to_string()).or_default().insert(b.to_string());
        self.edges.entry(b.to_string()).or_default().insert(a.to_string());
    }

    pub fn remove(&mut self, var: &str) {
        self.removed.insert(var.to_string());
    }

    pub fn unremove(&mut self, var: &str) {
        self.removed.remove(var);
    }

    pub fn degree(&self, var: &str) -> usize {
        self.edges
            .get(var)
            .map(|ns| ns.iter().filter(|n| !self.removed.contains(*n)).count())
            .unwrap_or(0)
    }

    pub fn neighbours(&self, var: &str) -> HashSet<String> {
        if self.removed.contains(var) {
            return HashSet::new();
        }
        self.edges
            .get(var)
            .map(|ns| ns.iter().filter(|n| !self.removed.contains(*n)).cloned().collect())
            .unwrap_or_default()
    }

    /// Every node still on the graph, in deterministic (sorted) order.
    pub fn remaining_nodes(&self) -> Vec<String> {
        let mut out: Vec<String> = self.edges.keys().filter(|v| !self.removed.contains(*v)).cloned().collect();
        out.sort();
        out
    }

    /// The first (in name order) node not excluded, not removed, with
    /// degree below `max_degree` — a node safe to push onto the decision
    /// stack without risking a spill (spec.md §4.5.3).
    pub fn simplifiable_node(&self, max_degree: usize, exclude: &HashSet<String>) -> Option<String> {
        let mut names: Vec<&String> = self.edges.keys().collect();
        names.sort();
        for var in names {
            if !self.removed.contains(var) && !exclude.contains(var) && self.degree(var) < max_degree {
                return Some(var.clone());
            }
        }
        None
    }
}
