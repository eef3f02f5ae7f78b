//! Backward liveness (spec.md §4.2, §4.5.1), ported from `cgliveness.analyse`.

use crate::cfg::StmtGraph;
use crate::defuse::defs_and_uses;
use crate::solver::{solve, Combine, Direction};
use ir3c_ir::FuncDefn;
use std::collections::HashSet;

pub struct Liveness {
    pub ins: Vec<HashSet<String>>,
    pub outs: Vec<HashSet<String>>,
    pub defs: Vec<HashSet<String>>,
    pub uses: Vec<HashSet<String>>,
}

/// Run liveness over every statement of `func`. The entry statement's
/// `defs` is augmented with every local and parameter so their lifetimes
/// are considered to start there (spec.md §4.5.1) — this is what lets the
/// interference graph see "live across the whole function" correctly for
/// incoming parameters never otherwise (re)defined.
pub fn analyse(func: &FuncDefn, graph: &StmtGraph) -> Liveness {
    let n = graph.len();
    let mut defs: Vec<HashSet<String>> = Vec::with_capacity(n);
    let mut uses: Vec<HashSet<String>> = Vec::with_capacity(n);
    for i in 0..n {
        let (d, u) = defs_and_uses(graph.stmt(func, i));
        defs.push(d);
        uses.push(u);
    }
    if let Some(entry) = graph.entry_stmt() {
        for v in func.all_vars() {
            defs[entry].insert(v.name.clone());
        }
    }

    let defs_ref = defs.clone();
    let uses_ref = uses.clone();
    let solution = solve(
        graph,
        Direction::Backward,
        Combine::Union,
        move |n| uses_ref[n].clone(),
        move |n| defs_ref[n].clone(),
    );

    Liveness {
        ins: solution.ins,
        outs: solution.outs,
        defs,
        uses,
    }
}
