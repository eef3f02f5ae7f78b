//! The three forward, intersection-combined specializations named in
//! spec.md §4.2 / §4.3: reaching expressions (CSE), reaching copies (copy
//! propagation), reaching constants (constant propagation). Each is a thin
//! `gen`/`kill` pair over [`solver::solve`].

use crate::cfg::StmtGraph;
use crate::defuse::defs_and_uses;
use crate::solver::{solve, Combine, Direction, Solution};
use ir3c_ir::{ExprId, ExprKind, FuncDefn, StmtKind};
use std::collections::{HashMap, HashSet};

pub struct ExprReaching {
    pub solution: Solution<ExprId>,
    /// The statement that generated each expression id, so a later use can
    /// be rewritten to a `VarRef` of that statement's lhs.
    pub generator_lhs: HashMap<ExprId, String>,
}

/// Forward reaching-expressions: an assignment `_t = E` (non-side-effecting)
/// generates `E`'s id; any statement defining a variable `E` reads kills
/// every expression whose operands overlap (spec.md §4.3 pass 5).
pub fn reaching_expressions(func: &FuncDefn, graph: &StmtGraph) -> ExprReaching {
    let mut generator_lhs = HashMap::new();
    let mut operand_vars: HashMap<ExprId, HashSet<String>> = HashMap::new();
    for n in 0..graph.len() {
        if let StmtKind::AssignOp { lhs, rhs } = &graph.stmt(func, n).kind {
            if !rhs.has_side_effect() {
                generator_lhs.insert(rhs.id, lhs.clone());
                operand_vars.insert(
                    rhs.id,
                    rhs.operand_vars().into_iter().map(String::from).collect(),
                );
            }
        }
    }

    let gen = |n: usize| -> HashSet<ExprId> {
        match &graph.stmt(func, n).kind {
            StmtKind::AssignOp { rhs, .. } if !rhs.has_side_effect() => HashSet::from([rhs.id]),
            _ => HashSet::new(),
        }
    };
    let kill = |n: usize| -> HashSet<ExprId> {
        let (defs, _) = defs_and_uses(graph.stmt(func, n));
        operand_vars
            .iter()
            .filter(|(_, vars)| vars.iter().any(|v| defs.contains(v)))
            .map(|(id, _)| *id)
            .collect()
    };

    let solution = solve(graph, Direction::Forward, Combine::Intersection, gen, kill);
    ExprReaching { solution, generator_lhs }
}

/// Forward reaching-copies: `x = v` (a bare `VarRef` rhs) generates `(x,
/// v)`; nothing is ever killed since every temporary is assigned exactly
/// once (spec.md §4.3 pass 6).
pub fn reaching_copies(func: &FuncDefn, graph: &StmtGraph) -> Solution<(String, String)> {
    let gen = |n: usize| -> HashSet<(String, String)> {
        match &graph.stmt(func, n).kind {
            StmtKind::AssignOp { lhs, rhs } => match &rhs.kind {
                ExprKind::ValueExpr(v) => v
                    .as_var()
                    .map(|src| HashSet::from([(lhs.clone(), src.to_string())]))
                    .unwrap_or_default(),
                _ => HashSet::new(),
            },
            _ => HashSet::new(),
        }
    };
    solve(graph, Direction::Forward, Combine::Intersection, gen, |_| HashSet::new())
}

/// Forward reaching-constants: `v = c` generates `(v, c)`; any reassignment
/// of `v` kills every `(v, *)` fact (spec.md §4.3 pass 7). `(v, *)` is
/// implemented by precomputing the finite universe of facts that ever get
/// generated and filtering it by variable name at each kill site, since a
/// fixed `HashSet` kill mask can't otherwise express a wildcard.
pub fn reaching_constants(func: &FuncDefn, graph: &StmtGraph) -> Solution<(String, i32)> {
    let gen = |n: usize| -> HashSet<(String, i32)> {
        match &graph.stmt(func, n).kind {
            StmtKind::AssignOp { lhs, rhs } => match &rhs.kind {
                ExprKind::ValueExpr(v) => v
                    .as_int()
                    .map(|c| HashSet::from([(lhs.clone(), c)]))
                    .unwrap_or_default(),
                _ => HashSet::new(),
            },
            _ => HashSet::new(),
        }
    };

    let universe: HashSet<(String, i32)> = (0..graph.len()).flat_map(gen).collect();

    let kill = |n: usize| -> HashSet<(String, i32)> {
        let (defs, _) = defs_and_uses(graph.stmt(func, n));
        universe.iter().filter(|(v, _)| defs.contains(v)).cloned().collect()
    };

    solve(graph, Direction::Forward, Combine::Intersection, gen, kill)
}
