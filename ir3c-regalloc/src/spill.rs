//! Spill/restore pseudo-op insertion (spec.md §4.5.4), ported from
//! `cgreg.alloc_function`'s post-colouring rewrite.

use ir3c_dataflow::StmtGraph;
use ir3c_ir::{FuncDefn, Stmt, StmtKind};
use std::collections::{HashMap, HashSet};

/// Wraps every use and def of a spilled variable with `RestoreVariable`
/// and `SpillVariable` pseudo-statements. The entry block's synthetic
/// def (graph index 0, spec.md §4.4's `DummyStmt`) stands in for every
/// local and parameter at once; for locals that def is fictitious and
/// gets no spill, but the first four parameters really do arrive in
/// `a1..a4` there and so really do need spilling to their home slot.
pub fn insert_spill_restore(
    func: &mut FuncDefn,
    graph: &StmtGraph,
    spills: &HashSet<String>,
    var_uses: &HashMap<String, HashSet<usize>>,
    var_defs: &HashMap<String, HashSet<usize>>,
    first_four_params: &HashSet<String>,
) {
    if spills.is_empty() {
        return;
    }

    let blocks: Vec<_> = func.blocks_in_order().map(|(id, _)| id).collect();
    for block in blocks {
        let old_stmts = std::mem::take(&mut func.block_mut(block).stmts);
        let mut new_stmts: Vec<Stmt> = Vec::with_capacity(old_stmts.len());

        for (i, stmt) in old_stmts.into_iter().enumerate() {
            let Some(n) = graph.index_of(block, i) else {
                new_stmts.push(stmt);
                continue;
            };
            let span = stmt.span.clone();

            let mut used_here: Vec<String> = spills
                .iter()
                .filter(|v| var_uses.get(*v).is_some_and(|s| s.contains(&n)))
                .cloned()
                .collect();
            used_here.sort();
            for v in &used_here {
                new_stmts.push(Stmt::new(StmtKind::RestoreVariable(v.clone()), span.clone()));
            }

            new_stmts.push(stmt);

            let mut defined_here: Vec<String> = spills
                .iter()
                .filter(|v| var_defs.get(*v).is_some_and(|s| s.contains(&n)))
                .cloned()
                .collect();
            defined_here.sort();
            for v in &defined_here {
                if n == 0 && !first_four_params.contains(v) {
                    continue;
                }
                new_stmts.push(Stmt::new(StmtKind::SpillVariable(v.clone()), span.clone()));
            }
        }

        func.block_mut(block).stmts = new_stmts;
    }
}
