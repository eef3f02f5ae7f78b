//! The fixed-point loop of spec.md §4.3: renumber, then try passes 1-4
//! (structural), then 5-7 (dataflow-based), then 8-9 (folding/cleanup);
//! restart from the top on any change. Ported from the reference
//! optimizer's `optimise`, including its ~500-iteration safety cap against a
//! pathological pass pair that never converges.

use crate::passes::*;
use crate::renumber::renumber;
use ir3c_dataflow::StmtGraph;
use ir3c_ir::{rebuild_cfg, FuncDefn, Program};

const MAX_ITERATIONS: u32 = 500;

/// Run the pipeline to a fixed point on one function, in place.
pub fn optimise_function(func: &mut FuncDefn) {
    rebuild_cfg(func);
    for _ in 0..MAX_ITERATIONS {
        renumber(func);

        if remove_unreachable_blocks(func) {
            rebuild_cfg(func);
            continue;
        }
        if remove_double_jumps(func) {
            rebuild_cfg(func);
            continue;
        }
        if remove_redundant_temporaries(func) {
            continue;
        }
        if remove_unused_variables(func) {
            continue;
        }

        let graph = StmtGraph::build(func);
        if eliminate_common_subexpressions(func, &graph) {
            continue;
        }
        if propagate_copies(func, &graph) {
            continue;
        }
        if propagate_constants(func, &graph) {
            continue;
        }

        let folded = fold_constants(func);
        let cleaned = remove_unreachable_statements(func);
        if folded || cleaned {
            rebuild_cfg(func);
            continue;
        }
        break;
    }
}

/// Run [`optimise_function`] over every function in `program`.
pub fn optimise_program(program: &mut Program) {
    for func in &mut program.functions {
        optimise_function(func);
    }
}
