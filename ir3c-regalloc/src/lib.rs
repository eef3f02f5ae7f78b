//! Chaitin-style graph-coloring register allocation (spec.md §4.5), ported
//! from `cgreg.allocate_registers`/`alloc_function`. Unlike the reference,
//! lowering is a separate pipeline stage owned by `ir3c-lower` and run
//! exactly once by the umbrella crate before allocation ever starts — this
//! crate assumes its input is already lowered and never calls into
//! `ir3c-lower` itself (see DESIGN.md).

mod build;
mod color;
mod graph;
mod preferences;
mod spill;

pub use graph::Graph;

use color::ColorResult;
use ir3c_dataflow::{analyse_liveness, StmtGraph};
use ir3c_diagnostics::Ir3cResult;
use ir3c_ir::{FuncDefn, Program};
use std::collections::{HashMap, HashSet};

/// The ten-register pool available to the allocator (spec.md §4.5): the
/// five ARM EABI callee-saved variable registers followed by the first
/// four argument registers (freed up for variables once their incoming
/// argument has been consumed) and the frame pointer's alias slot.
pub const REGISTERS: [&str; 10] = ["v1", "v2", "v3", "v4", "v5", "a1", "a2", "a3", "a4", "fp"];

/// How many spill retries a single function may need before something is
/// badly wrong — `cgreg`'s "invalid double spill" case.
const MAX_SPILL_ROUNDS: usize = 64;

pub struct AllocationResult {
    /// Every variable's assigned register.
    pub assignments: HashMap<String, String>,
    /// Variables that ended up spilled to the stack instead of colored.
    pub spills: HashSet<String>,
    /// Per-register set of (post-allocation, post-spill-insertion)
    /// statement ids where that register holds a live value (spec.md
    /// §4.5.5 item 3) — the emitter uses this to decide which caller-saved
    /// registers need saving across each call site.
    pub reg_live_ranges: HashMap<String, HashSet<usize>>,
}

/// Allocate registers for one function, inserting `SpillVariable`/
/// `RestoreVariable` pseudo-statements in place as needed. `func` must
/// already have been through `ir3c_lower::lower_function`.
pub fn allocate_registers(func: &mut FuncDefn) -> Ir3cResult<AllocationResult> {
    let mut already_spilled: HashSet<String> = HashSet::new();

    for _round in 0..MAX_SPILL_ROUNDS {
        ir3c_opt::renumber(func);
        let graph = StmtGraph::build(func);
        let liveness = analyse_liveness(func, &graph);
        let built = build::build_interference(&liveness);
        let preferences = preferences::compute_preferences(func);

        let first_four_params: HashSet<String> = func.params.iter().take(4).map(|p| p.name.clone()).collect();

        match color::colour_graph(
            &built.graph,
            &REGISTERS,
            &built.var_uses,
            &built.live_ranges,
            &preferences,
            &already_spilled,
        ) {
            ColorResult::Assigned { assignments, spills } => {
                spill::insert_spill_restore(func, &graph, &spills, &built.var_uses, &built.var_defs, &first_four_params);

                ir3c_opt::renumber(func);
                let final_graph = StmtGraph::build(func);
                let final_liveness = analyse_liveness(func, &final_graph);
                let mut reg_live_ranges: HashMap<String, HashSet<usize>> = HashMap::new();
                for (i, live_in) in final_liveness.ins.iter().enumerate() {
                    for var in live_in {
                        if let Some(reg) = assignments.get(var) {
                            reg_live_ranges.entry(reg.clone()).or_default().insert(i);
                        }
                    }
                }

                return Ok(AllocationResult {
                    assignments,
                    spills,
                    reg_live_ranges,
                });
            }
            ColorResult::NeedsSpill(var) => {
                if !already_spilled.insert(var.clone()) {
                    return Err(ir3c_diagnostics::Ir3cError::invariant(format!(
                        "invalid double spill of `{var}` in `{}`",
                        func.mangled_name
                    )));
                }
                // Mutate `func` now, same as the reference's `alloc_function`
                // (`examples/original_source/src/cgreg.py:150-186`): wrapping
                // every use/def of `var` in short-lived
                // `RestoreVariable`/`SpillVariable` pseudo-ops is what lowers
                // register pressure for the next round's interference graph.
                // Without this the retry recolors the exact same graph and
                // never converges.
                let just_spilled: HashSet<String> = std::iter::once(var).collect();
                spill::insert_spill_restore(func, &graph, &just_spilled, &built.var_uses, &built.var_defs, &first_four_params);
            }
        }
    }

    Err(ir3c_diagnostics::Ir3cError::invariant(format!(
        "register allocation did not converge for `{}` after {MAX_SPILL_ROUNDS} spill rounds",
        func.mangled_name
    )))
}

pub fn allocate_program(program: &mut Program) -> Ir3cResult<HashMap<String, AllocationResult>> {
    let mut results = HashMap::new();
    for func in program.functions.iter_mut() {
        let result = allocate_registers(func)?;
        results.insert(func.mangled_name.clone(), result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_ir::{Expr, FunctionBuilder, Stmt, StmtKind, Type, Value, VarDecl};
    use ir3c_diagnostics::Span;

    fn synth() -> Span {
        Span::synthetic()
    }

    fn straight_line_func(locals: usize) -> FuncDefn {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        for i in 0..locals {
            func.locals.push(VarDecl::new(format!("t{i}"), Type::Int));
        }
        let mut b = FunctionBuilder::new(&mut func);
        for i in 0..locals {
            b.push(Stmt::new(
                StmtKind::AssignOp {
                    lhs: format!("t{i}"),
                    rhs: Expr::value(Value::int(i as i32, synth()), synth()),
                },
                synth(),
            ));
        }
        let sum_var = if locals > 0 { format!("t{}", locals - 1) } else { "t0".to_string() };
        b.terminate(
            Stmt::new(StmtKind::ReturnStmt(Some(Value::var(&sum_var, synth()))), synth()),
            &[],
        );
        func
    }

    #[test]
    fn a_handful_of_disjoint_locals_all_fit_without_spilling() {
        let mut func = straight_line_func(3);
        let result = allocate_registers(&mut func).unwrap();
        assert!(result.spills.is_empty());
        assert_eq!(result.assignments.len(), 3);
    }

    #[test]
    fn parameters_in_the_first_four_slots_prefer_argument_registers() {
        let mut func = FuncDefn::new(
            "f",
            "_JMain_fE",
            Type::Int,
            vec![VarDecl::new("p0", Type::Int), VarDecl::new("p1", Type::Int)],
            synth(),
        );
        let mut b = FunctionBuilder::new(&mut func);
        b.terminate(Stmt::new(StmtKind::ReturnStmt(Some(Value::var("p0", synth()))), synth()), &[]);
        let result = allocate_registers(&mut func).unwrap();
        assert_eq!(result.assignments.get("p0").map(String::as_str), Some("a1"));
    }

    #[test]
    fn more_live_locals_than_registers_forces_a_spill() {
        let mut func = straight_line_func(REGISTERS.len() + 3);
        // force every local live at once by summing them all at the tail
        let sum_block = func.entry;
        let mut acc = "t0".to_string();
        for i in 1..(REGISTERS.len() + 3) {
            let next = format!("acc{i}");
            func.locals.push(VarDecl::new(&next, Type::Int));
            func.block_mut(sum_block).stmts.insert(
                func.block_mut(sum_block).stmts.len() - 1,
                Stmt::new(
                    StmtKind::AssignOp {
                        lhs: next.clone(),
                        rhs: Expr::binary(
                            Value::var(&acc, synth()),
                            ir3c_ir::BinOp::Add,
                            Value::var(format!("t{i}"), synth()),
                            synth(),
                        ),
                    },
                    synth(),
                ),
            );
            acc = next;
        }
        func.block_mut(sum_block).stmts.pop();
        func.block_mut(sum_block)
            .stmts
            .push(Stmt::new(StmtKind::ReturnStmt(Some(Value::var(&acc, synth()))), synth()));

        let result = allocate_registers(&mut func).unwrap();
        assert!(!result.spills.is_empty());
    }
}
