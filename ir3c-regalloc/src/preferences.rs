//! Coalescing-lite preference hints (spec.md §4.5.2): incoming parameters
//! and call arguments in positions 0..3 are nudged toward the ARM EABI
//! argument registers they'd otherwise have to be shuffled into, ported
//! from `cgreg.allocate_registers`'s `preassigned_tmp` bookkeeping.

use ir3c_ir::{ExprKind, FnCall, FuncDefn, StmtKind};
use std::collections::HashMap;

const ARG_REGS: [&str; 4] = ["a1", "a2", "a3", "a4"];

fn bump(counts: &mut HashMap<String, HashMap<String, u32>>, var: &str, reg: &str) {
    *counts.entry(var.to_string()).or_default().entry(reg.to_string()).or_insert(0) += 1;
}

fn call_of(kind: &StmtKind) -> Option<&FnCall> {
    match kind {
        StmtKind::FnCallStmt(call) => Some(call),
        StmtKind::AssignOp { rhs, .. } | StmtKind::AssignDotOp { rhs, .. } => match &rhs.kind {
            ExprKind::FnCallExpr(call) => Some(call),
            _ => None,
        },
        _ => None,
    }
}

/// For each variable, a descending-preference list of registers worth
/// trying first during selection. Ties are broken by register name so the
/// result is reproducible across runs.
pub fn compute_preferences(func: &FuncDefn) -> HashMap<String, Vec<String>> {
    let mut counts: HashMap<String, HashMap<String, u32>> = HashMap::new();

    for (i, param) in func.params.iter().take(4).enumerate() {
        if !func.locals.iter().any(|l| l.name == param.name) {
            bump(&mut counts, &param.name, ARG_REGS[i]);
        }
    }

    for (_, block) in func.blocks_in_order() {
        for stmt in &block.stmts {
            let Some(call) = call_of(&stmt.kind) else { continue };
            for (i, arg) in call.args.iter().take(4).enumerate() {
                if let Some(name) = arg.as_var() {
                    bump(&mut counts, name, ARG_REGS[i]);
                }
            }
        }
    }

    counts
        .into_iter()
        .map(|(var, regs)| {
            let mut ranked: Vec<(String, u32)> = regs.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            (var, ranked.into_iter().map(|(r, _)| r).collect())
        })
        .collect()
}
