//! Variable-substitution visitors shared by copy propagation, constant
//! propagation and constant folding. Mirrors `replace_variables_in_stmt` in
//! the reference optimizer, split into two flavors: renaming one variable to
//! another (copy propagation) and inlining a constant in place of every
//! `VarRef` occurrence (constant propagation). `DotOp`'s `var_name`,
//! `StoreField`'s `ptr`/`rhs_var` and `PhiNode`'s incoming names are plain
//! variable slots, not `Value`s, so only `rename_var` touches them —
//! inlining a constant there would mean loading a field through an integer.

use ir3c_ir::{Cond, Expr, ExprKind, StmtKind, Value, ValueKind};

fn rename_value(v: &mut Value, from: &str, to: &str) -> bool {
    if v.as_var() == Some(from) {
        v.kind = ValueKind::VarRef(to.to_string());
        true
    } else {
        false
    }
}

fn rename_expr(e: &mut Expr, from: &str, to: &str) -> bool {
    match &mut e.kind {
        ExprKind::BinaryOp { lhs, rhs, .. } => rename_value(lhs, from, to) | rename_value(rhs, from, to),
        ExprKind::UnaryOp { value, .. } => rename_value(value, from, to),
        ExprKind::DotOp { var_name, .. } => {
            if var_name == from {
                *var_name = to.to_string();
                true
            } else {
                false
            }
        }
        ExprKind::ValueExpr(v) => rename_value(v, from, to),
        ExprKind::FnCallExpr(call) => call.args.iter_mut().fold(false, |acc, a| acc | rename_value(a, from, to)),
        ExprKind::NewOp(_) => false,
    }
}

fn rename_cond(c: &mut Cond, from: &str, to: &str) -> bool {
    match c {
        Cond::Value(v) => rename_value(v, from, to),
        Cond::RelOp { lhs, rhs, .. } => rename_value(lhs, from, to) | rename_value(rhs, from, to),
    }
}

/// Rename every use of `from` to `to` within one statement. Never touches a
/// def site (a statement's own `lhs`), matching the reference: copy
/// propagation only ever rewrites reads.
pub fn rename_var(kind: &mut StmtKind, from: &str, to: &str) -> bool {
    match kind {
        StmtKind::AssignOp { rhs, .. } => rename_expr(rhs, from, to),
        StmtKind::AssignDotOp { obj_name, rhs, .. } => {
            let mut changed = rename_expr(rhs, from, to);
            if obj_name == from {
                *obj_name = to.to_string();
                changed = true;
            }
            changed
        }
        StmtKind::FnCallStmt(call) => call.args.iter_mut().fold(false, |acc, a| acc | rename_value(a, from, to)),
        StmtKind::ReturnStmt(Some(v)) => rename_value(v, from, to),
        StmtKind::PrintLnCall(v) => rename_value(v, from, to),
        StmtKind::CondBranch(cond, _) => rename_cond(cond, from, to),
        StmtKind::StoreField { ptr, rhs_var, .. } => {
            let mut changed = false;
            if ptr == from {
                *ptr = to.to_string();
                changed = true;
            }
            if rhs_var == from {
                *rhs_var = to.to_string();
                changed = true;
            }
            changed
        }
        StmtKind::SpillVariable(var) | StmtKind::RestoreVariable(var) => {
            if var == from {
                *var = to.to_string();
                true
            } else {
                false
            }
        }
        StmtKind::PhiNode { incoming, .. } => incoming.iter_mut().fold(false, |acc, (_, v)| {
            if v == from {
                *v = to.to_string();
                acc | true
            } else {
                acc
            }
        }),
        _ => false,
    }
}

fn inline_value(v: &mut Value, var: &str, constant: i32) -> bool {
    if v.as_var() == Some(var) {
        v.kind = ValueKind::ConstantInt(constant);
        true
    } else {
        false
    }
}

fn inline_expr(e: &mut Expr, var: &str, constant: i32) -> bool {
    match &mut e.kind {
        ExprKind::BinaryOp { lhs, rhs, .. } => inline_value(lhs, var, constant) | inline_value(rhs, var, constant),
        ExprKind::UnaryOp { value, .. } => inline_value(value, var, constant),
        ExprKind::ValueExpr(v) => inline_value(v, var, constant),
        ExprKind::FnCallExpr(call) => call.args.iter_mut().fold(false, |acc, a| acc | inline_value(a, var, constant)),
        ExprKind::DotOp { .. } | ExprKind::NewOp(_) => false,
    }
}

fn inline_cond(c: &mut Cond, var: &str, constant: i32) -> bool {
    match c {
        Cond::Value(v) => inline_value(v, var, constant),
        Cond::RelOp { lhs, rhs, .. } => inline_value(lhs, var, constant) | inline_value(rhs, var, constant),
    }
}

/// Replace every `Value`-typed read of `var` with the constant `constant`.
/// Never touches `DotOp`/`StoreField`/`PhiNode` variable slots — those name
/// an object or a source block, not a value a constant could stand in for.
pub fn inline_const(kind: &mut StmtKind, var: &str, constant: i32) -> bool {
    match kind {
        StmtKind::AssignOp { rhs, .. } => inline_expr(rhs, var, constant),
        StmtKind::AssignDotOp { rhs, .. } => inline_expr(rhs, var, constant),
        StmtKind::FnCallStmt(call) => call.args.iter_mut().fold(false, |acc, a| acc | inline_value(a, var, constant)),
        StmtKind::ReturnStmt(Some(v)) => inline_value(v, var, constant),
        StmtKind::PrintLnCall(v) => inline_value(v, var, constant),
        StmtKind::CondBranch(cond, _) => inline_cond(cond, var, constant),
        _ => false,
    }
}
