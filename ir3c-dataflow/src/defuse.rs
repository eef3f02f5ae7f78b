//! `defs(stmt)`/`uses(stmt)` over variable names (spec.md §4.2), ported
//! statement-kind-for-statement-kind from the reference compiler's
//! `get_defs_and_uses`.

use ir3c_ir::{Cond, Expr, ExprKind, Stmt, StmtKind, Value};
use std::collections::HashSet;

fn value_uses(v: &Value, out: &mut HashSet<String>) {
    if let Some(name) = v.as_var() {
        out.insert(name.to_string());
    }
}

fn expr_uses(e: &Expr) -> HashSet<String> {
    let mut out = HashSet::new();
    match &e.kind {
        ExprKind::BinaryOp { lhs, rhs, .. } => {
            value_uses(lhs, &mut out);
            value_uses(rhs, &mut out);
        }
        ExprKind::UnaryOp { value, .. } => value_uses(value, &mut out),
        ExprKind::DotOp { var_name, .. } => {
            out.insert(var_name.clone());
        }
        ExprKind::ValueExpr(v) => value_uses(v, &mut out),
        ExprKind::FnCallExpr(call) => {
            for a in &call.args {
                value_uses(a, &mut out);
            }
        }
        ExprKind::NewOp(_) => {}
    }
    out
}

fn cond_uses(c: &Cond) -> HashSet<String> {
    let mut out = HashSet::new();
    match c {
        Cond::Value(v) => value_uses(v, &mut out),
        Cond::RelOp { lhs, rhs, .. } => {
            value_uses(lhs, &mut out);
            value_uses(rhs, &mut out);
        }
    }
    out
}

/// `(defs, uses)` for one statement, matching `get_defs_and_uses` exactly,
/// including its pseudo-op cases (`AssignConstInt`/`AssignConstString`
/// def, `SpillVariable` uses, `RestoreVariable` defs, `StoreField` uses
/// both operands).
pub fn defs_and_uses(stmt: &Stmt) -> (HashSet<String>, HashSet<String>) {
    match &stmt.kind {
        StmtKind::FnCallStmt(call) => {
            let mut uses = HashSet::new();
            for a in &call.args {
                value_uses(a, &mut uses);
            }
            (HashSet::new(), uses)
        }
        StmtKind::ReturnStmt(value) => {
            let mut uses = HashSet::new();
            if let Some(v) = value {
                value_uses(v, &mut uses);
            }
            (HashSet::new(), uses)
        }
        StmtKind::ReadLnCall(name) => (HashSet::from([name.clone()]), HashSet::new()),
        StmtKind::PrintLnCall(v) => {
            let mut uses = HashSet::new();
            value_uses(v, &mut uses);
            (HashSet::new(), uses)
        }
        StmtKind::AssignOp { lhs, rhs } => (HashSet::from([lhs.clone()]), expr_uses(rhs)),
        StmtKind::AssignDotOp { obj_name, rhs, .. } => {
            let mut uses = expr_uses(rhs);
            uses.insert(obj_name.clone());
            (HashSet::new(), uses)
        }
        StmtKind::CondBranch(cond, _) => (HashSet::new(), cond_uses(cond)),
        StmtKind::AssignConstInt(lhs, _) => (HashSet::from([lhs.clone()]), HashSet::new()),
        StmtKind::AssignConstString(lhs, _) => (HashSet::from([lhs.clone()]), HashSet::new()),
        StmtKind::SpillVariable(var) => (HashSet::new(), HashSet::from([var.clone()])),
        StmtKind::RestoreVariable(var) => (HashSet::from([var.clone()]), HashSet::new()),
        StmtKind::StoreField { ptr, rhs_var, .. } => {
            (HashSet::new(), HashSet::from([ptr.clone(), rhs_var.clone()]))
        }
        StmtKind::PhiNode { lhs, incoming } => (
            HashSet::from([lhs.clone()]),
            incoming.iter().map(|(_, v)| v.clone()).collect(),
        ),
        StmtKind::Branch(_) | StmtKind::Label(_) | StmtKind::DummyStmt => {
            (HashSet::new(), HashSet::new())
        }
    }
}
