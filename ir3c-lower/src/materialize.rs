//! Constant materialization (spec.md §4.4), ported from the reference
//! compiler's `cglower.lower_const_value`/`lower_expr`/`lower_stmt`: any
//! integer constant outside the signed 9-bit immediate range, and every
//! string constant, is hoisted into a fresh temporary defined by a pseudo
//! `AssignConstInt`/`AssignConstString` immediately before the statement
//! that used it.

use ir3c_ir::{Cond, Expr, ExprKind, FnCall, FuncDefn, Stmt, StmtKind, Type, Value, VarDecl};

struct Counter(u32);

impl Counter {
    fn next_name(&mut self) -> String {
        let name = format!("_c{}", self.0);
        self.0 += 1;
        name
    }
}

/// Replace `value` with a `VarRef` to a fresh temporary if it needs
/// materializing, appending the pseudo-assign statement (if any) to `pre`
/// and the temporary's declaration to `locals`.
fn materialize_value(value: &Value, ctr: &mut Counter, pre: &mut Vec<Stmt>, locals: &mut Vec<VarDecl>) -> Value {
    match &value.kind {
        _ if value.is_small_int() => value.clone(),
        ir3c_ir::ValueKind::ConstantInt(v) => {
            let name = ctr.next_name();
            locals.push(VarDecl::new(name.clone(), Type::Int));
            pre.push(Stmt::new(StmtKind::AssignConstInt(name.clone(), *v), value.span.clone()));
            Value::var(name, value.span.clone())
        }
        ir3c_ir::ValueKind::ConstantString(bytes) => {
            let name = ctr.next_name();
            locals.push(VarDecl::new(name.clone(), Type::String));
            pre.push(Stmt::new(
                StmtKind::AssignConstString(name.clone(), bytes.clone()),
                value.span.clone(),
            ));
            Value::var(name, value.span.clone())
        }
        _ => value.clone(),
    }
}

fn materialize_expr(expr: &Expr, ctr: &mut Counter, pre: &mut Vec<Stmt>, locals: &mut Vec<VarDecl>) -> Expr {
    let kind = match &expr.kind {
        ExprKind::BinaryOp { lhs, op, rhs } => ExprKind::BinaryOp {
            lhs: materialize_value(lhs, ctr, pre, locals),
            op: *op,
            rhs: materialize_value(rhs, ctr, pre, locals),
        },
        ExprKind::UnaryOp { op, value } => ExprKind::UnaryOp {
            op: *op,
            value: materialize_value(value, ctr, pre, locals),
        },
        ExprKind::ValueExpr(v) => ExprKind::ValueExpr(materialize_value(v, ctr, pre, locals)),
        ExprKind::FnCallExpr(call) => ExprKind::FnCallExpr(FnCall::new(
            call.callee.clone(),
            call.args.iter().map(|a| materialize_value(a, ctr, pre, locals)).collect(),
        )),
        ExprKind::DotOp { .. } | ExprKind::NewOp(_) => expr.kind.clone(),
    };
    Expr::new(kind, expr.span.clone())
}

fn materialize_cond(cond: &Cond, ctr: &mut Counter, pre: &mut Vec<Stmt>, locals: &mut Vec<VarDecl>) -> Cond {
    match cond {
        Cond::RelOp { lhs, op, rhs } => Cond::RelOp {
            lhs: materialize_value(lhs, ctr, pre, locals),
            op: *op,
            rhs: materialize_value(rhs, ctr, pre, locals),
        },
        Cond::Value(_) => cond.clone(),
    }
}

fn materialize_stmt(stmt: Stmt, ctr: &mut Counter, locals: &mut Vec<VarDecl>, out: &mut Vec<Stmt>) {
    let mut pre = Vec::new();
    let span = stmt.span.clone();
    let kind = match stmt.kind {
        StmtKind::AssignOp { lhs, rhs } => StmtKind::AssignOp {
            lhs,
            rhs: materialize_expr(&rhs, ctr, &mut pre, locals),
        },
        StmtKind::AssignDotOp {
            obj_name,
            field_name,
            rhs,
            field_type,
        } => StmtKind::AssignDotOp {
            obj_name,
            field_name,
            rhs: materialize_expr(&rhs, ctr, &mut pre, locals),
            field_type,
        },
        StmtKind::PrintLnCall(v) => StmtKind::PrintLnCall(materialize_value(&v, ctr, &mut pre, locals)),
        StmtKind::FnCallStmt(call) => StmtKind::FnCallStmt(FnCall::new(
            call.callee,
            call.args.iter().map(|a| materialize_value(a, ctr, &mut pre, locals)).collect(),
        )),
        StmtKind::ReturnStmt(Some(v)) => StmtKind::ReturnStmt(Some(materialize_value(&v, ctr, &mut pre, locals))),
        StmtKind::CondBranch(cond, label) => {
            StmtKind::CondBranch(materialize_cond(&cond, ctr, &mut pre, locals), label)
        }
        other => other,
    };
    out.extend(pre);
    out.push(Stmt::new(kind, span));
}

/// Run materialization over every statement of `func`, in block emission
/// order, threading one temporary counter through the whole function (so
/// `_c0`, `_c1`, … never collide across blocks).
pub fn materialize_constants(func: &mut FuncDefn) {
    let mut ctr = Counter(0);
    let mut new_locals = Vec::new();
    for &block in &func.order.clone() {
        let old = std::mem::take(&mut func.block_mut(block).stmts);
        let mut rebuilt = Vec::with_capacity(old.len());
        for stmt in old {
            materialize_stmt(stmt, &mut ctr, &mut new_locals, &mut rebuilt);
        }
        func.block_mut(block).stmts = rebuilt;
    }
    func.locals.extend(new_locals);
}
