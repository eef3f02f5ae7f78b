//! Field-store splitting (spec.md §4.4): `AssignDotOp` is not itself a
//! machine instruction the emitter can lower directly, since its rhs may be
//! an arbitrary expression and its lhs is a memory write rather than a
//! register def. Split it into a temporary holding the evaluated
//! expression and a `StoreField` pseudo-statement that just moves a
//! register into memory, so every real `Expr` ends up on the rhs of a
//! plain variable assignment.

use ir3c_ir::{FuncDefn, Stmt, StmtKind, VarDecl};

pub fn split_field_stores(func: &mut FuncDefn) {
    let mut counter: u32 = 0;
    let mut new_locals = Vec::new();
    for &block in &func.order.clone() {
        let old = std::mem::take(&mut func.block_mut(block).stmts);
        let mut rebuilt = Vec::with_capacity(old.len());
        for stmt in old {
            let Stmt { kind, span, .. } = stmt;
            match kind {
                StmtKind::AssignDotOp {
                    obj_name,
                    field_name,
                    rhs,
                    field_type,
                } => {
                    let name = format!("_s{}", counter);
                    counter += 1;
                    new_locals.push(VarDecl::new(name.clone(), field_type.clone()));
                    rebuilt.push(Stmt::new(
                        StmtKind::AssignOp {
                            lhs: name.clone(),
                            rhs,
                        },
                        span.clone(),
                    ));
                    rebuilt.push(Stmt::new(
                        StmtKind::StoreField {
                            ptr: obj_name,
                            field: field_name,
                            rhs_var: name,
                            field_type,
                        },
                        span,
                    ));
                }
                other => rebuilt.push(Stmt::new(other, span)),
            }
        }
        func.block_mut(block).stmts = rebuilt;
    }
    func.locals.extend(new_locals);
}
