//! Dense renumbering of statement and expression ids, run once at the top
//! of every optimizer iteration (spec.md §4.3 preamble). Structural
//! passes 1-4 may invalidate prior numbering by removing/reordering
//! statements, so the driver restarts before CSE/copy/constant
//! propagation (passes 5-7) ever see a stale id.

use cranelift_entity::EntityRef;
use ir3c_ir::{ExprId, FuncDefn, StmtId, StmtKind};

pub fn renumber(func: &mut FuncDefn) {
    let mut stmt_counter: usize = 0;
    let mut expr_counter: usize = 0;
    let order = func.order.clone();
    for block in order {
        for stmt in &mut func.block_mut(block).stmts {
            stmt.id = StmtId::new(stmt_counter);
            stmt_counter += 1;
            if let StmtKind::AssignOp { rhs, .. } | StmtKind::AssignDotOp { rhs, .. } = &mut stmt.kind {
                rhs.id = ExprId::new(expr_counter);
                expr_counter += 1;
            }
        }
    }
}
