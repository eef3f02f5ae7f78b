//! The construction-time concerns of spec.md §4.1 not already handled while
//! assembling a `FuncDefn` (CFG linking lives in `ir3c_ir::rebuild_cfg`;
//! parsing lives in `ir3c-reader`): synthesizing a missing `return` for
//! `Void` functions, and warning about statements a human author left after
//! a block's terminator.

use ir3c_diagnostics::Diagnostic;
use ir3c_ir::{FuncDefn, Stmt, StmtKind, Type};

/// If `func` returns `Void` and its last emitted block doesn't already end
/// in a `ReturnStmt`, append `return;` there. Mirrors the reference
/// compiler's implicit-fallthrough-return behavior for void functions.
pub fn append_missing_return(func: &mut FuncDefn) {
    if func.ret_type != Type::Void {
        return;
    }
    let Some(&last) = func.order.last() else { return };
    let has_return = matches!(
        func.block(last).stmts.last().map(|s| &s.kind),
        Some(StmtKind::ReturnStmt(_))
    );
    if !has_return {
        let span = func.span.clone();
        func.block_mut(last).stmts.push(Stmt::new(StmtKind::ReturnStmt(None), span));
    }
}

/// Warn once per block about any statement following its terminator —
/// always dead, and always a sign of a malformed textual IR3 input rather
/// than anything the optimizer itself would produce (passes never leave a
/// statement after a terminator; pass 9 strips exactly this shape).
pub fn warn_unreachable_statements(func: &FuncDefn) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for (_, block) in func.blocks_in_order() {
        if let Some(term_idx) = block.stmts.iter().position(|s| s.is_terminator()) {
            if let Some(stray) = block.stmts.get(term_idx + 1) {
                out.push(Diagnostic::warning(
                    stray.span.clone(),
                    "unreachable statement after block terminator",
                ));
            }
        }
    }
    out
}
