//! Entry-block instrumentation (spec.md §4.4): a single synthetic
//! `DummyStmt` at the head of the entry block gives "statement 0" a
//! concrete, unique identity once statements are renumbered, so the
//! register allocator can treat it as the definition site of every local
//! and parameter (spec.md §4.5.1) without special-casing "before the first
//! real statement".

use ir3c_ir::{FuncDefn, Stmt, StmtKind};

pub fn insert_entry_dummy(func: &mut FuncDefn) {
    let span = func.span.clone();
    func.block_mut(func.entry).stmts.insert(0, Stmt::new(StmtKind::DummyStmt, span));
}
