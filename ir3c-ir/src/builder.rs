//! A small imperative builder for assembling `FuncDefn`s, in the spirit of
//! `cranelift_frontend::FunctionBuilder`: track a "current block" cursor and
//! append statements to it, switching blocks explicitly rather than making
//! callers index into the arena by hand. Used by `ir3c-reader` to turn a
//! parsed textual function into IR, and directly by this crate's tests.

use crate::function::FuncDefn;
use crate::ids::BlockId;
use crate::stmt::{Stmt, StmtKind};

pub struct FunctionBuilder<'f> {
    func: &'f mut FuncDefn,
    current: BlockId,
}

impl<'f> FunctionBuilder<'f> {
    /// Start building at `func`'s existing entry block.
    pub fn new(func: &'f mut FuncDefn) -> Self {
        let current = func.entry;
        Self { func, current }
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Allocate a new, empty block without switching to it.
    pub fn create_block(&mut self) -> BlockId {
        self.func.new_block()
    }

    /// Switch the cursor to `block`; subsequent `push` calls append there.
    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Append a statement to the current block.
    pub fn push(&mut self, stmt: Stmt) {
        self.func.block_mut(self.current).stmts.push(stmt);
    }

    /// Link `from -> to` in both directions' adjacency lists, without
    /// touching statements. Used after emitting a `Branch`/`CondBranch`
    /// whose target is already known.
    pub fn link(&mut self, from: BlockId, to: BlockId) {
        if !self.func.block(from).succs.contains(&to) {
            self.func.block_mut(from).succs.push(to);
        }
        if !self.func.block(to).preds.contains(&from) {
            self.func.block_mut(to).preds.push(from);
        }
    }

    /// Finish the current block with `stmt` (expected to be a terminator)
    /// and link it to `targets`.
    pub fn terminate(&mut self, stmt: Stmt, targets: &[BlockId]) {
        debug_assert!(stmt.is_terminator(), "terminate() requires a terminator stmt");
        let from = self.current;
        self.push(stmt);
        for &to in targets {
            self.link(from, to);
        }
    }

    pub fn func(&self) -> &FuncDefn {
        self.func
    }

    pub fn func_mut(&mut self) -> &mut FuncDefn {
        self.func
    }
}

/// Recompute every block's `preds`/`succs` from its terminator statement,
/// discarding whatever was there before. Used after a pass rewrites branch
/// targets in place rather than going through the builder (spec.md §4.1 —
/// "the CFG is a derived view, rebuilt rather than incrementally patched").
pub fn rebuild_cfg(func: &mut FuncDefn) {
    use std::collections::HashMap;

    let label_blocks: HashMap<String, BlockId> = func
        .order
        .iter()
        .filter_map(|&id| match func.block(id).stmts.first().map(|s| &s.kind) {
            Some(StmtKind::Label(name)) => Some((name.clone(), id)),
            _ => None,
        })
        .collect();

    for &id in &func.order {
        func.block_mut(id).preds.clear();
        func.block_mut(id).succs.clear();
    }

    let ids: Vec<BlockId> = func.order.clone();
    for id in ids {
        let targets: Vec<BlockId> = match func.block(id).terminator().map(|s| &s.kind) {
            Some(StmtKind::Branch(label)) => label_blocks.get(label).copied().into_iter().collect(),
            Some(StmtKind::CondBranch(_, label)) => {
                let mut t: Vec<BlockId> = label_blocks.get(label).copied().into_iter().collect();
                if let Some(&next) = next_block(&func.order, id).as_ref() {
                    t.push(next);
                }
                t
            }
            Some(StmtKind::ReturnStmt(_)) => vec![],
            _ => {
                // Falls through to the next block in emission order.
                next_block(&func.order, id).into_iter().collect()
            }
        };
        for target in targets {
            if !func.block(id).succs.contains(&target) {
                func.block_mut(id).succs.push(target);
            }
            if !func.block(target).preds.contains(&id) {
                func.block_mut(target).preds.push(id);
            }
        }
    }
}

fn next_block(order: &[BlockId], id: BlockId) -> Option<BlockId> {
    let pos = order.iter().position(|&b| b == id)?;
    order.get(pos + 1).copied()
}
