//! Entity references, in the style of `cranelift_entity`'s `ir::entities`.
//!
//! `BlockId` indexes the arena that actually owns data (`FuncDefn::blocks`,
//! a `PrimaryMap`) — predecessor sets and branch targets hold `BlockId`s,
//! never `&BasicBlock`s, per the "graph ownership" design note in spec.md
//! §9. `StmtId` and `ExprId` are *not* arena keys: statements live inside
//! each block's `Vec<Stmt>`, and their ids are dense integers reassigned by
//! the renumbering pass every optimizer iteration (spec.md §9 "statement
//! ids"). They still get the entity-reference treatment (a newtype around
//! `u32`, `Copy`, displayable) so they can't be confused with plain indices
//! or mixed up with each other.

use cranelift_entity::{entity_impl, EntityRef};
use std::fmt;

/// A reference to a basic block, owned by `FuncDefn::blocks`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "block");

/// A dense statement id, reassigned every time `renumber` runs (spec.md
/// §4.3's "statements and expressions are renumbered densely" preamble).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(u32);
entity_impl!(StmtId, "stmt");

impl StmtId {
    /// Placeholder used before the first renumbering pass runs.
    pub const UNASSIGNED: StmtId = StmtId(u32::MAX);
}

/// A dense expression id, used by CSE to identify syntactically identical
/// right-hand sides (spec.md §3.3, §4.3 pass 5).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);
entity_impl!(ExprId, "expr");

impl ExprId {
    pub const UNASSIGNED: ExprId = ExprId(u32::MAX);
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.index())
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.index())
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.index())
    }
}
