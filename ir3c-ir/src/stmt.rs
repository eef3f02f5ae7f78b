use crate::expr::{Expr, FnCall};
use crate::ids::{BlockId, StmtId};
use crate::types::{BinOp, Type};
use crate::value::Value;
use ir3c_diagnostics::Span;

/// The condition tested by a `CondBranch`: either a plain boolean value, or
/// a relational comparison kept intact so the emitter can lower it straight
/// to a single `cmp` (spec.md §3.4, §4.8).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Value(Value),
    RelOp { lhs: Value, op: BinOp, rhs: Value },
}

impl Cond {
    pub fn operand_vars(&self) -> Vec<&str> {
        match self {
            Cond::Value(v) => v.as_var().into_iter().collect(),
            Cond::RelOp { lhs, rhs, .. } => {
                [lhs.as_var(), rhs.as_var()].into_iter().flatten().collect()
            }
        }
    }

    /// Fold a condition built only from constants, per spec.md §4.3 pass 8.
    pub fn const_eval(&self) -> Option<bool> {
        match self {
            Cond::Value(v) => v.as_bool(),
            Cond::RelOp { lhs, op, rhs } => {
                let (a, b) = (lhs.as_int()?, rhs.as_int()?);
                Some(match op {
                    BinOp::Eq => a == b,
                    BinOp::Ne => a != b,
                    BinOp::Lt => a < b,
                    BinOp::Gt => a > b,
                    BinOp::Le => a <= b,
                    BinOp::Ge => a >= b,
                    _ => return None,
                })
            }
        }
    }
}

/// Every statement and pseudo-statement kind from spec.md §3.4. Pseudo-ops
/// introduced by lowering (`AssignConstInt`, `AssignConstString`,
/// `StoreField`, `DummyStmt`) and by the allocator (`SpillVariable`,
/// `RestoreVariable`) are additional variants of this one enum rather than a
/// parallel hierarchy, per spec.md §9's re-architecture note.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    AssignOp {
        lhs: String,
        rhs: Expr,
    },
    AssignDotOp {
        obj_name: String,
        field_name: String,
        rhs: Expr,
        field_type: Type,
    },
    FnCallStmt(FnCall),
    ReturnStmt(Option<Value>),
    ReadLnCall(String),
    PrintLnCall(Value),
    Branch(String),
    CondBranch(Cond, String),
    Label(String),

    /// Pseudo: materializes an out-of-range integer constant into a fresh
    /// temporary (spec.md §4.4).
    AssignConstInt(String, i32),
    /// Pseudo: materializes a string literal into a fresh temporary
    /// (spec.md §4.4 — every `ConstantString` is always materialized).
    AssignConstString(String, Vec<u8>),
    /// Pseudo: spill `var` to its stack slot after this program point
    /// (spec.md §4.5.4).
    SpillVariable(String),
    /// Pseudo: reload `var` from its stack slot before this program point.
    RestoreVariable(String),
    /// Pseudo: the split-off memory write half of a lowered `AssignDotOp`
    /// (spec.md §4.4).
    StoreField {
        ptr: String,
        field: String,
        rhs_var: String,
        field_type: Type,
    },
    /// Pseudo: replaces an eliminated statement; stripped by the
    /// unreachable-statement cleanup pass (spec.md §4.3 pass 9).
    DummyStmt,
    /// Pseudo: a scheduling anchor left behind by the (absent) typechecker's
    /// short-circuit translation. Not a true dominance-frontier phi — see
    /// spec.md §3.4. `incoming` pairs each predecessor block with the
    /// variable holding the value coming from that edge.
    PhiNode {
        lhs: String,
        incoming: Vec<(BlockId, String)>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub id: StmtId,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span,
            id: StmtId::UNASSIGNED,
        }
    }

    /// Whether this statement unconditionally ends its basic block (spec.md
    /// §3.6 invariant: "every basic block ends with either `Branch`,
    /// `CondBranch`, or `ReturnStmt`").
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Branch(_) | StmtKind::CondBranch(_, _) | StmtKind::ReturnStmt(_)
        )
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, StmtKind::Label(_))
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, StmtKind::DummyStmt)
    }
}
