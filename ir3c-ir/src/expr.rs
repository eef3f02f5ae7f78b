use crate::ids::ExprId;
use crate::types::{BinOp, UnOp};
use crate::value::Value;
use ir3c_diagnostics::Span;

/// A function or method call. `callee` is already the mangled target symbol
/// (spec.md §3.6) — resolving overloads/virtual dispatch happened upstream,
/// so this is a flat name plus argument list by the time the core sees it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FnCall {
    pub callee: String,
    pub args: Vec<Value>,
}

impl FnCall {
    pub fn new(callee: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            callee: callee.into(),
            args,
        }
    }
}

/// The pure (save for `FnCallExpr`/`NewOp`) expression forms of spec.md §3.3.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExprKind {
    BinaryOp { lhs: Value, op: BinOp, rhs: Value },
    UnaryOp { op: UnOp, value: Value },
    /// Load a field of an object through a variable: `var_name.field_name`.
    DotOp { var_name: String, field_name: String },
    ValueExpr(Value),
    FnCallExpr(FnCall),
    /// `new ClsName`: heap-allocate a zeroed object of the named class.
    NewOp(String),
}

/// An expression, tagged with the [`ExprId`] that CSE uses to recognize two
/// textually distinct but structurally identical right-hand sides. The id is
/// reassigned by renumbering every optimizer iteration (spec.md §4.3
/// preamble) and is meaningless before the first renumbering pass runs.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub id: ExprId,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            id: ExprId::UNASSIGNED,
        }
    }

    pub fn binary(lhs: Value, op: BinOp, rhs: Value, span: Span) -> Self {
        Self::new(ExprKind::BinaryOp { lhs, op, rhs }, span)
    }

    pub fn unary(op: UnOp, value: Value, span: Span) -> Self {
        Self::new(ExprKind::UnaryOp { op, value }, span)
    }

    pub fn dot(var_name: impl Into<String>, field_name: impl Into<String>, span: Span) -> Self {
        Self::new(
            ExprKind::DotOp {
                var_name: var_name.into(),
                field_name: field_name.into(),
            },
            span,
        )
    }

    pub fn value(v: Value, span: Span) -> Self {
        let span = span;
        Self::new(ExprKind::ValueExpr(v), span)
    }

    pub fn call(call: FnCall, span: Span) -> Self {
        Self::new(ExprKind::FnCallExpr(call), span)
    }

    pub fn new_object(class: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::NewOp(class.into()), span)
    }

    /// Whether this expression may have a side effect beyond producing a
    /// value — calls and allocation. CSE and copy propagation must never
    /// substitute these away (spec.md §4.3 pass 5).
    pub fn has_side_effect(&self) -> bool {
        matches!(self.kind, ExprKind::FnCallExpr(_) | ExprKind::NewOp(_))
    }

    /// The set of variables directly read by this expression (not counting
    /// the variable a `DotOp` loads *through*, which is also a use).
    pub fn operand_vars(&self) -> Vec<&str> {
        match &self.kind {
            ExprKind::BinaryOp { lhs, rhs, .. } => {
                [lhs.as_var(), rhs.as_var()].into_iter().flatten().collect()
            }
            ExprKind::UnaryOp { value, .. } => value.as_var().into_iter().collect(),
            ExprKind::DotOp { var_name, .. } => vec![var_name.as_str()],
            ExprKind::ValueExpr(v) => v.as_var().into_iter().collect(),
            ExprKind::FnCallExpr(call) => call.args.iter().filter_map(|a| a.as_var()).collect(),
            ExprKind::NewOp(_) => vec![],
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}
impl Eq for Expr {}
