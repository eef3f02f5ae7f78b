use ir3c_diagnostics::Span;
use std::hash::{Hash, Hasher};

/// An immediate operand (spec.md §3.2). `Value`s compare and hash by
/// structure only — the carried `Span` is for diagnostics and is excluded
/// from `PartialEq`/`Hash`, matching the reference compiler's
/// `ConstantInt.__eq__`/`__hash__` (which likewise ignore `loc`). CSE and
/// constant propagation both key off this structural identity.
#[derive(Clone, Debug)]
pub struct Value {
    pub kind: ValueKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    ConstantInt(i32),
    ConstantBool(bool),
    ConstantString(Vec<u8>),
    ConstantNull,
    VarRef(String),
}

impl Value {
    pub fn new(kind: ValueKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn int(v: i32, span: Span) -> Self {
        Self::new(ValueKind::ConstantInt(v), span)
    }

    pub fn boolean(v: bool, span: Span) -> Self {
        Self::new(ValueKind::ConstantBool(v), span)
    }

    pub fn string(bytes: impl Into<Vec<u8>>, span: Span) -> Self {
        Self::new(ValueKind::ConstantString(bytes.into()), span)
    }

    pub fn null(span: Span) -> Self {
        Self::new(ValueKind::ConstantNull, span)
    }

    pub fn var(name: impl Into<String>, span: Span) -> Self {
        Self::new(ValueKind::VarRef(name.into()), span)
    }

    pub fn is_constant(&self) -> bool {
        !matches!(self.kind, ValueKind::VarRef(_))
    }

    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::VarRef(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match &self.kind {
            ValueKind::ConstantInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.kind {
            ValueKind::ConstantBool(v) => Some(*v),
            _ => None,
        }
    }

    /// Every integer constant encodable as a 9-bit signed ARM immediate
    /// without materialization (spec.md §4.4): `[-256, 256]`.
    pub fn is_small_int(&self) -> bool {
        matches!(self.as_int(), Some(v) if (-256..=256).contains(&v))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}
