use std::fmt;

/// The six types of spec.md §3.1. `Class` carries the declared class name;
/// layout (field offsets, size) is computed later by `ir3c-codegen` from the
/// enclosing `Program`, not stored here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    String,
    Void,
    /// The type of the `null` literal before it is assigned to a concrete
    /// object type; assignable to any class type.
    NullObject,
    Class(String),
}

impl Type {
    /// Size in bytes when held in a register or a stack slot. Booleans are
    /// 4 bytes here (spec.md §4.6: "every boolean is 4 bytes on the
    /// stack"); only object *fields* shrink them to 1 byte (see
    /// `ir3c-codegen::layout`).
    pub fn register_size(&self) -> u32 {
        match self {
            Type::Void => 0,
            _ => 4,
        }
    }

    /// The mangling letter/name fragment used by §3.6's name mangling
    /// scheme: `v i b s` for the four named primitives, `<len>Name` for a
    /// class. `Void` never appears as a parameter type so it has no
    /// mangled form of its own share with `NullObject`.
    pub fn mangled(&self) -> String {
        match self {
            Type::Int => "i".to_string(),
            Type::Bool => "b".to_string(),
            Type::String => "s".to_string(),
            Type::Void => "v".to_string(),
            Type::NullObject => "v".to_string(),
            Type::Class(name) => format!("{}{}", name.len(), name),
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Type::Class(_) | Type::NullObject)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Void => write!(f, "Void"),
            Type::NullObject => write!(f, "$NullObject"),
            Type::Class(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    /// `s+`: string concatenation, tagged by the typechecker once both
    /// operands are known to be strings (spec.md §3.3).
    Concat,
}

impl BinOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// The condition code suffix used by the emitter's `cmp` + conditional
    /// `mov` sequence (spec.md §4.8).
    pub fn condition_code(self) -> Option<&'static str> {
        match self {
            BinOp::Eq => Some("eq"),
            BinOp::Ne => Some("ne"),
            BinOp::Lt => Some("lt"),
            BinOp::Gt => Some("gt"),
            BinOp::Le => Some("le"),
            BinOp::Ge => Some("ge"),
            _ => None,
        }
    }

    /// Swap the operands of a relational operator (used when the constant
    /// operand needs to move to the right-hand side before emitting `cmp`).
    pub fn swapped(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Gt => BinOp::Lt,
            BinOp::Le => BinOp::Ge,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Concat => "s+",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if *self == UnOp::Neg { "-" } else { "!" })
    }
}
