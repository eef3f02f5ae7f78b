use crate::function::VarDecl;
use ir3c_diagnostics::Span;

/// A class declaration: a flat field list (spec.md §3.1 — no inheritance).
/// Field *layout* (byte offsets, boolean packing) is computed by
/// `ir3c-codegen` from this declared order, not stored here.
#[derive(Clone, Debug)]
pub struct ClassDefn {
    pub name: String,
    pub fields: Vec<VarDecl>,
    pub span: Span,
}

impl ClassDefn {
    pub fn new(name: impl Into<String>, fields: Vec<VarDecl>, span: Span) -> Self {
        Self {
            name: name.into(),
            fields,
            span,
        }
    }

    pub fn field(&self, name: &str) -> Option<&VarDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}
