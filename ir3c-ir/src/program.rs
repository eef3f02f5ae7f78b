use crate::class::ClassDefn;
use crate::function::FuncDefn;

/// The whole compilation unit (spec.md §3.1): every class and every
/// function, flattened past any source-level nesting. `main_fn` is reserved
/// for a future front end that needs to single out a source-level entry
/// point; `ir3c-codegen` emits the process `main` symbol as fixed assembly
/// text (see DESIGN.md), never as a `FuncDefn`, so this is always `None` in
/// the present crate family.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub classes: Vec<ClassDefn>,
    pub functions: Vec<FuncDefn>,
    pub main_fn: Option<usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(&self, name: &str) -> Option<&ClassDefn> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn function(&self, mangled_name: &str) -> Option<&FuncDefn> {
        self.functions.iter().find(|f| f.mangled_name == mangled_name)
    }

    pub fn function_mut(&mut self, mangled_name: &str) -> Option<&mut FuncDefn> {
        self.functions
            .iter_mut()
            .find(|f| f.mangled_name == mangled_name)
    }
}
