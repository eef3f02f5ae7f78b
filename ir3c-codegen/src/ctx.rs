//! Shared per-function emission state threaded through instruction
//! selection and call sequencing.

use crate::frame::FrameState;
use crate::layout::ProgramLayout;
use crate::strings::StringPool;
use ir3c_ir::FuncDefn;
use std::collections::HashSet;

pub struct FuncEmitter<'p> {
    pub func: &'p FuncDefn,
    pub frame: FrameState,
    pub layout: &'p ProgramLayout,
    pub strings: &'p mut StringPool,
    pub builtins: &'p mut HashSet<&'static str>,
    pub instrs: Vec<crate::instr::Instr>,
    /// The renumbered id of the statement currently being selected, used to
    /// look up `FrameState::is_register_live` for call-site caller-save
    /// decisions (spec.md §4.9 step 1).
    pub current_stmt: usize,
}

impl<'p> FuncEmitter<'p> {
    pub fn emit(&mut self, instr: crate::instr::Instr) {
        self.instrs.push(instr);
    }

    pub fn require_builtin(&mut self, name: &'static str) -> &'static str {
        self.builtins.insert(name);
        name
    }

    pub fn mangled_label(&self, label: &str) -> String {
        self.frame.mangle_label(&self.func.mangled_name, label)
    }
}
