//! Per-function variable locations, frame size, and prologue/epilogue
//! (spec.md §4.6, §4.10), ported from `cgstate.FuncState`.

use crate::instr::{self, Instr, Operand};
use crate::layout::POINTER_SIZE;
use ir3c_ir::FuncDefn;
use ir3c_regalloc::AllocationResult;
use std::collections::{HashMap, HashSet};

const STACK_ALIGNMENT: i32 = 8;
const CALLEE_SAVED: [&str; 8] = ["v1", "v2", "v3", "v4", "v5", "v6", "v7", "fp"];

#[derive(Clone, Copy, Default)]
pub struct VarLoc {
    pub reg: Option<&'static str>,
    /// Offset relative to the notional frame base (spec.md §4.6):
    /// negative for spill slots, positive for stack arguments 5+.
    pub ofs: Option<i32>,
}

impl VarLoc {
    pub fn valid(&self) -> bool {
        self.reg.is_some() || self.ofs.is_some()
    }
}

/// Interns the small, fixed set of register names the allocator can
/// produce so `VarLoc` can hold a `&'static str` instead of a `String`.
fn intern_reg(name: &str) -> &'static str {
    const ALL: [&str; 16] = [
        "a1", "a2", "a3", "a4", "v1", "v2", "v3", "v4", "v5", "v6", "v7", "fp", "ip", "sp", "lr", "pc",
    ];
    ALL.iter().find(|r| **r == name).copied().unwrap_or_else(|| panic!("unknown register `{name}`"))
}

pub struct FrameState {
    pub locations: HashMap<String, VarLoc>,
    pub frame_size: i32,
    pub used_regs: HashSet<&'static str>,
    pub exit_label: String,
    pub stack_extra_offset: i32,
    pub reg_live_ranges: HashMap<String, HashSet<usize>>,
}

impl FrameState {
    pub fn build(func: &FuncDefn, alloc: &AllocationResult) -> Self {
        let mut locations = HashMap::new();
        let mut frame_size = 0;

        // locals shadow parameters in scope, so skip a param whose name is
        // redeclared as a local; it never gets a parameter-side location.
        let shadowed: HashSet<&str> = func.locals.iter().map(|v| v.name.as_str()).collect();

        for (i, param) in func.params.iter().enumerate() {
            if shadowed.contains(param.name.as_str()) {
                continue;
            }
            let mut loc = VarLoc::default();
            if i < 4 {
                if alloc.spills.contains(&param.name) {
                    loc.ofs = Some(-(frame_size + POINTER_SIZE));
                    frame_size += POINTER_SIZE;
                }
                if let Some(reg) = alloc.assignments.get(&param.name) {
                    loc.reg = Some(intern_reg(reg));
                }
            } else {
                loc.ofs = Some(8 + (i as i32 - 4) * 4);
                if let Some(reg) = alloc.assignments.get(&param.name) {
                    loc.reg = Some(intern_reg(reg));
                }
            }
            locations.insert(param.name.clone(), loc);
        }

        for local in &func.locals {
            let mut loc = VarLoc::default();
            if alloc.spills.contains(&local.name) {
                loc.ofs = Some(-(frame_size + POINTER_SIZE));
                frame_size += POINTER_SIZE;
            }
            if let Some(reg) = alloc.assignments.get(&local.name) {
                loc.reg = Some(intern_reg(reg));
            }
            locations.insert(local.name.clone(), loc);
        }

        let frame_size = STACK_ALIGNMENT * ((frame_size + STACK_ALIGNMENT - 1) / STACK_ALIGNMENT);

        let used_regs: HashSet<&'static str> = alloc.assignments.values().map(|r| intern_reg(r)).collect();

        Self {
            locations,
            frame_size,
            used_regs,
            exit_label: format!(".{}_exit", func.mangled_name),
            stack_extra_offset: 0,
            reg_live_ranges: alloc.reg_live_ranges.clone(),
        }
    }

    pub fn is_var_used(&self, var: &str) -> bool {
        self.locations.get(var).is_some_and(VarLoc::valid)
    }

    pub fn location(&self, var: &str) -> VarLoc {
        self.locations.get(var).copied().unwrap_or_default()
    }

    pub fn is_register_live(&self, reg: &str, stmt: usize) -> bool {
        self.reg_live_ranges.get(reg).is_some_and(|set| set.contains(&stmt))
    }

    /// `[sp, #ofs]` computed from the current `sp`, which differs from the
    /// notional frame base by the tracked extra offset of dynamic pushes
    /// (spec.md §4.6 — the allocator never uses `fp` for frame addressing).
    pub fn stack_offset(&self, ofs: i32) -> i32 {
        ofs + self.frame_size + self.stack_extra_offset
    }

    pub fn spill_variable(&self, var: &str) -> Instr {
        let loc = self.location(var);
        let reg = loc.reg.unwrap_or_else(|| panic!("no register to spill `{var}`"));
        let ofs = self.stack_offset(loc.ofs.unwrap_or_else(|| panic!("no spill slot for `{var}`")));
        instr::store(Operand::reg(reg), Operand::mem("sp", ofs))
    }

    pub fn restore_variable(&self, var: &str) -> Instr {
        let loc = self.location(var);
        let reg = loc.reg.unwrap_or_else(|| panic!("could not restore `{var}`"));
        let ofs = self.stack_offset(loc.ofs.unwrap_or_else(|| panic!("no spill slot for `{var}`")));
        instr::load(Operand::reg(reg), Operand::mem("sp", ofs))
    }

    pub fn mangle_label(&self, func_name: &str, label: &str) -> String {
        let label = label.strip_prefix('.').unwrap_or(label);
        format!(".{func_name}_{label}")
    }

    /// Prologue (spec.md §4.10): push `lr`, reserve the frame, push
    /// touched callee-saved registers — combined into one `stmfd` when
    /// the frame is empty.
    pub fn prologue(&self) -> Vec<Instr> {
        let mut restore: Vec<String> = CALLEE_SAVED.iter().filter(|r| self.used_regs.contains(*r)).map(|s| s.to_string()).collect();
        restore.sort();

        if self.frame_size > 0 {
            let mut instrs = vec![instr::store_multiple("sp", true, vec!["lr".to_string()]), instr::sub(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(self.frame_size))];
            if !restore.is_empty() {
                instrs.push(instr::store_multiple("sp", true, restore));
            }
            instrs
        } else {
            let mut regs = vec!["lr".to_string()];
            regs.extend(restore);
            vec![instr::store_multiple("sp", true, regs)]
        }
    }

    pub fn epilogue(&self) -> Vec<Instr> {
        let mut restore: Vec<String> = CALLEE_SAVED.iter().filter(|r| self.used_regs.contains(*r)).map(|s| s.to_string()).collect();
        restore.sort();

        let mut instrs = vec![Instr::label(&self.exit_label)];
        if self.frame_size > 0 {
            if !restore.is_empty() {
                instrs.push(instr::load_multiple("sp", true, restore));
            }
            instrs.push(instr::add(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(self.frame_size)));
            instrs.push(instr::load_multiple("sp", true, vec!["pc".to_string()]));
        } else {
            let mut regs = vec!["pc".to_string()];
            regs.extend(restore);
            instrs.push(instr::load_multiple("sp", true, regs));
        }
        instrs
    }
}
