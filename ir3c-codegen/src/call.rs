//! Call-site instruction sequencing (spec.md §4.9). No Python original
//! survives this integrated with the register allocator — `codegen.py`'s
//! call handling predates allocator integration entirely — so this is
//! synthesized directly from the spec's eight numbered steps, in the style
//! of the surrounding `select.rs`/`cgstate.py`-derived code.

use crate::ctx::FuncEmitter;
use crate::instr::{self, Operand};
use ir3c_diagnostics::{Ir3cError, Ir3cResult};
use ir3c_ir::{FnCall, Value};

const ARG_REGS: [&str; 4] = ["a1", "a2", "a3", "a4"];

/// The one word every prologue unconditionally pushes for `lr` (spec.md
/// §4.10), folded into the call-site alignment check alongside the
/// frame's spill area and whatever this function has already pushed
/// dynamically.
const SAVED_LR: i32 = 4;

fn bug(message: impl Into<String>) -> Ir3cError {
    Ir3cError::invariant(message)
}

/// Libc/runtime routines reached through the PLT rather than a mangled IR
/// symbol. Everything else is a direct `bl` to a local label.
fn is_plt_routine(name: &str) -> bool {
    matches!(
        name,
        "printf" | "puts" | "scanf" | "calloc" | "memcpy" | "strcmp" | "strlen" | "fgets"
    ) || name.starts_with("__")
}

pub fn emit_call(emitter: &mut FuncEmitter, call: &FnCall, dest: Option<&'static str>) -> Ir3cResult<()> {
    let stmt = emitter.current_stmt;

    // Step 1: which of a1..a4 hold values still needed after the call,
    // excluding the call's own destination (clobbered by the return value
    // anyway).
    let live_before: Vec<&'static str> = ARG_REGS
        .iter()
        .copied()
        .filter(|r| emitter.frame.is_register_live(r, stmt) && Some(*r) != dest)
        .collect();

    // Step 2: stack alignment. `sp` must be 8-aligned at the `bl`; account
    // for everything about to go on the stack (the save-set and the
    // stack-passed arguments) plus what's already there.
    let stack_args = call.args.len().saturating_sub(4);
    let pushed_bytes = live_before.len() as i32 * 4 + stack_args as i32 * 4;
    let misaligned = (SAVED_LR + emitter.frame.stack_offset(0) + pushed_bytes) % 8 != 0;
    if misaligned {
        emitter.emit(instr::sub(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(4)));
        emitter.frame.stack_extra_offset += 4;
    }

    // Step 3: save the live caller-save registers.
    if !live_before.is_empty() {
        let mut regs: Vec<String> = live_before.iter().map(|r| r.to_string()).collect();
        regs.sort();
        emitter.emit(instr::store_multiple("sp", true, regs).annotate("caller-save"));
        emitter.frame.stack_extra_offset += live_before.len() as i32 * 4;
    }

    // Step 4: reserve stack space for arguments 5+ and store them, in
    // their natural (left-to-right) order.
    if stack_args > 0 {
        emitter.emit(instr::sub(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(stack_args as i32 * 4)));
        emitter.frame.stack_extra_offset += stack_args as i32 * 4;
        for (i, arg) in call.args.iter().enumerate().skip(4) {
            let op = argument_operand(emitter, arg)?;
            let reg = materialize(emitter, op, "ip");
            let ofs = (i as i32 - 4) * 4;
            emitter.emit(instr::store(Operand::reg(reg.clone()), Operand::mem("sp", ofs)));
        }
    }

    // Step 5: set up a1..a4 in an order safe against overwriting a
    // not-yet-consumed source register.
    setup_arg_registers(emitter, call)?;

    // Step 6: the call itself.
    let target = if is_plt_routine(&call.callee) {
        format!("{}(PLT)", call.callee)
    } else {
        call.callee.clone()
    };
    emitter.emit(instr::bl(target));

    // Step 7: tear down the stack-argument area, then restore the save-set.
    if stack_args > 0 {
        emitter.emit(instr::add(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(stack_args as i32 * 4)));
        emitter.frame.stack_extra_offset -= stack_args as i32 * 4;
    }
    if !live_before.is_empty() {
        let mut regs: Vec<String> = live_before.iter().map(|r| r.to_string()).collect();
        regs.sort();
        emitter.emit(instr::load_multiple("sp", true, regs).annotate("caller-restore"));
        emitter.frame.stack_extra_offset -= live_before.len() as i32 * 4;
    }
    if misaligned {
        emitter.emit(instr::add(Operand::reg("sp"), Operand::reg("sp"), Operand::Constant(4)));
        emitter.frame.stack_extra_offset -= 4;
    }

    // Step 8: move the return value into the destination, unless it's
    // already sitting in `a1`.
    if let Some(dest) = dest {
        if dest != "a1" {
            emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
        }
    }
    Ok(())
}

fn argument_operand(emitter: &FuncEmitter, value: &Value) -> Ir3cResult<Operand> {
    Ok(match &value.kind {
        ir3c_ir::ValueKind::ConstantInt(n) => Operand::Constant(*n),
        ir3c_ir::ValueKind::ConstantBool(b) => Operand::Constant(if *b { 1 } else { 0 }),
        ir3c_ir::ValueKind::ConstantNull => Operand::Constant(0),
        ir3c_ir::ValueKind::ConstantString(_) => {
            return Err(bug("string constant reached a call site unmaterialized"));
        }
        ir3c_ir::ValueKind::VarRef(name) => {
            let loc = emitter.frame.location(name);
            let reg = loc.reg.ok_or_else(|| bug(format!("`{name}` has no register at call site")))?;
            Operand::reg(reg)
        }
    })
}

fn materialize(emitter: &mut FuncEmitter, op: Operand, scratch: &'static str) -> String {
    match op {
        Operand::Register(r) => r,
        constant => {
            emitter.emit(instr::mov(Operand::reg(scratch), constant));
            scratch.to_string()
        }
    }
}

/// Assign each argument to its target register `a1..a4`, picking at every
/// step an argument whose destination isn't the source of another
/// not-yet-assigned argument, so no value is clobbered before it's read
/// (spec.md §4.9 step 5). Fails loudly if no such argument exists, which
/// would mean a cyclic register dependency the front end should never
/// produce (e.g. swapping `a1`/`a2` requires a scratch register, which
/// this language's call convention never forces since arguments are always
/// fresh values or plain variable reads).
fn setup_arg_registers(emitter: &mut FuncEmitter, call: &FnCall) -> Ir3cResult<()> {
    let n = call.args.len().min(4);
    let mut pending: Vec<usize> = (0..n).collect();
    let mut sources: Vec<Operand> = Vec::with_capacity(n);
    for arg in call.args.iter().take(n) {
        sources.push(argument_operand(emitter, arg)?);
    }

    while !pending.is_empty() {
        let safe_idx = pending.iter().position(|&i| {
            let dest = ARG_REGS[i];
            !pending.iter().any(|&j| {
                j != i
                    && matches!(&sources[j], Operand::Register(r) if r == dest)
            })
        });
        let i = safe_idx.ok_or_else(|| bug(format!("no safe argument-register assignment order for call to `{}`", call.callee)))?;
        let dest = ARG_REGS[i];
        emitter.emit(instr::mov(Operand::reg(dest), sources[i].clone()));
        pending.retain(|&p| p != i);
    }
    Ok(())
}
