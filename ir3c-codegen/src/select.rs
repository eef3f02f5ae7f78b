//! Per-statement instruction selection (spec.md §4.8), ported from
//! `codegen.codegen_stmt` and its helpers, retargeted to consume the
//! register allocator's output instead of doing ad hoc register
//! assignment on the fly. Every condition that can only fail because of a
//! compiler bug upstream (a used variable with no location, an
//! unresolvable field) is reported through `Ir3cResult`, same as
//! `ir3c-regalloc`'s spill-retry failures, rather than panicking.

use crate::builtins;
use crate::call;
use crate::ctx::FuncEmitter;
use crate::instr::{self, Instr, Operand};
use ir3c_diagnostics::{Ir3cError, Ir3cResult};
use ir3c_ir::{BinOp, Cond, Expr, ExprKind, Stmt, StmtKind, Type, UnOp, Value, ValueKind};

fn bug(message: impl Into<String>) -> Ir3cError {
    Ir3cError::invariant(message)
}

fn operand(emitter: &FuncEmitter, value: &Value) -> Ir3cResult<Operand> {
    Ok(match &value.kind {
        ValueKind::ConstantInt(n) => Operand::Constant(*n),
        ValueKind::ConstantBool(b) => Operand::Constant(if *b { 1 } else { 0 }),
        ValueKind::ConstantNull => Operand::Constant(0),
        ValueKind::ConstantString(_) => {
            return Err(bug("string constant reached codegen unmaterialized"));
        }
        ValueKind::VarRef(name) => {
            let loc = emitter.frame.location(name);
            let reg = loc.reg.ok_or_else(|| bug(format!("`{name}` has no register at use site")))?;
            Operand::reg(reg)
        }
    })
}

fn dest_reg(emitter: &FuncEmitter, var: &str) -> Option<&'static str> {
    emitter.frame.location(var).reg
}

fn class_of<'a>(emitter: &'a FuncEmitter, var: &str) -> Ir3cResult<&'a str> {
    match emitter.func.var_type(var) {
        Some(Type::Class(name)) => Ok(name.as_str()),
        other => Err(bug(format!("`{var}` is not a class-typed variable (found {other:?})"))),
    }
}

/// Compute `expr` directly into `dest`. `Expr` is never itself spilled;
/// only the variable it's assigned to might be, and that's handled by the
/// `SpillVariable` pseudo-op the allocator already inserted after this
/// statement.
fn compute_expr(emitter: &mut FuncEmitter, expr: &Expr, dest: &'static str) -> Ir3cResult<()> {
    match &expr.kind {
        ExprKind::ValueExpr(v) => {
            let src = operand(emitter, v)?;
            emitter.emit(instr::mov(Operand::reg(dest), src));
        }
        ExprKind::BinaryOp { lhs, op, rhs } => compute_binop(emitter, lhs, *op, rhs, dest)?,
        ExprKind::UnaryOp { op, value } => {
            let v = operand(emitter, value)?;
            match op {
                UnOp::Neg => emitter.emit(instr::rsb(Operand::reg(dest), v, Operand::Constant(0))),
                UnOp::Not => emitter.emit(instr::rsb(Operand::reg(dest), v, Operand::Constant(1))),
            }
        }
        ExprKind::DotOp { var_name, field_name } => compute_dot_load(emitter, var_name, field_name, dest)?,
        ExprKind::FnCallExpr(call_expr) => call::emit_call(emitter, call_expr, Some(dest))?,
        ExprKind::NewOp(class_name) => {
            let size = emitter.layout.class(class_name).size();
            emitter.emit(instr::mov(Operand::reg("a1"), Operand::Constant(1)));
            emitter.emit(instr::mov(Operand::reg("a2"), Operand::Constant(size)));
            emitter.emit(instr::bl("calloc(PLT)"));
            if dest != "a1" {
                emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
            }
        }
    }
    Ok(())
}

fn compute_dot_load(emitter: &mut FuncEmitter, var_name: &str, field_name: &str, dest: &'static str) -> Ir3cResult<()> {
    let class_name = class_of(emitter, var_name)?.to_string();
    let layout = emitter.layout.class(&class_name);
    let offset = layout.field_offset(field_name);
    let is_bool = layout.field_size(field_name) == 1;
    let ptr_reg = emitter
        .frame
        .location(var_name)
        .reg
        .ok_or_else(|| bug(format!("`{var_name}` has no register")))?;
    let mem = Operand::mem(ptr_reg, offset);
    if is_bool {
        emitter.emit(instr::load_byte(Operand::reg(dest), mem));
    } else {
        emitter.emit(instr::load(Operand::reg(dest), mem));
    }
    Ok(())
}

fn compute_binop(emitter: &mut FuncEmitter, lhs: &Value, op: BinOp, rhs: &Value, dest: &'static str) -> Ir3cResult<()> {
    match op {
        BinOp::Add => {
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(arith_commutative("add", dest, a, b));
        }
        BinOp::Sub => {
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(arith_sub(dest, a, b));
        }
        BinOp::Mul => {
            let a = to_register(emitter, lhs)?;
            let b = to_register(emitter, rhs)?;
            emitter.emit(instr::mul(Operand::reg(dest), a, b));
        }
        BinOp::Div => {
            let builtin = emitter.require_builtin(builtins::DIVIDE_INT);
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(instr::mov(Operand::reg("a1"), a));
            emitter.emit(instr::mov(Operand::reg("a2"), b));
            emitter.emit(instr::bl(builtin));
            if dest != "a1" {
                emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
            }
        }
        BinOp::Concat => {
            let builtin = emitter.require_builtin(builtins::STRING_CONCAT);
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(instr::mov(Operand::reg("a1"), a));
            emitter.emit(instr::mov(Operand::reg("a2"), b));
            emitter.emit(instr::bl(builtin));
            if dest != "a1" {
                emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
            }
        }
        BinOp::Eq | BinOp::Ne if is_string_operand(emitter, lhs) || is_string_operand(emitter, rhs) => {
            let builtin = emitter.require_builtin(builtins::STRING_COMPARE);
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(instr::mov(Operand::reg("a1"), a));
            emitter.emit(instr::mov(Operand::reg("a2"), b));
            emitter.emit(instr::bl(builtin));
            if op == BinOp::Ne {
                emitter.emit(instr::rsb(Operand::reg("a1"), Operand::reg("a1"), Operand::Constant(1)));
            }
            if dest != "a1" {
                emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
            }
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            compute_relational(emitter, lhs, op, rhs, dest)?;
        }
        BinOp::And | BinOp::Or => {
            // Both operands are already canonicalized booleans (0/1); the
            // typechecker never emits a short-circuit `&&`/`||` as a flat
            // `BinaryOp` (spec.md §3.4's PhiNode scheduling anchors exist
            // precisely because short-circuiting needs branches instead).
            let mnemonic = if op == BinOp::And { "and" } else { "orr" };
            let (a, b) = (operand(emitter, lhs)?, operand(emitter, rhs)?);
            emitter.emit(Instr::new(mnemonic, vec![Operand::reg(dest), a, b]));
        }
    }
    Ok(())
}

fn is_string_operand(emitter: &FuncEmitter, value: &Value) -> bool {
    match &value.kind {
        ValueKind::VarRef(name) => emitter.func.var_type(name) == Some(&Type::String),
        _ => false,
    }
}

fn to_register(emitter: &mut FuncEmitter, value: &Value) -> Ir3cResult<Operand> {
    Ok(match operand(emitter, value)? {
        Operand::Register(r) => Operand::Register(r),
        constant => {
            // `mul` has no immediate-operand encoding; any constant must
            // be materialized into a register first. `ir3c-lower` already
            // hoists out-of-range constants into their own variable, so
            // this only ever moves a small immediate — cheap either way.
            let scratch = "ip";
            emitter.emit(instr::mov(Operand::reg(scratch), constant));
            Operand::reg(scratch)
        }
    })
}

fn arith_commutative(mnemonic: &str, dest: &'static str, a: Operand, b: Operand) -> Instr {
    if a.is_constant() && !b.is_constant() {
        Instr::new(mnemonic, vec![Operand::reg(dest), b, a])
    } else {
        Instr::new(mnemonic, vec![Operand::reg(dest), a, b])
    }
}

/// `a - b`: when `a` is the constant, ARM has no `sub`-with-left-immediate
/// form, so `rsb dest, b, a` computes `a - b` directly (spec.md §4.8).
fn arith_sub(dest: &'static str, a: Operand, b: Operand) -> Instr {
    if a.is_constant() {
        Instr::new("rsb", vec![Operand::reg(dest), b, a])
    } else {
        Instr::new("sub", vec![Operand::reg(dest), a, b])
    }
}

fn compute_relational(emitter: &mut FuncEmitter, lhs: &Value, op: BinOp, rhs: &Value, dest: &'static str) -> Ir3cResult<()> {
    let (a, b, cc) = relational_operands_and_cc(emitter, lhs, op, rhs)?;
    emitter.emit(instr::cmp(a, b));
    emitter.emit(instr::mov_cc(cc, Operand::reg(dest), Operand::Constant(1)));
    emitter.emit(instr::mov_cc(&inverse_cc(cc), Operand::reg(dest), Operand::Constant(0)));
    Ok(())
}

/// `cmp` requires its left operand to be a register; if the IR put the
/// constant on the left, swap operands and swap the comparison direction
/// to compensate (spec.md §4.8: "the `cc` is inverted when the constant
/// operand is on the left").
fn relational_operands_and_cc(emitter: &FuncEmitter, lhs: &Value, op: BinOp, rhs: &Value) -> Ir3cResult<(Operand, Operand, &'static str)> {
    let a = operand(emitter, lhs)?;
    let b = operand(emitter, rhs)?;
    Ok(if a.is_constant() && !b.is_constant() {
        (b, a, op.swapped().condition_code().ok_or_else(|| bug("non-relational op reached relational codegen"))?)
    } else {
        (a, b, op.condition_code().ok_or_else(|| bug("non-relational op reached relational codegen"))?)
    })
}

fn inverse_cc(cc: &str) -> String {
    match cc {
        "eq" => "ne".into(),
        "ne" => "eq".into(),
        "lt" => "ge".into(),
        "ge" => "lt".into(),
        "gt" => "le".into(),
        "le" => "gt".into(),
        other => unreachable!("`{other}` is not a condition code this codegen ever produces"),
    }
}

fn store_field(emitter: &mut FuncEmitter, ptr: &str, field: &str, rhs_var: &str, ty: &Type) -> Ir3cResult<()> {
    let class_name = class_of(emitter, ptr)?.to_string();
    let layout = emitter.layout.class(&class_name);
    let offset = layout.field_offset(field);
    let ptr_reg = emitter.frame.location(ptr).reg.ok_or_else(|| bug(format!("`{ptr}` has no register")))?;
    let rhs_reg = emitter.frame.location(rhs_var).reg.ok_or_else(|| bug(format!("`{rhs_var}` has no register")))?;
    let mem = Operand::mem(ptr_reg, offset);
    if *ty == Type::Bool {
        emitter.emit(instr::store_byte(Operand::reg(rhs_reg), mem));
    } else {
        emitter.emit(instr::store(Operand::reg(rhs_reg), mem));
    }
    Ok(())
}

fn println(emitter: &mut FuncEmitter, value: &Value) -> Ir3cResult<()> {
    let ty = match &value.kind {
        ValueKind::ConstantBool(_) => Type::Bool,
        ValueKind::ConstantNull => Type::NullObject,
        ValueKind::VarRef(name) => emitter.func.var_type(name).cloned().unwrap_or(Type::Int),
        ValueKind::ConstantInt(_) => Type::Int,
        ValueKind::ConstantString(_) => return Err(bug("string constant reached println unmaterialized")),
    };
    let v = operand(emitter, value)?;

    match ty {
        Type::Int => {
            emitter.emit(instr::mov(Operand::reg("a2"), v));
            emitter.emit(instr::load(Operand::reg("a1"), Operand::ConstantMemory(".println_int_fmt".into())));
            emitter.emit(instr::bl("printf(PLT)"));
        }
        Type::String => {
            let reg = match v {
                Operand::Register(r) => r,
                _ => return Err(bug("a string println operand must be a variable by codegen time")),
            };
            emitter.emit(instr::add(Operand::reg("a1"), Operand::Register(reg), Operand::Constant(4)));
            emitter.emit(instr::bl("puts(PLT)"));
        }
        Type::Bool => {
            let true_label = Operand::ConstantMemory(".println_true".into());
            let false_label = Operand::ConstantMemory(".println_false".into());
            emitter.emit(instr::cmp(v, Operand::Constant(0)));
            emitter.emit(instr::load(Operand::reg("a1"), true_label));
            emitter.emit(Instr::new("ldreq", vec![Operand::reg("a1"), false_label]));
            emitter.emit(instr::bl("puts(PLT)"));
        }
        Type::NullObject | Type::Void | Type::Class(_) => {
            emitter.emit(instr::load(Operand::reg("a1"), Operand::ConstantMemory(".println_null".into())));
            emitter.emit(instr::bl("puts(PLT)"));
        }
    }
    Ok(())
}

fn readln(emitter: &mut FuncEmitter, var: &str) -> Ir3cResult<()> {
    if !emitter.frame.is_var_used(var) {
        return Ok(());
    }
    let ty = emitter.func.var_type(var).cloned().unwrap_or(Type::Int);
    let builtin = match ty {
        Type::Int => emitter.require_builtin(builtins::READLN_INT),
        Type::Bool => emitter.require_builtin(builtins::READLN_BOOL),
        Type::String => emitter.require_builtin(builtins::READLN_STRING),
        other => return Err(bug(format!("cannot readln into type {other}"))),
    };
    emitter.emit(instr::bl(builtin));
    let dest = dest_reg(emitter, var).ok_or_else(|| bug(format!("`{var}` has no register after readln")))?;
    if dest != "a1" {
        emitter.emit(instr::mov(Operand::reg(dest), Operand::reg("a1")));
    }
    Ok(())
}

fn cond_branch(emitter: &mut FuncEmitter, cond: &Cond, label: &str) -> Ir3cResult<()> {
    let mangled = emitter.mangled_label(label);
    match cond {
        Cond::Value(v) if v.is_constant() => {
            if v.as_bool() == Some(true) {
                emitter.emit(instr::branch(mangled));
            }
            // constant-false: branch never taken, emit nothing.
        }
        Cond::Value(v) => {
            let op = operand(emitter, v)?;
            emitter.emit(instr::cmp(op, Operand::Constant(0)));
            emitter.emit(instr::branch_cond("ne", mangled));
        }
        Cond::RelOp { lhs, op, rhs } => {
            let (a, b, cc) = relational_operands_and_cc(emitter, lhs, *op, rhs)?;
            emitter.emit(instr::cmp(a, b));
            emitter.emit(instr::branch_cond(cc, mangled));
        }
    }
    Ok(())
}

pub fn select_stmt(emitter: &mut FuncEmitter, stmt: &Stmt) -> Ir3cResult<()> {
    match &stmt.kind {
        StmtKind::AssignOp { lhs, rhs } => {
            if let Some(dest) = dest_reg(emitter, lhs) {
                compute_expr(emitter, rhs, dest)?;
            }
        }
        StmtKind::AssignDotOp { .. } => {
            return Err(bug("AssignDotOp reached codegen — ir3c-lower should have split it into AssignOp + StoreField"));
        }
        StmtKind::StoreField { ptr, field, rhs_var, field_type } => store_field(emitter, ptr, field, rhs_var, field_type)?,
        StmtKind::FnCallStmt(call) => call::emit_call(emitter, call, None)?,
        StmtKind::ReturnStmt(value) => {
            if let Some(v) = value {
                let op = operand(emitter, v)?;
                emitter.emit(instr::mov(Operand::reg("a1"), op));
            }
            emitter.emit(instr::branch(emitter.frame.exit_label.clone()));
        }
        StmtKind::ReadLnCall(var) => readln(emitter, var)?,
        StmtKind::PrintLnCall(value) => println(emitter, value)?,
        StmtKind::Branch(label) => {
            let mangled = emitter.mangled_label(label);
            emitter.emit(instr::branch(mangled));
        }
        StmtKind::CondBranch(cond, label) => cond_branch(emitter, cond, label)?,
        StmtKind::Label(name) => {
            let mangled = emitter.mangled_label(name);
            emitter.emit(Instr::label(mangled));
        }
        StmtKind::AssignConstInt(name, n) => {
            if let Some(dest) = dest_reg(emitter, name) {
                if (-256..=256).contains(n) {
                    emitter.emit(instr::mov(Operand::reg(dest), Operand::Constant(*n)));
                } else {
                    // Out of `mov`'s 8-bit immediate range: `ldr Rd, =n` is
                    // the literal-pool pseudo-op, not an encoded immediate.
                    emitter.emit(instr::load(Operand::reg(dest), Operand::ConstantMemory(n.to_string())));
                }
            }
        }
        StmtKind::AssignConstString(name, bytes) => {
            if let Some(dest) = dest_reg(emitter, name) {
                let label = emitter.strings.intern(bytes);
                emitter.emit(instr::load(Operand::reg(dest), Operand::ConstantMemory(format!(".{label}"))));
            }
        }
        StmtKind::SpillVariable(var) => {
            let instr = emitter.frame.spill_variable(var);
            emitter.emit(instr);
        }
        StmtKind::RestoreVariable(var) => {
            let instr = emitter.frame.restore_variable(var);
            emitter.emit(instr);
        }
        StmtKind::DummyStmt => {}
        // Scheduling anchor only: every predecessor path already assigned
        // `lhs` directly (spec.md §3.4), so there is nothing left to emit.
        StmtKind::PhiNode { .. } => {}
    }
    Ok(())
}
