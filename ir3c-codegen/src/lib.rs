//! ARM32 instruction selection, frame/class layout, and assembly
//! serialization (spec.md §4.6-§4.12, §6). Consumes an already-lowered,
//! already-allocated [`Program`] from `ir3c-lower`/`ir3c-regalloc` and
//! produces the final assembly text.

pub mod builtins;
mod call;
pub mod ctx;
pub mod frame;
pub mod instr;
pub mod layout;
mod peephole;
mod select;
mod serialize;
pub mod strings;

use cranelift_entity::EntityRef;
use ctx::FuncEmitter;
use frame::FrameState;
use instr::Instr;
use ir3c_diagnostics::{Ir3cError, Ir3cResult};
use ir3c_ir::{FuncDefn, Program};
use ir3c_regalloc::AllocationResult;
use layout::ProgramLayout;
use std::collections::{HashMap, HashSet};
use strings::StringPool;

/// Select, sequence, and peephole-optimize one function's body, wrapped in
/// its prologue/epilogue (spec.md §4.10).
pub fn emit_function(
    func: &FuncDefn,
    alloc: &AllocationResult,
    layout: &ProgramLayout,
    strings: &mut StringPool,
    builtins_used: &mut HashSet<&'static str>,
) -> Ir3cResult<Vec<Instr>> {
    let frame = FrameState::build(func, alloc);
    let mut emitter = FuncEmitter {
        func,
        frame,
        layout,
        strings,
        builtins: builtins_used,
        instrs: Vec::new(),
        current_stmt: 0,
    };

    for (_, block) in func.blocks_in_order() {
        for stmt in &block.stmts {
            emitter.current_stmt = stmt.id.index();
            select::select_stmt(&mut emitter, stmt)?;
        }
    }

    let mut body = emitter.frame.prologue();
    body.append(&mut emitter.instrs);
    body.append(&mut emitter.frame.epilogue());
    Ok(peephole::optimise(body))
}

/// Lower every function in `program` to assembly text. `allocations` must
/// hold one [`AllocationResult`] per function, keyed by mangled name — the
/// umbrella `ir3c` crate builds this via `ir3c_regalloc::allocate_program`.
pub fn emit_program(program: &Program, allocations: &HashMap<String, AllocationResult>) -> Ir3cResult<String> {
    let layout = ProgramLayout::build(&program.classes);
    let mut strings = StringPool::new();
    let mut builtins_used: HashSet<&'static str> = HashSet::new();
    let mut functions = Vec::with_capacity(program.functions.len());

    for func in &program.functions {
        let alloc = allocations
            .get(&func.mangled_name)
            .ok_or_else(|| Ir3cError::invariant(format!("no register allocation recorded for `{}`", func.mangled_name)))?;
        let instrs = emit_function(func, alloc, &layout, &mut strings, &mut builtins_used)?;
        functions.push((func.mangled_name.clone(), instrs));
    }

    Ok(serialize::serialize(&functions, &builtins_used, &strings))
}

/// Strip the `@ ...` caller-save/restore annotations `ir3c-cli`'s
/// `-na/--no-annotate` asks for, leaving the instruction text and its
/// column alignment untouched. Only instructions built through
/// [`instr::Instr::annotate`] ever contain a literal `@`, so a per-line
/// split is unambiguous.
pub fn strip_annotations(asm: &str) -> String {
    asm.lines()
        .map(|line| match line.find('@') {
            Some(idx) => line[..idx].trim_end(),
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_diagnostics::Span;
    use ir3c_ir::{Expr, FunctionBuilder, Stmt, StmtKind, Type, Value, VarDecl};

    fn synth() -> Span {
        Span::synthetic()
    }

    fn trivial_program() -> Program {
        let mut func = FuncDefn::new("main", "main_dummy", Type::Int, vec![], synth());
        func.locals.push(VarDecl::new("t0", Type::Int));
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "t0".to_string(),
                rhs: Expr::value(Value::int(42, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(Some(Value::var("t0", synth()))), synth()), &[]);

        let mut program = Program::new();
        program.functions.push(func);
        program
    }

    #[test]
    fn emits_the_synthetic_main_wrapper_and_one_function_body() {
        let mut program = trivial_program();
        let allocations = ir3c_regalloc::allocate_program(&mut program).unwrap();
        let text = emit_program(&program, &allocations).unwrap();

        assert!(text.contains(".global main\n"));
        assert!(text.contains("bl main_dummy"));
        assert!(text.contains(".global main_dummy\n"));
        assert!(text.contains(".data"));
    }

    #[test]
    fn missing_allocation_for_a_function_is_reported_as_an_invariant_error() {
        let program = trivial_program();
        let allocations = HashMap::new();
        assert!(emit_program(&program, &allocations).is_err());
    }
}
