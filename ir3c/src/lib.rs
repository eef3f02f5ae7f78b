//! The whole-program pipeline (spec.md §2, §5): parse IR3 text, run the
//! optimizer to a fixed point, lower to machine-friendly form, allocate
//! registers, and emit ARM32 assembly. `ir3c-cli` is the only caller;
//! this crate owns no process state of its own (stdout, exit codes, file
//! I/O) so it can be driven by tests without touching a filesystem.

use ir3c_diagnostics::{Diagnostic, Ir3cResult};
use std::collections::HashMap;

/// Process-wide, read-mostly compiler options (spec.md §5), built once by
/// `ir3c-cli` from its `clap::Parser` derive and passed by reference
/// through the pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// `-O/--opt`: run the fixed-point optimizer (§4.3) before lowering.
    pub optimize: bool,
    /// `-a/--annotate` (default) vs `-na/--no-annotate`: keep or strip the
    /// `@ caller-save`/`@ caller-restore` comments the call-site emitter
    /// attaches.
    pub annotate: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optimize: false,
            annotate: true,
        }
    }
}

/// Which intermediate IR3 textual dumps to render, per `--dump-ir3*`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DumpRequests {
    pub ir3: bool,
    pub ir3_lowered: bool,
    pub ir3_opt: bool,
}

/// Everything a successful compile produces: the final assembly, any
/// non-fatal warnings (unreachable statements, spec.md §4.1), and the
/// textual IR3 dumps that were asked for.
#[derive(Debug, Default)]
pub struct CompileOutcome {
    pub asm: String,
    pub warnings: Vec<Diagnostic>,
    pub dump_ir3: Option<String>,
    pub dump_ir3_lowered: Option<String>,
    pub dump_ir3_opt: Option<String>,
}

/// Run the full pipeline over one IR3 source file's text.
///
/// The stage order is fixed regardless of `options.optimize`: basic-block
/// cleanup (missing-return synthesis, unreachable-statement warnings) always
/// runs; the fixed-point optimizer is optional; lowering and register
/// allocation are not, since the emitter's contract (spec.md §4.8) assumes
/// its input is already in lowered, allocated form.
pub fn compile_program(src: &str, file_name: &str, options: &Options, dumps: DumpRequests) -> Ir3cResult<CompileOutcome> {
    let mut program = ir3c_reader::parse_program(src, file_name)?;

    let mut warnings = Vec::new();
    for func in &mut program.functions {
        ir3c_opt::append_missing_return(func);
        warnings.extend(ir3c_opt::warn_unreachable_statements(func));
    }

    let dump_ir3 = dumps.ir3.then(|| ir3c_reader::write_program(&program));

    if options.optimize {
        log::debug!("running the IR optimizer to a fixed point");
        ir3c_opt::optimise_program(&mut program);
    }
    let dump_ir3_opt = dumps.ir3_opt.then(|| ir3c_reader::write_program(&program));

    ir3c_lower::lower_program(&mut program);
    let dump_ir3_lowered = dumps.ir3_lowered.then(|| ir3c_reader::write_program(&program));

    log::debug!("allocating registers for {} function(s)", program.functions.len());
    let allocations: HashMap<String, ir3c_regalloc::AllocationResult> = ir3c_regalloc::allocate_program(&mut program)?;

    let mut asm = ir3c_codegen::emit_program(&program, &allocations)?;
    if !options.annotate {
        asm = ir3c_codegen::strip_annotations(&asm);
    }

    Ok(CompileOutcome {
        asm,
        warnings,
        dump_ir3,
        dump_ir3_lowered,
        dump_ir3_opt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
fn main_dummy() -> Void {
  x = 2 + 3;
  println x;
  return;
}
"#;

    #[test]
    fn compiles_a_trivial_program_to_assembly_containing_the_entry_point() {
        let outcome = compile_program(SRC, "t.ir3", &Options::default(), DumpRequests::default()).unwrap();
        assert!(outcome.asm.contains(".global main\n"));
        assert!(outcome.asm.contains("bl main_dummy"));
        assert!(outcome.asm.contains(".global main_dummy\n"));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn optimizing_folds_the_constant_addition_out_of_the_dump() {
        let dumps = DumpRequests {
            ir3_opt: true,
            ..DumpRequests::default()
        };
        let options = Options {
            optimize: true,
            ..Options::default()
        };
        let outcome = compile_program(SRC, "t.ir3", &options, dumps).unwrap();
        let opt_dump = outcome.dump_ir3_opt.unwrap();
        assert!(!opt_dump.contains("2 + 3"));
    }

    #[test]
    fn stripping_annotations_removes_the_caller_save_comment() {
        const RECURSIVE: &str = r#"
fn fib(Int n) -> Int locals(Int a, Int b) {
  if n < 2 branch base;
  a = n - 1;
  a = call fib(a);
  b = n - 2;
  b = call fib(b);
  n = a + b;
  return n;
  label base:
  return n;
}

fn main_dummy() -> Void {
  r = call fib(5);
  println r;
  return;
}
"#;
        let annotated = compile_program(RECURSIVE, "t.ir3", &Options::default(), DumpRequests::default()).unwrap();
        let quiet = compile_program(
            RECURSIVE,
            "t.ir3",
            &Options {
                annotate: false,
                ..Options::default()
            },
            DumpRequests::default(),
        )
        .unwrap();
        assert!(annotated.asm.contains('@'));
        assert!(!quiet.asm.contains('@'));
    }

    #[test]
    fn malformed_ir3_text_is_reported_as_a_parse_error() {
        let err = compile_program("fn broken(", "bad.ir3", &Options::default(), DumpRequests::default());
        assert!(err.is_err());
    }
}
