//! Final assembly text assembly (spec.md §4.12, §6.2): `.text` section with
//! every compiled function plus the fixed synthetic `main` wrapper and any
//! required runtime builtins, followed by a `.data` section holding the
//! string pool. No Python original emits literal assembly text this way —
//! `cgstate.finalise` builds one function's text at a time — so the overall
//! layout here is read directly off spec.md rather than ported line by line.

use crate::builtins;
use crate::instr::Instr;
use crate::strings::StringPool;
use ir3c_ir::{MAIN_DUMMY_NAME, MAIN_SYMBOL};
use std::collections::HashSet;
use std::fmt::Write as _;

fn render_body(out: &mut String, instrs: &[Instr]) {
    for instr in instrs {
        writeln!(out, "{instr}").expect("writing to a String never fails");
    }
}

/// The hand-written `main` entry point: sets up a null `this` for the
/// desugared top-level `main` (now `main_dummy`), calls it, and returns 0
/// to the caller regardless of `main_dummy`'s own control flow. Unlike
/// every other function, `main_dummy` is emitted and called under its
/// literal name, never a mangled one (spec.md §3.6).
fn synthetic_main() -> String {
    let target = MAIN_DUMMY_NAME;
    let mut out = String::new();
    writeln!(out, ".global {MAIN_SYMBOL}").unwrap();
    writeln!(out, "{MAIN_SYMBOL}:").unwrap();
    writeln!(out, "\tstmfd sp!, {{lr}}").unwrap();
    writeln!(out, "\tmov a1, #0").unwrap();
    writeln!(out, "\tbl {target}").unwrap();
    writeln!(out, "\tmov a1, #0").unwrap();
    writeln!(out, "\tldmfd sp!, {{pc}}").unwrap();
    out
}

/// Escape a byte string for an `.asciz` directive. Printable ASCII passes
/// through; everything else becomes an octal escape, matching what `as`
/// accepts.
fn escape_ascii(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
    out
}

fn render_data_section(out: &mut String, strings: &StringPool) {
    writeln!(out, ".data").unwrap();
    writeln!(out, ".global stdin").unwrap();
    writeln!(out).unwrap();

    writeln!(out, ".println_int_fmt:").unwrap();
    writeln!(out, "\t.asciz \"%d\\n\"").unwrap();
    writeln!(out, ".println_true:").unwrap();
    writeln!(out, "\t.asciz \"true\"").unwrap();
    writeln!(out, ".println_false:").unwrap();
    writeln!(out, "\t.asciz \"false\"").unwrap();
    writeln!(out, ".println_null:").unwrap();
    writeln!(out, "\t.asciz \"null\"").unwrap();
    writeln!(out).unwrap();

    for (id, bytes) in strings.entries() {
        writeln!(out, "\t.align 2").unwrap();
        writeln!(out, ".string{id}:").unwrap();
        writeln!(out, "\t.word {}", bytes.len()).unwrap();
        writeln!(out, ".string{id}_raw:").unwrap();
        writeln!(out, "\t.asciz \"{}\"", escape_ascii(bytes)).unwrap();
    }
}

/// Assemble the whole program's text. `functions` must already be in
/// program order; `builtins_used` drives which runtime routines from
/// [`builtins`] get emitted.
pub fn serialize(functions: &[(String, Vec<Instr>)], builtins_used: &HashSet<&'static str>, strings: &StringPool) -> String {
    let mut out = String::new();
    writeln!(out, ".text").unwrap();
    writeln!(out).unwrap();

    out.push_str(&synthetic_main());
    writeln!(out).unwrap();

    for (name, instrs) in functions {
        writeln!(out, ".global {name}").unwrap();
        writeln!(out, "{name}:").unwrap();
        render_body(&mut out, instrs);
        writeln!(out).unwrap();
    }

    for name in builtins::ORDER.iter().filter(|b| builtins_used.contains(*b)) {
        out.push_str(builtins::body(name));
        writeln!(out).unwrap();
    }

    render_data_section(&mut out, strings);
    out
}
