//! Textual assembler for the IR3 form (spec.md §6.4) and the matching
//! writer used by `--dump-ir3*`.
//!
//! This is not a parser for the class-based OO source language — the
//! lexer/parser/typechecker that would produce IR3 from source text are out
//! of scope for this crate family. Instead this is concrete syntax for the
//! `ir3c-ir` data model itself, one statement per line, so the pipeline from
//! `ir3c-lower` onward can be exercised and tested without a front end.
//!
//! # Grammar
//!
//! ```text
//! program    := (class_decl | fn_decl)*
//! class_decl := "class" Ident "{" field_decl* "}"
//! field_decl := "field" type Ident ";"
//! fn_decl    := "fn" Ident "(" params? ")" "->" type ("locals(" params ")")? "{" stmt* "}"
//! params     := type Ident ("," type Ident)*
//! type       := "Int" | "Bool" | "String" | "Void" | "Null" | Ident
//!
//! stmt := Ident "=" rhs ";"
//!       | Ident "." Ident "=" rhs ";"
//!       | "call" Ident "(" args? ")" ";"
//!       | "return" value? ";"
//!       | "readln" Ident ";"
//!       | "println" value ";"
//!       | "branch" Ident ";"
//!       | "if" cond "branch" Ident ";"
//!       | "label" Ident ":"
//!       | "constint" Ident "=" Int ";"
//!       | "conststr" Ident "=" Str ";"
//!       | "spill" Ident ";"
//!       | "restore" Ident ";"
//!       | "store" Ident "." Ident ":" type "=" Ident ";"
//!       | "dummy" ";"
//!       | "phi" Ident "=" "[" (Ident ":" Ident ("," Ident ":" Ident)*)? "]" ";"
//!
//! rhs   := "call" Ident "(" args? ")" | "new" Ident | Ident "." Ident
//!        | "-" value | "!" value | value (binop value)?
//! cond  := value (relop value)?
//! value := Int | Str | "true" | "false" | "null" | Ident
//! args  := value ("," value)*
//! binop := "+" "-" "*" "/" "==" "!=" "<" ">" "<=" ">=" "&&" "||" "~"
//! relop := "==" "!=" "<" ">" "<=" ">="
//! ```
//!
//! `~` is string concatenation (the typechecker-resolved `BinOp::Concat` of
//! spec.md §3.3); plain `+` is always integer addition. `#` starts a
//! line comment. A function's first block is implicit; a `label` statement
//! starts a new block unless the current one is still empty.

mod lexer;
mod parser;
mod writer;

pub use parser::{resolve_field_types, Parser};
pub use writer::write_program;

use ir3c_diagnostics::Ir3cResult;
use ir3c_ir::Program;

/// Parse a complete IR3 text into a [`Program`], resolving `AssignDotOp`
/// field types against the parsed class declarations.
pub fn parse_program(src: &str, file_name: &str) -> Ir3cResult<Program> {
    let mut parser = Parser::new(src, file_name.to_string())?;
    let mut program = parser.parse_program()?;
    resolve_field_types(&mut program)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
class Counter {
  field Int value;
}

fn main_dummy() -> Void {
  obj = new Counter;
  obj.value = 0;
  label loop:
  t = obj.value;
  if t < 10 branch body;
  branch end;
  label body:
  t2 = obj.value;
  t3 = t2 + 1;
  obj.value = t3;
  branch loop;
  label end:
  println obj.value;
  return;
}
"#;

    #[test]
    fn parses_classes_and_functions() {
        let program = parse_program(SRC, "t.ir3").unwrap();
        assert_eq!(program.classes.len(), 1);
        assert_eq!(program.functions.len(), 1);
        let func = &program.functions[0];
        assert_eq!(func.order.len(), 3);
    }

    #[test]
    fn resolves_assign_dot_op_field_type() {
        let program = parse_program(SRC, "t.ir3").unwrap();
        let func = &program.functions[0];
        let found = func.blocks_in_order().flat_map(|(_, b)| b.stmts.iter()).find_map(|s| {
            match &s.kind {
                ir3c_ir::StmtKind::AssignDotOp { field_type, .. } => Some(field_type.clone()),
                _ => None,
            }
        });
        assert_eq!(found, Some(ir3c_ir::Type::Int));
    }

    #[test]
    fn round_trips_through_writer() {
        let program = parse_program(SRC, "t.ir3").unwrap();
        let text = write_program(&program);
        let reparsed = parse_program(&text, "t2.ir3").unwrap();
        assert_eq!(reparsed.functions[0].order.len(), program.functions[0].order.len());
        assert_eq!(
            reparsed.functions[0].blocks_in_order().map(|(_, b)| b.stmts.len()).sum::<usize>(),
            program.functions[0].blocks_in_order().map(|(_, b)| b.stmts.len()).sum::<usize>()
        );
    }

    #[test]
    fn rejects_malformed_input() {
        let err = parse_program("fn broken(", "bad.ir3");
        assert!(err.is_err());
    }
}
