//! Render a `Program`/`FuncDefn` back to the textual form `parser` accepts,
//! for the `--dump-ir3`/`--dump-ir3-lowered`/`--dump-ir3-opt` flags. Not
//! required to reproduce the original source text byte-for-byte — only to
//! round-trip through `Parser::parse_program` to an IR structurally equal to
//! what was written (spec.md §8.2).

use cranelift_entity::EntityRef;
use ir3c_diagnostics::escape_string;
use ir3c_ir::{BinOp, Cond, Expr, ExprKind, FuncDefn, Program, Stmt, StmtKind, Type, Value, ValueKind};
use std::fmt::Write;

pub fn write_program(program: &Program) -> String {
    let mut out = String::new();
    for class in &program.classes {
        write_class(&mut out, class);
        out.push('\n');
    }
    for func in &program.functions {
        write_function(&mut out, func);
        out.push('\n');
    }
    out
}

fn write_class(out: &mut String, class: &ir3c_ir::ClassDefn) {
    let _ = writeln!(out, "class {} {{", class.name);
    for field in &class.fields {
        let _ = writeln!(out, "  field {} {};", type_str(&field.ty), field.name);
    }
    out.push_str("}\n");
}

fn params_str(params: &[ir3c_ir::VarDecl]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", type_str(&p.ty), p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_function(out: &mut String, func: &FuncDefn) {
    let _ = write!(
        out,
        "fn {}({}) -> {}",
        func.mangled_name,
        params_str(&func.params),
        type_str(&func.ret_type)
    );
    if !func.locals.is_empty() {
        let _ = write!(out, " locals({})", params_str(&func.locals));
    }
    out.push_str(" {\n");
    for (_, block) in func.blocks_in_order() {
        for stmt in &block.stmts {
            write_stmt(out, stmt, func);
        }
    }
    out.push_str("}\n");
}

/// The label a block is addressed by, for writing a `PhiNode`'s incoming
/// edges. Falls back to a synthetic `bN` name for a block with no explicit
/// `label` statement — unambiguous to write, but not guaranteed to
/// round-trip if that block is never otherwise named in the text (a block
/// with phi-node predecessors always carries a label in practice, since it
/// is itself a branch target).
fn block_label(func: &FuncDefn, block: ir3c_ir::BlockId) -> String {
    match func.block(block).stmts.first().map(|s| &s.kind) {
        Some(StmtKind::Label(name)) => name.clone(),
        _ => format!("b{}", block.index()),
    }
}

fn type_str(ty: &Type) -> String {
    match ty {
        Type::Int => "Int".to_string(),
        Type::Bool => "Bool".to_string(),
        Type::String => "String".to_string(),
        Type::Void => "Void".to_string(),
        Type::NullObject => "Null".to_string(),
        Type::Class(name) => name.clone(),
    }
}

fn value_str(v: &Value) -> String {
    match &v.kind {
        ValueKind::ConstantInt(i) => i.to_string(),
        ValueKind::ConstantBool(b) => b.to_string(),
        ValueKind::ConstantString(bytes) => format!("\"{}\"", escape_string(bytes)),
        ValueKind::ConstantNull => "null".to_string(),
        ValueKind::VarRef(name) => name.clone(),
    }
}

fn binop_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::Concat => "~",
    }
}

fn expr_str(e: &Expr) -> String {
    match &e.kind {
        ExprKind::BinaryOp { lhs, op, rhs } => {
            format!("{} {} {}", value_str(lhs), binop_str(*op), value_str(rhs))
        }
        ExprKind::UnaryOp { op, value } => {
            let sigil = if *op == ir3c_ir::UnOp::Neg { "-" } else { "!" };
            format!("{}{}", sigil, value_str(value))
        }
        ExprKind::DotOp { var_name, field_name } => format!("{}.{}", var_name, field_name),
        ExprKind::ValueExpr(v) => value_str(v),
        ExprKind::FnCallExpr(call) => format!(
            "call {}({})",
            call.callee,
            call.args.iter().map(value_str).collect::<Vec<_>>().join(", ")
        ),
        ExprKind::NewOp(class) => format!("new {}", class),
    }
}

fn cond_str(c: &Cond) -> String {
    match c {
        Cond::Value(v) => value_str(v),
        Cond::RelOp { lhs, op, rhs } => format!("{} {} {}", value_str(lhs), binop_str(*op), value_str(rhs)),
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, func: &FuncDefn) {
    match &stmt.kind {
        StmtKind::AssignOp { lhs, rhs } => {
            let _ = writeln!(out, "  {} = {};", lhs, expr_str(rhs));
        }
        StmtKind::AssignDotOp {
            obj_name,
            field_name,
            rhs,
            ..
        } => {
            let _ = writeln!(out, "  {}.{} = {};", obj_name, field_name, expr_str(rhs));
        }
        StmtKind::FnCallStmt(call) => {
            let _ = writeln!(
                out,
                "  call {}({});",
                call.callee,
                call.args.iter().map(value_str).collect::<Vec<_>>().join(", ")
            );
        }
        StmtKind::ReturnStmt(None) => {
            out.push_str("  return;\n");
        }
        StmtKind::ReturnStmt(Some(v)) => {
            let _ = writeln!(out, "  return {};", value_str(v));
        }
        StmtKind::ReadLnCall(name) => {
            let _ = writeln!(out, "  readln {};", name);
        }
        StmtKind::PrintLnCall(v) => {
            let _ = writeln!(out, "  println {};", value_str(v));
        }
        StmtKind::Branch(label) => {
            let _ = writeln!(out, "  branch {};", label);
        }
        StmtKind::CondBranch(cond, label) => {
            let _ = writeln!(out, "  if {} branch {};", cond_str(cond), label);
        }
        StmtKind::Label(name) => {
            let _ = writeln!(out, "label {}:", name);
        }
        StmtKind::AssignConstInt(name, v) => {
            let _ = writeln!(out, "  constint {} = {};", name, v);
        }
        StmtKind::AssignConstString(name, bytes) => {
            let _ = writeln!(out, "  conststr {} = \"{}\";", name, escape_string(bytes));
        }
        StmtKind::SpillVariable(name) => {
            let _ = writeln!(out, "  spill {};", name);
        }
        StmtKind::RestoreVariable(name) => {
            let _ = writeln!(out, "  restore {};", name);
        }
        StmtKind::StoreField {
            ptr,
            field,
            rhs_var,
            field_type,
        } => {
            let _ = writeln!(
                out,
                "  store {}.{}: {} = {};",
                ptr,
                field,
                type_str(field_type),
                rhs_var
            );
        }
        StmtKind::DummyStmt => {
            out.push_str("  dummy;\n");
        }
        StmtKind::PhiNode { lhs, incoming } => {
            let pairs = incoming
                .iter()
                .map(|(block, var)| format!("{}: {}", block_label(func, *block), var))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "  phi {} = [{}];", lhs, pairs);
        }
    }
}
