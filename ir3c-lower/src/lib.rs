//! Lowering from optimized IR3 to the form the register allocator and
//! emitter expect (spec.md §4.4): constant materialization, field-store
//! splitting, and a synthetic entry-block marker. Runs once per function,
//! after the optimizer has reached its fixed point and before the
//! allocator renumbers statements and builds the interference graph.

mod entry;
mod fields;
mod materialize;

pub use entry::insert_entry_dummy;
pub use fields::split_field_stores;
pub use materialize::materialize_constants;

use ir3c_ir::{FuncDefn, Program};

pub fn lower_function(func: &mut FuncDefn) {
    entry::insert_entry_dummy(func);
    materialize::materialize_constants(func);
    fields::split_field_stores(func);
}

pub fn lower_program(program: &mut Program) {
    for func in &mut program.functions {
        lower_function(func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_diagnostics::Span;
    use ir3c_ir::{BinOp, Expr, FuncDefn, FunctionBuilder, Stmt, StmtKind, Type, Value};

    fn synth() -> Span {
        Span::synthetic()
    }

    #[test]
    fn materializes_an_out_of_range_integer_constant() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "x".into(),
                rhs: Expr::value(Value::int(1000, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        materialize_constants(&mut func);
        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts.len(), 3);
        match &stmts[0].kind {
            StmtKind::AssignConstInt(name, v) => {
                assert_eq!(name, "_c0");
                assert_eq!(*v, 1000);
            }
            other => panic!("expected AssignConstInt, got {other:?}"),
        }
        match &stmts[1].kind {
            StmtKind::AssignOp { rhs, .. } => {
                assert_eq!(rhs.operand_vars(), vec!["_c0"]);
            }
            other => panic!("expected AssignOp, got {other:?}"),
        }
        assert!(func.locals.iter().any(|v| v.name == "_c0" && v.ty == Type::Int));
    }

    #[test]
    fn small_int_constants_are_left_alone() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "x".into(),
                rhs: Expr::value(Value::int(10, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        materialize_constants(&mut func);
        assert_eq!(func.block(func.entry).stmts.len(), 2);
        assert!(func.locals.is_empty());
    }

    #[test]
    fn a_binary_op_with_an_out_of_range_operand_gets_one_preceding_materialization() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "x".into(),
                rhs: Expr::binary(Value::var("y", synth()), BinOp::Add, Value::int(500, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        materialize_constants(&mut func);
        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::AssignConstInt(..)));
    }

    #[test]
    fn a_string_constant_is_always_materialized() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::PrintLnCall(Value::string(*b"hi", synth())),
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        materialize_constants(&mut func);
        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0].kind, StmtKind::AssignConstString(..)));
        assert!(func.locals.iter().any(|v| v.ty == Type::String));
    }

    #[test]
    fn splits_a_field_store_into_a_temp_and_a_store_field() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignDotOp {
                obj_name: "obj".into(),
                field_name: "value".into(),
                rhs: Expr::value(Value::var("y", synth()), synth()),
                field_type: Type::Int,
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        split_field_stores(&mut func);
        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts.len(), 3);
        let temp = match &stmts[0].kind {
            StmtKind::AssignOp { lhs, .. } => lhs.clone(),
            other => panic!("expected AssignOp, got {other:?}"),
        };
        match &stmts[1].kind {
            StmtKind::StoreField { ptr, field, rhs_var, field_type } => {
                assert_eq!(ptr, "obj");
                assert_eq!(field, "value");
                assert_eq!(rhs_var, &temp);
                assert_eq!(*field_type, Type::Int);
            }
            other => panic!("expected StoreField, got {other:?}"),
        }
    }

    #[test]
    fn lower_function_prepends_a_dummy_to_the_entry_block() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        lower_function(&mut func);
        assert!(func.block(func.entry).stmts[0].is_dummy());
    }
}
