//! The IR optimizer (spec.md §4.1, §4.3): construction-time cleanup
//! (`blockify`), dense id renumbering (`renumber`), the nine fixed-point
//! passes (`passes`) and the driver loop that ties them together (`driver`).

mod blockify;
mod driver;
mod passes;
mod renumber;
mod rewrite;

pub use blockify::{append_missing_return, warn_unreachable_statements};
pub use driver::{optimise_function, optimise_program};
pub use passes::{
    eliminate_common_subexpressions, fold_constants, propagate_constants, propagate_copies,
    remove_double_jumps, remove_redundant_temporaries, remove_unreachable_blocks,
    remove_unreachable_statements, remove_unused_variables,
};
pub use renumber::renumber;

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;
    use ir3c_dataflow::StmtGraph;
    use ir3c_diagnostics::Span;
    use ir3c_ir::{BinOp, Expr, FnCall, FuncDefn, FunctionBuilder, Stmt, StmtKind, Type, Value};

    fn synth() -> Span {
        Span::synthetic()
    }

    #[test]
    fn removes_a_block_unreachable_after_an_unconditional_return() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);
        let dead = b.create_block();
        b.switch_to_block(dead);
        b.push(Stmt::new(StmtKind::Label("dead".into()), synth()));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        ir3c_ir::rebuild_cfg(&mut func);
        assert!(remove_unreachable_blocks(&mut func));
        assert_eq!(func.order.len(), 1);
    }

    #[test]
    fn collapses_a_chain_of_pure_redirect_blocks() {
        // entry: branch mid;  mid: label mid: branch end;  end: label end: return;
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        let mid = b.create_block();
        let end = b.create_block();
        b.terminate(Stmt::new(StmtKind::Branch("mid".into()), synth()), &[mid]);
        b.switch_to_block(mid);
        b.push(Stmt::new(StmtKind::Label("mid".into()), synth()));
        b.terminate(Stmt::new(StmtKind::Branch("end".into()), synth()), &[end]);
        b.switch_to_block(end);
        b.push(Stmt::new(StmtKind::Label("end".into()), synth()));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);
        ir3c_ir::rebuild_cfg(&mut func);

        assert!(remove_double_jumps(&mut func));
        match &func.block(func.entry).stmts[0].kind {
            StmtKind::Branch(label) => assert_eq!(label, "end"),
            other => panic!("expected a direct branch to end, got {other:?}"),
        }
    }

    #[test]
    fn unused_variable_assignment_is_deleted_but_its_call_survives() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "_unused".into(),
                rhs: Expr::call(FnCall::new("helper", vec![]), synth()),
            },
            synth(),
        ));
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "_also_unused".into(),
                rhs: Expr::value(Value::int(1, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        assert!(remove_unused_variables(&mut func));
        assert!(matches!(func.block(func.entry).stmts[0].kind, StmtKind::FnCallStmt(_)));
        assert!(func.block(func.entry).stmts[1].is_dummy());
    }

    #[test]
    fn copy_propagation_inlines_a_single_reaching_source() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "_t0".into(),
                rhs: Expr::value(Value::var("x", synth()), synth()),
            },
            synth(),
        ));
        b.terminate(
            Stmt::new(StmtKind::ReturnStmt(Some(Value::var("_t0", synth()))), synth()),
            &[],
        );
        ir3c_ir::rebuild_cfg(&mut func);

        let graph = StmtGraph::build(&func);
        assert!(propagate_copies(&mut func, &graph));
        match &func.block(func.entry).stmts[1].kind {
            StmtKind::ReturnStmt(Some(v)) => assert_eq!(v.as_var(), Some("x")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn folds_an_additive_identity_and_a_self_assignment() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "x".into(),
                rhs: Expr::binary(Value::var("x", synth()), BinOp::Add, Value::int(0, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        assert!(fold_constants(&mut func));
        assert!(func.block(func.entry).stmts[0].is_dummy());
    }

    #[test]
    fn end_to_end_fixed_point_clears_a_dead_temporary_chain() {
        // _t0 = 2 + 3; y = _t0; return y;  ->  return 5;
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "_t0".into(),
                rhs: Expr::binary(Value::int(2, synth()), BinOp::Add, Value::int(3, synth()), synth()),
            },
            synth(),
        ));
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "y".into(),
                rhs: Expr::value(Value::var("_t0", synth()), synth()),
            },
            synth(),
        ));
        b.terminate(
            Stmt::new(StmtKind::ReturnStmt(Some(Value::var("y", synth()))), synth()),
            &[],
        );

        optimise_function(&mut func);

        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StmtKind::ReturnStmt(Some(v)) => assert_eq!(v.as_int(), Some(5)),
            other => panic!("expected a folded return of 5, got {other:?}"),
        }
    }

    #[test]
    fn renumber_assigns_dense_ids_in_block_order() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "a".into(),
                rhs: Expr::value(Value::int(1, synth()), synth()),
            },
            synth(),
        ));
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "b".into(),
                rhs: Expr::value(Value::int(2, synth()), synth()),
            },
            synth(),
        ));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        renumber(&mut func);
        let stmts = &func.block(func.entry).stmts;
        assert_eq!(stmts[0].id.index(), 0);
        assert_eq!(stmts[1].id.index(), 1);
        assert_eq!(stmts[2].id.index(), 2);
        match &stmts[0].kind {
            StmtKind::AssignOp { rhs, .. } => assert_eq!(rhs.id.index(), 0),
            _ => unreachable!(),
        }
    }

    #[test]
    fn warns_about_a_statement_after_a_terminator() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        func.block_mut(func.entry).stmts.push(Stmt::new(StmtKind::ReturnStmt(None), synth()));
        func.block_mut(func.entry)
            .stmts
            .push(Stmt::new(StmtKind::PrintLnCall(Value::int(1, synth())), synth()));

        let diags = warn_unreachable_statements(&func);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn appends_a_missing_return_to_a_void_function() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        func.block_mut(func.entry)
            .stmts
            .push(Stmt::new(StmtKind::PrintLnCall(Value::int(1, synth())), synth()));

        append_missing_return(&mut func);
        assert!(matches!(
            func.block(func.entry).stmts.last().map(|s| &s.kind),
            Some(StmtKind::ReturnStmt(None))
        ));
    }
}
