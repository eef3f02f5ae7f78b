//! Generic worklist dataflow (spec.md §4.2) plus its four specializations:
//! liveness (used by the register allocator), reaching expressions (CSE),
//! reaching copies (copy propagation), reaching constants (constant
//! propagation).

mod cfg;
mod defuse;
mod liveness;
mod reaching;
mod solver;

pub use cfg::{Loc, StmtGraph};
pub use defuse::defs_and_uses;
pub use liveness::{analyse as analyse_liveness, Liveness};
pub use reaching::{reaching_constants, reaching_copies, reaching_expressions, ExprReaching};
pub use solver::{solve, Combine, Direction, Solution};

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_ir::{FuncDefn, FunctionBuilder, Stmt, StmtKind, Type, Value};
    use ir3c_diagnostics::Span;

    fn synth() -> Span {
        Span::synthetic()
    }

    /// `x = 1; y = x; return y;` — `x` and `y` are live across the whole
    /// straight-line body, nothing else is.
    fn straight_line_func() -> FuncDefn {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Int, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "x".into(),
                rhs: ir3c_ir::Expr::value(Value::int(1, synth()), synth()),
            },
            synth(),
        ));
        b.push(Stmt::new(
            StmtKind::AssignOp {
                lhs: "y".into(),
                rhs: ir3c_ir::Expr::value(Value::var("x", synth()), synth()),
            },
            synth(),
        ));
        b.terminate(
            Stmt::new(StmtKind::ReturnStmt(Some(Value::var("y", synth()))), synth()),
            &[],
        );
        func
    }

    #[test]
    fn liveness_tracks_straight_line_def_use_chain() {
        let func = straight_line_func();
        let graph = StmtGraph::build(&func);
        let live = analyse_liveness(&func, &graph);
        // after `x = 1`, x is live (used by the next statement)
        assert!(live.outs[0].contains("x"));
        // after `y = x`, x is dead but y is live into the return
        assert!(!live.outs[1].contains("x"));
        assert!(live.outs[1].contains("y"));
    }

    #[test]
    fn reaching_copies_sees_the_copy_across_statements() {
        let func = straight_line_func();
        let graph = StmtGraph::build(&func);
        let sol = reaching_copies(&func, &graph);
        assert!(sol.ins[2].contains(&("y".to_string(), "x".to_string())));
    }

    #[test]
    fn reaching_constants_propagates_to_the_return() {
        let func = straight_line_func();
        let graph = StmtGraph::build(&func);
        let sol = reaching_constants(&func, &graph);
        assert!(sol.ins[1].contains(&("x".to_string(), 1)));
    }
}
