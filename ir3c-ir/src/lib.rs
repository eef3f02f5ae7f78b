//! Core IR data model: the three-address representation every later stage
//! (dataflow, optimizer, lowering, register allocation, codegen) reads and
//! rewrites in place. Mirrors `cranelift_codegen::ir`'s split between
//! entity ids (`ids`), values (`value`), instructions (`expr`/`stmt`), and
//! the function/program containers (`function`/`class`/`program`).

pub mod builder;
pub mod class;
pub mod expr;
pub mod function;
pub mod ids;
pub mod mangle;
pub mod program;
pub mod stmt;
pub mod types;
pub mod value;

pub use builder::{rebuild_cfg, FunctionBuilder};
pub use class::ClassDefn;
pub use expr::{Expr, ExprKind, FnCall};
pub use function::{BasicBlock, FuncDefn, VarDecl};
pub use ids::{BlockId, ExprId, StmtId};
pub use mangle::{is_user_main, mangle_function, mangle_method, MAIN_DUMMY_NAME, MAIN_SYMBOL};
pub use program::Program;
pub use stmt::{Cond, Stmt, StmtKind};
pub use types::{BinOp, Type, UnOp};
pub use value::{Value, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_diagnostics::Span;

    fn synth() -> Span {
        Span::synthetic()
    }

    #[test]
    fn builder_links_a_two_block_branch() {
        let mut func = FuncDefn::new("f", "_JMain_fE", Type::Void, vec![], synth());
        let mut b = FunctionBuilder::new(&mut func);
        let exit = b.create_block();
        b.terminate(Stmt::new(StmtKind::Branch("exit".into()), synth()), &[exit]);
        b.switch_to_block(exit);
        b.push(Stmt::new(StmtKind::Label("exit".into()), synth()));
        b.terminate(Stmt::new(StmtKind::ReturnStmt(None), synth()), &[]);

        assert_eq!(func.block(func.entry).succs, vec![exit]);
        assert_eq!(func.block(exit).preds, vec![func.entry]);
    }

    #[test]
    fn mangling_matches_scheme() {
        assert_eq!(
            mangle_method("Fac", "compute", &[Type::Int, Type::Class("Foo".into())]),
            "_JFac_computei3FooE"
        );
        assert_eq!(mangle_method("Main", "main_dummy", &[]), "_JMain_main_dummyE");
    }

    #[test]
    fn small_int_range_is_inclusive_of_endpoints() {
        use crate::value::Value;
        assert!(Value::int(256, synth()).is_small_int());
        assert!(Value::int(-256, synth()).is_small_int());
        assert!(!Value::int(257, synth()).is_small_int());
    }

    #[test]
    fn value_equality_ignores_span() {
        use crate::value::Value;
        let a = Value::int(5, Span::synthetic());
        let b = Value::int(5, Span::new("other.ir3".into(), 10, 2));
        assert_eq!(a, b);
    }
}
