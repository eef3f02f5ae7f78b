use crate::lexer::{Lexer, Token, TokenKind};
use ir3c_diagnostics::{Ir3cError, Ir3cResult, Span};
use ir3c_ir::{
    rebuild_cfg, BinOp, ClassDefn, Cond, Expr, FnCall, FuncDefn, FunctionBuilder, Program, Stmt,
    StmtKind, Type, UnOp, Value, VarDecl,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    tok: Token,
    file: Arc<str>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, file: impl Into<Arc<str>>) -> Ir3cResult<Self> {
        let file = file.into();
        let mut lexer = Lexer::new(src, file.clone());
        let tok = lexer
            .next_token()
            .map_err(|e| Ir3cError::parse(Span::new(file.clone(), 0, 0), e))?;
        Ok(Self { lexer, tok, file })
    }

    fn span(&self) -> Span {
        Span::new(self.file.clone(), self.tok.line, self.tok.column)
    }

    fn bump(&mut self) -> Ir3cResult<Token> {
        let prev = self.tok.clone();
        self.tok = self
            .lexer
            .next_token()
            .map_err(|e| Ir3cError::parse(self.span(), e))?;
        Ok(prev)
    }

    fn err<T>(&self, msg: impl Into<String>) -> Ir3cResult<T> {
        Err(Ir3cError::parse(self.span(), msg))
    }

    fn eat_punct(&mut self, p: &'static str) -> Ir3cResult<()> {
        match &self.tok.kind {
            TokenKind::Punct(found) if *found == p => {
                self.bump()?;
                Ok(())
            }
            _ => self.err(format!("expected `{}`, found {:?}", p, self.tok.kind)),
        }
    }

    fn eat_ident(&mut self) -> Ir3cResult<String> {
        match self.tok.kind.clone() {
            TokenKind::Ident(s) => {
                self.bump()?;
                Ok(s)
            }
            other => self.err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> Ir3cResult<()> {
        match self.tok.kind.clone() {
            TokenKind::Ident(s) if s == kw => {
                self.bump()?;
                Ok(())
            }
            other => self.err(format!("expected `{}`, found {:?}", kw, other)),
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(&self.tok.kind, TokenKind::Ident(s) if s == kw)
    }

    fn eat_int(&mut self) -> Ir3cResult<i32> {
        match self.tok.kind {
            TokenKind::Int(v) => {
                self.bump()?;
                Ok(v)
            }
            _ => self.err(format!("expected integer literal, found {:?}", self.tok.kind)),
        }
    }

    fn eat_str(&mut self) -> Ir3cResult<Vec<u8>> {
        match self.tok.kind.clone() {
            TokenKind::Str(bytes) => {
                self.bump()?;
                Ok(bytes)
            }
            other => self.err(format!("expected string literal, found {:?}", other)),
        }
    }

    fn parse_type(&mut self) -> Ir3cResult<Type> {
        let name = self.eat_ident()?;
        Ok(match name.as_str() {
            "Int" => Type::Int,
            "Bool" => Type::Bool,
            "String" => Type::String,
            "Void" => Type::Void,
            "Null" => Type::NullObject,
            _ => Type::Class(name),
        })
    }

    /// Parse an entire translation unit: an interleaving of `class` and
    /// `fn` declarations.
    pub fn parse_program(&mut self) -> Ir3cResult<Program> {
        let mut program = Program::new();
        loop {
            if matches!(self.tok.kind, TokenKind::Eof) {
                break;
            }
            if self.at_keyword("class") {
                program.classes.push(self.parse_class()?);
            } else if self.at_keyword("fn") {
                program.functions.push(self.parse_function()?);
            } else {
                return self.err(format!(
                    "expected `class` or `fn` at top level, found {:?}",
                    self.tok.kind
                ));
            }
        }
        Ok(program)
    }

    fn parse_class(&mut self) -> Ir3cResult<ClassDefn> {
        let span = self.span();
        self.eat_keyword("class")?;
        let name = self.eat_ident()?;
        self.eat_punct("{")?;
        let mut fields = Vec::new();
        while self.at_keyword("field") {
            self.eat_keyword("field")?;
            let ty = self.parse_type()?;
            let field_name = self.eat_ident()?;
            self.eat_punct(";")?;
            fields.push(VarDecl::new(field_name, ty));
        }
        self.eat_punct("}")?;
        Ok(ClassDefn::new(name, fields, span))
    }

    fn parse_params(&mut self) -> Ir3cResult<Vec<VarDecl>> {
        self.eat_punct("(")?;
        let mut params = Vec::new();
        if !matches!(&self.tok.kind, TokenKind::Punct(")")) {
            loop {
                let ty = self.parse_type()?;
                let name = self.eat_ident()?;
                params.push(VarDecl::new(name, ty));
                if matches!(&self.tok.kind, TokenKind::Punct(",")) {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.eat_punct(")")?;
        Ok(params)
    }

    fn parse_function(&mut self) -> Ir3cResult<FuncDefn> {
        let span = self.span();
        self.eat_keyword("fn")?;
        let name = self.eat_ident()?;
        let params = self.parse_params()?;
        self.eat_punct("->")?;
        let ret_type = self.parse_type()?;

        let mut locals = Vec::new();
        if self.at_keyword("locals") {
            self.eat_keyword("locals")?;
            locals = self.parse_params()?;
        }

        let mut func = FuncDefn::new(name.clone(), name, ret_type, params, span);
        func.locals = locals;

        self.eat_punct("{")?;
        let mut builder = FunctionBuilder::new(&mut func);
        let mut label_blocks: HashMap<String, ir3c_ir::BlockId> = HashMap::new();
        let mut pending_phis: Vec<(ir3c_ir::BlockId, usize, Vec<(String, String)>)> = Vec::new();

        while !matches!(&self.tok.kind, TokenKind::Punct("}")) {
            self.parse_stmt(&mut builder, &mut label_blocks, &mut pending_phis)?;
        }
        self.eat_punct("}")?;

        for (block, idx, incoming) in pending_phis {
            let resolved: Vec<(ir3c_ir::BlockId, String)> = incoming
                .into_iter()
                .map(|(label, var)| {
                    let id = *label_blocks
                        .get(&label)
                        .expect("phi referenced an undeclared label");
                    (id, var)
                })
                .collect();
            if let StmtKind::PhiNode { incoming, .. } =
                &mut func.block_mut(block).stmts[idx].kind
            {
                *incoming = resolved;
            }
        }

        rebuild_cfg(&mut func);
        Ok(func)
    }

    fn parse_value(&mut self) -> Ir3cResult<Value> {
        let span = self.span();
        match self.tok.kind.clone() {
            TokenKind::Int(v) => {
                self.bump()?;
                Ok(Value::int(v, span))
            }
            TokenKind::Str(bytes) => {
                self.bump()?;
                Ok(Value::string(bytes, span))
            }
            TokenKind::Ident(s) if s == "true" => {
                self.bump()?;
                Ok(Value::boolean(true, span))
            }
            TokenKind::Ident(s) if s == "false" => {
                self.bump()?;
                Ok(Value::boolean(false, span))
            }
            TokenKind::Ident(s) if s == "null" => {
                self.bump()?;
                Ok(Value::null(span))
            }
            TokenKind::Ident(s) => {
                self.bump()?;
                Ok(Value::var(s, span))
            }
            other => self.err(format!("expected a value, found {:?}", other)),
        }
    }

    fn binop_for_punct(p: &str) -> Option<BinOp> {
        Some(match p {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            "~" => BinOp::Concat,
            _ => return None,
        })
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match &self.tok.kind {
            TokenKind::Punct(p) => Self::binop_for_punct(p),
            _ => None,
        }
    }

    /// Parse the right-hand side of an assignment: every expression form is
    /// flat (no nested subexpressions), matching the three-address
    /// invariant the whole pipeline relies on.
    fn parse_rhs_expr(&mut self) -> Ir3cResult<Expr> {
        let span = self.span();
        if self.at_keyword("call") {
            self.eat_keyword("call")?;
            let callee = self.eat_ident()?;
            let args = self.parse_args()?;
            return Ok(Expr::call(FnCall::new(callee, args), span));
        }
        if self.at_keyword("new") {
            self.eat_keyword("new")?;
            let class = self.eat_ident()?;
            return Ok(Expr::new_object(class, span));
        }
        if matches!(&self.tok.kind, TokenKind::Punct("-")) {
            self.bump()?;
            let v = self.parse_value()?;
            return Ok(Expr::unary(UnOp::Neg, v, span));
        }
        if matches!(&self.tok.kind, TokenKind::Punct("!")) {
            self.bump()?;
            let v = self.parse_value()?;
            return Ok(Expr::unary(UnOp::Not, v, span));
        }
        // Either `var.field` (DotOp) or a bare/binary value expression; both
        // start with a value token, so parse the first value then look
        // ahead one token to disambiguate.
        if let TokenKind::Ident(name) = self.tok.kind.clone() {
            if !matches!(name.as_str(), "true" | "false" | "null") {
                let save_line = self.tok.line;
                let _ = save_line;
                // Lookahead: peek whether a `.` follows without consuming
                // `name` as a generic value first.
                let ident_span = self.span();
                self.bump()?;
                if matches!(&self.tok.kind, TokenKind::Punct(".")) {
                    self.bump()?;
                    let field = self.eat_ident()?;
                    return Ok(Expr::dot(name, field, ident_span));
                }
                let lhs = Value::var(name, ident_span);
                return self.finish_value_or_binary(lhs, span);
            }
        }
        let lhs = self.parse_value()?;
        self.finish_value_or_binary(lhs, span)
    }

    fn finish_value_or_binary(&mut self, lhs: Value, span: Span) -> Ir3cResult<Expr> {
        if let Some(op) = self.peek_binop() {
            self.bump()?;
            let rhs = self.parse_value()?;
            Ok(Expr::binary(lhs, op, rhs, span))
        } else {
            Ok(Expr::value(lhs, span))
        }
    }

    fn parse_args(&mut self) -> Ir3cResult<Vec<Value>> {
        self.eat_punct("(")?;
        let mut args = Vec::new();
        if !matches!(&self.tok.kind, TokenKind::Punct(")")) {
            loop {
                args.push(self.parse_value()?);
                if matches!(&self.tok.kind, TokenKind::Punct(",")) {
                    self.bump()?;
                } else {
                    break;
                }
            }
        }
        self.eat_punct(")")?;
        Ok(args)
    }

    fn parse_cond(&mut self) -> Ir3cResult<Cond> {
        let lhs = self.parse_value()?;
        if let Some(op) = self.peek_binop() {
            if op.is_relational() {
                self.bump()?;
                let rhs = self.parse_value()?;
                return Ok(Cond::RelOp { lhs, op, rhs });
            }
        }
        Ok(Cond::Value(lhs))
    }

    #[allow(clippy::type_complexity)]
    fn parse_stmt(
        &mut self,
        b: &mut FunctionBuilder,
        label_blocks: &mut HashMap<String, ir3c_ir::BlockId>,
        pending_phis: &mut Vec<(ir3c_ir::BlockId, usize, Vec<(String, String)>)>,
    ) -> Ir3cResult<()> {
        let span = self.span();

        if self.at_keyword("label") {
            self.eat_keyword("label")?;
            let name = self.eat_ident()?;
            self.eat_punct(":")?;
            let cur = b.current_block();
            let target = if b.func().block(cur).stmts.is_empty() {
                cur
            } else {
                let fresh = b.create_block();
                b.switch_to_block(fresh);
                fresh
            };
            b.push(Stmt::new(StmtKind::Label(name.clone()), span));
            label_blocks.insert(name, target);
            return Ok(());
        }

        if self.at_keyword("branch") {
            self.eat_keyword("branch")?;
            let label = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::Branch(label), span));
            return Ok(());
        }

        if self.at_keyword("if") {
            self.eat_keyword("if")?;
            let cond = self.parse_cond()?;
            self.eat_keyword("branch")?;
            let label = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::CondBranch(cond, label), span));
            return Ok(());
        }

        if self.at_keyword("return") {
            self.eat_keyword("return")?;
            let value = if matches!(&self.tok.kind, TokenKind::Punct(";")) {
                None
            } else {
                Some(self.parse_value()?)
            };
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::ReturnStmt(value), span));
            return Ok(());
        }

        if self.at_keyword("readln") {
            self.eat_keyword("readln")?;
            let name = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::ReadLnCall(name), span));
            return Ok(());
        }

        if self.at_keyword("println") {
            self.eat_keyword("println")?;
            let value = self.parse_value()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::PrintLnCall(value), span));
            return Ok(());
        }

        if self.at_keyword("call") {
            self.eat_keyword("call")?;
            let callee = self.eat_ident()?;
            let args = self.parse_args()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::FnCallStmt(FnCall::new(callee, args)), span));
            return Ok(());
        }

        if self.at_keyword("constint") {
            self.eat_keyword("constint")?;
            let name = self.eat_ident()?;
            self.eat_punct("=")?;
            let v = self.eat_int()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::AssignConstInt(name, v), span));
            return Ok(());
        }

        if self.at_keyword("conststr") {
            self.eat_keyword("conststr")?;
            let name = self.eat_ident()?;
            self.eat_punct("=")?;
            let bytes = self.eat_str()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::AssignConstString(name, bytes), span));
            return Ok(());
        }

        if self.at_keyword("spill") {
            self.eat_keyword("spill")?;
            let name = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::SpillVariable(name), span));
            return Ok(());
        }

        if self.at_keyword("restore") {
            self.eat_keyword("restore")?;
            let name = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::RestoreVariable(name), span));
            return Ok(());
        }

        if self.at_keyword("store") {
            self.eat_keyword("store")?;
            let ptr = self.eat_ident()?;
            self.eat_punct(".")?;
            let field = self.eat_ident()?;
            self.eat_punct(":")?;
            let field_type = self.parse_type()?;
            self.eat_punct("=")?;
            let rhs_var = self.eat_ident()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(
                StmtKind::StoreField {
                    ptr,
                    field,
                    rhs_var,
                    field_type,
                },
                span,
            ));
            return Ok(());
        }

        if self.at_keyword("dummy") {
            self.eat_keyword("dummy")?;
            self.eat_punct(";")?;
            b.push(Stmt::new(StmtKind::DummyStmt, span));
            return Ok(());
        }

        if self.at_keyword("phi") {
            self.eat_keyword("phi")?;
            let lhs = self.eat_ident()?;
            self.eat_punct("=")?;
            self.eat_punct("[")?;
            let mut incoming = Vec::new();
            if !matches!(&self.tok.kind, TokenKind::Punct("]")) {
                loop {
                    let label = self.eat_ident()?;
                    self.eat_punct(":")?;
                    let var = self.eat_ident()?;
                    incoming.push((label, var));
                    if matches!(&self.tok.kind, TokenKind::Punct(",")) {
                        self.bump()?;
                    } else {
                        break;
                    }
                }
            }
            self.eat_punct("]")?;
            self.eat_punct(";")?;
            let idx = b.func().block(b.current_block()).stmts.len();
            b.push(Stmt::new(
                StmtKind::PhiNode {
                    lhs,
                    incoming: Vec::new(),
                },
                span,
            ));
            pending_phis.push((b.current_block(), idx, incoming));
            return Ok(());
        }

        // Remaining forms: `name = expr;` or `name.field = expr;`
        let name = self.eat_ident()?;
        if matches!(&self.tok.kind, TokenKind::Punct(".")) {
            self.bump()?;
            let field = self.eat_ident()?;
            self.eat_punct("=")?;
            let rhs = self.parse_rhs_expr()?;
            self.eat_punct(";")?;
            b.push(Stmt::new(
                StmtKind::AssignDotOp {
                    obj_name: name,
                    field_name: field,
                    rhs,
                    field_type: Type::Void,
                },
                span,
            ));
            return Ok(());
        }
        self.eat_punct("=")?;
        let rhs = self.parse_rhs_expr()?;
        self.eat_punct(";")?;
        b.push(Stmt::new(StmtKind::AssignOp { lhs: name, rhs }, span));
        Ok(())
    }
}

/// Fill in each `AssignDotOp`'s `field_type` by resolving the object
/// variable's declared class and looking up the field, since the textual
/// form never spells the field type out for a plain store-through-dot (the
/// reference compiler's typechecker would have resolved it the same way).
pub fn resolve_field_types(program: &mut Program) -> Ir3cResult<()> {
    let classes = program.classes.clone();
    for func in &mut program.functions {
        for block in func.blocks.values_mut() {
            for stmt in &mut block.stmts {
                if let StmtKind::AssignDotOp {
                    obj_name,
                    field_name,
                    field_type,
                    ..
                } = &mut stmt.kind
                {
                    let obj_ty = func
                        .params
                        .iter()
                        .chain(func.locals.iter())
                        .find(|v| &v.name == obj_name)
                        .map(|v| v.ty.clone());
                    let Some(Type::Class(class_name)) = obj_ty else {
                        return Err(Ir3cError::invariant(format!(
                            "`{}` is not a declared object-typed variable",
                            obj_name
                        )));
                    };
                    let class = classes
                        .iter()
                        .find(|c| c.name == class_name)
                        .ok_or_else(|| Ir3cError::invariant(format!("unknown class `{}`", class_name)))?;
                    let field = class.field(field_name).ok_or_else(|| {
                        Ir3cError::invariant(format!(
                            "class `{}` has no field `{}`",
                            class_name, field_name
                        ))
                    })?;
                    *field_type = field.ty.clone();
                }
            }
        }
    }
    Ok(())
}
