use crate::ids::BlockId;
use crate::stmt::Stmt;
use crate::types::Type;
use cranelift_entity::PrimaryMap;
use ir3c_diagnostics::Span;

/// A declared local or parameter: just a name and a type (spec.md §3.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A straight-line run of statements ending in a terminator (spec.md §3.5).
/// `preds`/`succs` are kept in sync by the CFG-construction pass (spec.md
/// §4.1) and every later pass that edits branches; they are recomputed
/// wholesale rather than diffed, since the optimizer rebuilds the CFG after
/// every change that could alter it.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub stmts: Vec<Stmt>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminator(&self) -> Option<&Stmt> {
        self.stmts.last().filter(|s| s.is_terminator())
    }
}

/// A function or method definition (spec.md §3.2). Methods carry `this` as
/// an explicit first parameter rather than as implicit receiver state,
/// matching the reference compiler's desugaring — by the time the core IR
/// sees a method it is already a free function.
#[derive(Clone, Debug)]
pub struct FuncDefn {
    pub name: String,
    pub mangled_name: String,
    pub ret_type: Type,
    pub params: Vec<VarDecl>,
    pub locals: Vec<VarDecl>,
    pub blocks: PrimaryMap<BlockId, BasicBlock>,
    /// Emission order, distinct from allocation order: blocks referenced by
    /// a forward branch may be allocated before the blocks preceding them in
    /// program order (spec.md §4.1).
    pub order: Vec<BlockId>,
    pub entry: BlockId,
    pub span: Span,
}

impl FuncDefn {
    pub fn new(
        name: impl Into<String>,
        mangled_name: impl Into<String>,
        ret_type: Type,
        params: Vec<VarDecl>,
        span: Span,
    ) -> Self {
        let mut blocks = PrimaryMap::new();
        let entry = blocks.push(BasicBlock::new());
        Self {
            name: name.into(),
            mangled_name: mangled_name.into(),
            ret_type,
            params,
            locals: Vec::new(),
            blocks,
            order: vec![entry],
            entry,
            span,
        }
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = self.blocks.push(BasicBlock::new());
        self.order.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    /// All variables in scope: parameters followed by locals, in the order
    /// the liveness analysis's `defs[0]` augmentation expects (spec.md
    /// §4.2).
    pub fn all_vars(&self) -> impl Iterator<Item = &VarDecl> {
        self.params.iter().chain(self.locals.iter())
    }

    pub fn var_type(&self, name: &str) -> Option<&Type> {
        self.all_vars().find(|v| v.name == name).map(|v| &v.ty)
    }

    /// Blocks in emission order, for iteration during lowering/codegen.
    pub fn blocks_in_order(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.order.iter().map(move |&id| (id, &self.blocks[id]))
    }
}
