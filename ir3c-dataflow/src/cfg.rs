//! The statement-granularity flow graph the solver actually walks. A
//! `FuncDefn`'s basic-block successors/predecessors only say which blocks
//! follow which; dataflow needs an edge between every pair of adjacent
//! *statements*, stitching block boundaries through each terminator's
//! targets.

use ir3c_ir::{BlockId, FuncDefn, Stmt};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Loc {
    pub block: BlockId,
    pub index: usize,
}

pub struct StmtGraph {
    locs: Vec<Loc>,
    index_of: HashMap<(BlockId, usize), usize>,
    pub preds: Vec<Vec<usize>>,
    pub succs: Vec<Vec<usize>>,
}

impl StmtGraph {
    pub fn build(func: &FuncDefn) -> Self {
        let mut locs = Vec::new();
        let mut index_of = HashMap::new();
        for (block, b) in func.blocks_in_order() {
            for i in 0..b.stmts.len() {
                index_of.insert((block, i), locs.len());
                locs.push(Loc { block, index: i });
            }
        }

        let n = locs.len();
        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];

        for (i, loc) in locs.iter().enumerate() {
            let block_stmts = &func.block(loc.block).stmts;
            if loc.index + 1 < block_stmts.len() {
                let next = index_of[&(loc.block, loc.index + 1)];
                succs[i].push(next);
            } else {
                for &succ_block in &func.block(loc.block).succs {
                    if let Some(&j) = index_of.get(&(succ_block, 0)) {
                        succs[i].push(j);
                    }
                }
            }
        }
        for i in 0..n {
            for &s in &succs[i].clone() {
                preds[s].push(i);
            }
        }

        Self {
            locs,
            index_of,
            preds,
            succs,
        }
    }

    pub fn len(&self) -> usize {
        self.locs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locs.is_empty()
    }

    pub fn loc(&self, n: usize) -> Loc {
        self.locs[n]
    }

    pub fn index_of(&self, block: BlockId, stmt_index: usize) -> Option<usize> {
        self.index_of.get(&(block, stmt_index)).copied()
    }

    pub fn stmt<'f>(&self, func: &'f FuncDefn, n: usize) -> &'f Stmt {
        let loc = self.locs[n];
        &func.block(loc.block).stmts[loc.index]
    }

    /// The global index of the entry block's first statement, the unique
    /// synthetic definition site of every local and parameter (spec.md
    /// §4.2, §4.4). `blocks_in_order` always starts with the entry block,
    /// so this is statement 0 whenever the function has any statements.
    pub fn entry_stmt(&self) -> Option<usize> {
        if self.locs.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}
