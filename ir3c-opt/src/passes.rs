//! The nine passes of spec.md §4.3's fixed-point pipeline, ported
//! pass-for-pass from the reference optimizer's `remove_unreachable_blocks`,
//! `remove_double_jumps`, `remove_redundant_temporaries`,
//! `remove_unused_variables`, `eliminate_common_subexpressions`,
//! `propagate_copies` and `propagate_constants`, plus two IR3-native passes
//! (8: algebraic/constant folding, 9: unreachable-statement cleanup) that the
//! reference performs at the AST level, before IR3 exists, and spec.md
//! re-homes into the IR (see `fold` below for the grounding note).
//!
//! Every pass returns whether it changed anything; [`crate::driver`] uses
//! that to decide whether to keep iterating.

use crate::rewrite;
use ir3c_dataflow::{defs_and_uses, reaching_constants, reaching_copies, reaching_expressions, StmtGraph};
use ir3c_ir::{Expr, ExprKind, FuncDefn, Stmt, StmtKind, UnOp, Value, ValueKind};
use std::collections::{HashMap, HashSet};

fn is_temporary(name: &str) -> bool {
    name.starts_with('_')
}

/// Pass 1: prune every block not reachable from the entry along `succs`
/// edges (which already include fallthrough, since `rebuild_cfg` computed
/// them). Blocks are never removed from the arena, only dropped from
/// `order` — cheaper than compacting, and harmless since nothing but
/// `order`/`blocks_in_order` ever walks the arena wholesale.
pub fn remove_unreachable_blocks(func: &mut FuncDefn) -> bool {
    let mut reachable = HashSet::new();
    let mut stack = vec![func.entry];
    while let Some(b) = stack.pop() {
        if reachable.insert(b) {
            for &s in &func.block(b).succs {
                stack.push(s);
            }
        }
    }
    let before = func.order.len();
    func.order.retain(|b| reachable.contains(b));
    func.order.len() != before
}

/// Pass 2: a block whose only real content is a single unconditional
/// `Branch` (after an optional leading `Label`) is a pure redirect. Every
/// other block's `Branch`/`CondBranch` naming that block's label is
/// rewritten to jump straight to the inner target; the redirect block
/// itself is left for pass 1 to prune once nothing points at it anymore.
pub fn remove_double_jumps(func: &mut FuncDefn) -> bool {
    let mut redirects: HashMap<String, String> = HashMap::new();
    for &block in &func.order {
        let stmts = &func.block(block).stmts;
        let mut it = stmts.iter();
        let mut first = it.next();
        let label = if let Some(Stmt { kind: StmtKind::Label(name), .. }) = first {
            let name = name.clone();
            first = it.next();
            Some(name)
        } else {
            None
        };
        let Some(label) = label else { continue };
        if let Some(Stmt { kind: StmtKind::Branch(target), .. }) = first {
            if it.next().is_none() && target != &label {
                redirects.insert(label, target.clone());
            }
        }
    }
    if redirects.is_empty() {
        return false;
    }

    let resolve = |mut label: &str| -> Option<String> {
        let mut seen = HashSet::new();
        let mut last = None;
        while let Some(next) = redirects.get(label) {
            if !seen.insert(next.clone()) {
                break;
            }
            last = Some(next.clone());
            label = next;
        }
        last
    };

    let mut changed = false;
    for &block in &func.order.clone() {
        for stmt in &mut func.block_mut(block).stmts {
            match &mut stmt.kind {
                StmtKind::Branch(label) | StmtKind::CondBranch(_, label) => {
                    if let Some(target) = resolve(label) {
                        if &target != label {
                            *label = target;
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
    }
    changed
}

/// Pass 3: a temporary with exactly one `AssignOp` definition, immediately
/// copied into a real variable (`x = _t` or `obj.f = _t`) by the very next
/// statement in the same block, has that copy's rhs replaced by the
/// temporary's own rhs. The now-dead temporary assignment is left for pass 4
/// to clean up, matching the reference's `remove_redundant_temporaries`,
/// which never deletes the original statement itself.
pub fn remove_redundant_temporaries(func: &mut FuncDefn) -> bool {
    let mut def_count: HashMap<&str, u32> = HashMap::new();
    for (_, block) in func.blocks_in_order() {
        for stmt in &block.stmts {
            if let StmtKind::AssignOp { lhs, .. } = &stmt.kind {
                if is_temporary(lhs) {
                    *def_count.entry(lhs.as_str()).or_default() += 1;
                }
            }
        }
    }

    let mut changed = false;
    for &block in &func.order.clone() {
        let len = func.block(block).stmts.len();
        for i in 0..len.saturating_sub(1) {
            let temp_rhs = match &func.block(block).stmts[i].kind {
                StmtKind::AssignOp { lhs, rhs } if def_count.get(lhs.as_str()) == Some(&1) => {
                    Some((lhs.clone(), rhs.clone()))
                }
                _ => None,
            };
            let Some((temp, rhs)) = temp_rhs else { continue };

            let matches_next = match &func.block(block).stmts[i + 1].kind {
                StmtKind::AssignOp { rhs: next_rhs, .. } | StmtKind::AssignDotOp { rhs: next_rhs, .. } => {
                    matches!(&next_rhs.kind, ExprKind::ValueExpr(v) if v.as_var() == Some(temp.as_str()))
                }
                _ => false,
            };
            if matches_next {
                let span = rhs.span.clone();
                let next = &mut func.block_mut(block).stmts[i + 1];
                match &mut next.kind {
                    StmtKind::AssignOp { rhs: next_rhs, .. } | StmtKind::AssignDotOp { rhs: next_rhs, .. } => {
                        *next_rhs = Expr { span, ..rhs };
                    }
                    _ => unreachable!(),
                }
                changed = true;
            }
        }
    }
    changed
}

/// Pass 4: a variable with zero uses anywhere in the function has its
/// defining `AssignOp` either stripped of its side effect (`FnCallExpr`
/// becomes a bare `FnCallStmt`) or deleted outright. `NewOp`'s allocation is
/// *not* treated as a side effect worth preserving here — the reference's
/// `get_side_effects` returns nothing for it, so an unused `new` assignment
/// is simply dropped. `AssignDotOp` is never a candidate: its lhs is a
/// memory write, always externally visible.
pub fn remove_unused_variables(func: &mut FuncDefn) -> bool {
    let mut used: HashSet<String> = HashSet::new();
    for (_, block) in func.blocks_in_order() {
        for stmt in &block.stmts {
            used.extend(defs_and_uses(stmt).1);
        }
    }

    let mut changed = false;
    for &block in &func.order.clone() {
        for stmt in &mut func.block_mut(block).stmts {
            if let StmtKind::AssignOp { lhs, rhs } = &stmt.kind {
                if !used.contains(lhs) {
                    match &rhs.kind {
                        ExprKind::FnCallExpr(call) => {
                            stmt.kind = StmtKind::FnCallStmt(call.clone());
                        }
                        _ => {
                            stmt.kind = StmtKind::DummyStmt;
                        }
                    }
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Pass 5: forward, intersection-combined reaching expressions. At each
/// non-side-effecting `AssignOp`, if a structurally identical expression
/// already reaches this point, rewrite this statement's rhs to a `VarRef` of
/// that expression's own lhs instead of recomputing it.
pub fn eliminate_common_subexpressions(func: &mut FuncDefn, graph: &StmtGraph) -> bool {
    let reaching = {
        let func_ref = &*func;
        reaching_expressions(func_ref, graph)
    };
    let exprs_by_id: HashMap<_, _> = (0..graph.len())
        .filter_map(|n| match &graph.stmt(func, n).kind {
            StmtKind::AssignOp { rhs, .. } if !rhs.has_side_effect() => Some((rhs.id, rhs.clone())),
            _ => None,
        })
        .collect();

    let mut changed = false;
    for n in 0..graph.len() {
        let loc = graph.loc(n);
        let this_id = match &func.block(loc.block).stmts[loc.index].kind {
            StmtKind::AssignOp { rhs, .. } if !rhs.has_side_effect() => rhs.id,
            _ => continue,
        };
        let replacement = reaching.solution.ins[n].iter().find_map(|&id| {
            if id == this_id {
                return None;
            }
            let candidate = exprs_by_id.get(&id)?;
            let this_expr = match &func.block(loc.block).stmts[loc.index].kind {
                StmtKind::AssignOp { rhs, .. } => rhs,
                _ => unreachable!(),
            };
            if candidate == this_expr {
                reaching.generator_lhs.get(&id).cloned()
            } else {
                None
            }
        });
        if let Some(src) = replacement {
            let stmt = &mut func.block_mut(loc.block).stmts[loc.index];
            if let StmtKind::AssignOp { rhs, .. } = &mut stmt.kind {
                let span = rhs.span.clone();
                rhs.kind = ExprKind::ValueExpr(Value::new(ValueKind::VarRef(src), span));
                changed = true;
            }
        }
    }
    changed
}

/// Pass 6: forward, intersection-combined reaching copies. A temporary read
/// with exactly one reaching `(temp, source)` copy fact has every use
/// rewritten to read `source` directly.
pub fn propagate_copies(func: &mut FuncDefn, graph: &StmtGraph) -> bool {
    let sol = reaching_copies(func, graph);
    let mut changed = false;
    for n in 0..graph.len() {
        let loc = graph.loc(n);
        let uses: Vec<String> = {
            let stmt = &func.block(loc.block).stmts[loc.index];
            defs_and_uses(stmt).1.into_iter().filter(|v| is_temporary(v)).collect()
        };
        for var in uses {
            let mut candidate: Option<&str> = None;
            let mut ambiguous = false;
            for (d, s) in &sol.ins[n] {
                if d == &var {
                    match candidate {
                        None => candidate = Some(s),
                        Some(c) if c != s => ambiguous = true,
                        _ => {}
                    }
                }
            }
            if ambiguous {
                continue;
            }
            if let Some(src) = candidate {
                if src != var {
                    let src = src.to_string();
                    let stmt = &mut func.block_mut(loc.block).stmts[loc.index];
                    if rewrite::rename_var(&mut stmt.kind, &var, &src) {
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

/// Pass 7: forward, intersection-combined reaching constants. A variable
/// read with exactly one reaching `(var, value)` fact has that read inlined
/// as the literal `value`.
///
/// The reference's `propagate_constants` additionally intersects the
/// transitive-predecessor set with each constant's generation sites before
/// trusting "exactly one value reaches" — a refinement needed only when two
/// distinct generation sites for the *same* variable and the *same* value
/// could otherwise be conflated with a third, different-valued site under
/// plain intersection. Since our domain key is `(var, value)` itself (not
/// bare `var`), two facts with different values for the same variable never
/// collapse into one dataflow element in the first place, so the plain
/// intersection result already carries that distinction — the extra check
/// is redundant for the shape of domain used here and is intentionally not
/// replicated.
pub fn propagate_constants(func: &mut FuncDefn, graph: &StmtGraph) -> bool {
    let sol = reaching_constants(func, graph);
    let mut changed = false;
    for n in 0..graph.len() {
        let loc = graph.loc(n);
        let uses: Vec<String> = {
            let stmt = &func.block(loc.block).stmts[loc.index];
            defs_and_uses(stmt).1.into_iter().collect()
        };
        for var in uses {
            let mut candidate: Option<i32> = None;
            let mut ambiguous = false;
            for (v, c) in &sol.ins[n] {
                if v == &var {
                    match candidate {
                        None => candidate = Some(*c),
                        Some(existing) if existing != *c => ambiguous = true,
                        _ => {}
                    }
                }
            }
            if ambiguous {
                continue;
            }
            if let Some(c) = candidate {
                let stmt = &mut func.block_mut(loc.block).stmts[loc.index];
                if rewrite::inline_const(&mut stmt.kind, &var, c) {
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Pass 8: algebraic simplification and constant folding at the IR3 level.
/// The reference compiler folds constants at the AST stage, before IR3
/// exists (`simp.py`); spec.md moves an equivalent pass into the IR itself,
/// so this is a genuinely new pass rather than a transliteration — grounded
/// in spec.md §4.3 pass 8's own enumeration of identities and in the
/// reference's evaluation semantics (truncating integer division, no
/// wraparound folding on overflow).
pub fn fold_constants(func: &mut FuncDefn) -> bool {
    let mut changed = false;
    for &block in &func.order.clone() {
        for stmt in &mut func.block_mut(block).stmts {
            changed |= fold_stmt(stmt);
        }
    }
    changed
}

fn fold_stmt(stmt: &mut Stmt) -> bool {
    match &mut stmt.kind {
        StmtKind::AssignOp { lhs, rhs } => {
            let mut changed = fold_expr(rhs);
            if let ExprKind::ValueExpr(v) = &rhs.kind {
                if v.as_var() == Some(lhs.as_str()) {
                    stmt.kind = StmtKind::DummyStmt;
                    return true;
                }
            }
            changed
        }
        StmtKind::CondBranch(cond, label) => match cond.const_eval() {
            Some(true) => {
                stmt.kind = StmtKind::Branch(label.clone());
                true
            }
            Some(false) => {
                stmt.kind = StmtKind::DummyStmt;
                true
            }
            None => false,
        },
        _ => false,
    }
}

fn fold_expr(e: &mut Expr) -> bool {
    let folded = match &e.kind {
        ExprKind::BinaryOp { lhs, op, rhs } => fold_binary(lhs, *op, rhs),
        ExprKind::UnaryOp { op, value } => fold_unary(*op, value),
        _ => None,
    };
    if let Some(kind) = folded {
        e.kind = ExprKind::ValueExpr(Value::new(kind, e.span.clone()));
        true
    } else {
        false
    }
}

fn fold_binary(lhs: &Value, op: ir3c_ir::BinOp, rhs: &Value) -> Option<ValueKind> {
    use ir3c_ir::BinOp::*;

    match op {
        Add if rhs.as_int() == Some(0) => return Some(lhs.kind.clone()),
        Add if lhs.as_int() == Some(0) => return Some(rhs.kind.clone()),
        Sub if rhs.as_int() == Some(0) => return Some(lhs.kind.clone()),
        Mul if rhs.as_int() == Some(0) || lhs.as_int() == Some(0) => return Some(ValueKind::ConstantInt(0)),
        Mul if rhs.as_int() == Some(1) => return Some(lhs.kind.clone()),
        Mul if lhs.as_int() == Some(1) => return Some(rhs.kind.clone()),
        Div if rhs.as_int() == Some(1) => return Some(lhs.kind.clone()),
        _ => {}
    }

    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
        return match op {
            Add => a.checked_add(b).map(ValueKind::ConstantInt),
            Sub => a.checked_sub(b).map(ValueKind::ConstantInt),
            Mul => a.checked_mul(b).map(ValueKind::ConstantInt),
            Div if b != 0 => a.checked_div(b).map(ValueKind::ConstantInt),
            Eq => Some(ValueKind::ConstantBool(a == b)),
            Ne => Some(ValueKind::ConstantBool(a != b)),
            Lt => Some(ValueKind::ConstantBool(a < b)),
            Gt => Some(ValueKind::ConstantBool(a > b)),
            Le => Some(ValueKind::ConstantBool(a <= b)),
            Ge => Some(ValueKind::ConstantBool(a >= b)),
            _ => None,
        };
    }
    if let (Some(a), Some(b)) = (lhs.as_bool(), rhs.as_bool()) {
        return match op {
            And => Some(ValueKind::ConstantBool(a && b)),
            Or => Some(ValueKind::ConstantBool(a || b)),
            Eq => Some(ValueKind::ConstantBool(a == b)),
            Ne => Some(ValueKind::ConstantBool(a != b)),
            _ => None,
        };
    }
    if op == Concat {
        if let (ValueKind::ConstantString(a), ValueKind::ConstantString(b)) = (&lhs.kind, &rhs.kind) {
            let mut s = a.clone();
            s.extend_from_slice(b);
            return Some(ValueKind::ConstantString(s));
        }
    }
    None
}

fn fold_unary(op: UnOp, v: &Value) -> Option<ValueKind> {
    match op {
        UnOp::Neg => v.as_int().and_then(|a| a.checked_neg()).map(ValueKind::ConstantInt),
        UnOp::Not => v.as_bool().map(|a| ValueKind::ConstantBool(!a)),
    }
}

/// Pass 9: strip `DummyStmt`s left behind by earlier passes, and drop any
/// statement following an unconditional `Branch` within the same block —
/// dead code pass 1 can't see because it operates on whole blocks. Like
/// pass 8, this is spec.md's own IR3-level redesign of work the reference
/// never needs, since its AST-level folding never produces dead IR3
/// statements to begin with.
pub fn remove_unreachable_statements(func: &mut FuncDefn) -> bool {
    let mut changed = false;
    for &block in &func.order.clone() {
        let b = func.block_mut(block);
        let before = b.stmts.len();
        if let Some(idx) = b.stmts.iter().position(|s| matches!(s.kind, StmtKind::Branch(_))) {
            b.stmts.truncate(idx + 1);
        }
        b.stmts.retain(|s| !s.is_dummy());
        if b.stmts.len() != before {
            changed = true;
        }
    }
    changed
}
