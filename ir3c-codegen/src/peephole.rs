//! Post-selection peephole optimization (spec.md §4.11), ported from
//! `cgopt.optimise` and its five rule functions.

use crate::instr::{Instr, Operand};

pub fn optimise(mut instrs: Vec<Instr>) -> Vec<Instr> {
    loop {
        let mut changed = false;
        instrs = remove_redundant_branches(instrs, &mut changed);
        instrs = remove_redundant_consecutive_loads_stores(instrs, &mut changed);
        instrs = remove_redundant_load_store(instrs, &mut changed);
        instrs = remove_redundant_arithmetic(instrs, &mut changed);
        instrs = optimise_conditional_branches(instrs, &mut changed);
        if !changed {
            return instrs;
        }
    }
}

fn branch_target(instr: &Instr) -> Option<&str> {
    if instr.mnemonic.starts_with('b') && instr.operands.len() == 1 {
        if let Operand::Label(l) = &instr.operands[0] {
            return Some(l);
        }
    }
    None
}

/// Drop a branch (conditional or not) whose target is the label
/// immediately following it — falling through already gets you there.
fn remove_redundant_branches(instrs: Vec<Instr>, changed: &mut bool) -> Vec<Instr> {
    let mut out = Vec::with_capacity(instrs.len());
    let mut i = 0;
    while i < instrs.len() {
        if let Some(target) = branch_target(&instrs[i]) {
            if let Some(next) = instrs.get(i + 1) {
                if next.is_label && next.label_name() == Some(target) {
                    *changed = true;
                    i += 1;
                    continue;
                }
            }
        }
        out.push(instrs[i].clone());
        i += 1;
    }
    out
}

fn same_operand(a: &Operand, b: &Operand) -> bool {
    a == b
}

/// Two consecutive `ldr`/`str` of the same register to/from the same
/// memory operand are redundant — neither has a side-effecting writeback,
/// so the second is a no-op repeat of the first.
fn remove_redundant_consecutive_loads_stores(instrs: Vec<Instr>, changed: &mut bool) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(instrs.len());
    for instr in instrs {
        let is_dup = out.last().is_some_and(|prev: &Instr| {
            (prev.mnemonic == "ldr" || prev.mnemonic == "str")
                && prev.mnemonic == instr.mnemonic
                && prev.operands.len() == 2
                && instr.operands.len() == 2
                && same_operand(&prev.operands[0], &instr.operands[0])
                && same_operand(&prev.operands[1], &instr.operands[1])
                && !has_writeback(&prev.operands[1])
        });
        if is_dup {
            *changed = true;
            continue;
        }
        out.push(instr);
    }
    out
}

fn has_writeback(op: &Operand) -> bool {
    matches!(op, Operand::Memory { writeback: true, .. })
}

/// `ldr r, [m]` immediately followed by `str r, [m]` writes back exactly
/// what it just read — drop the store. Also collapses a matched
/// caller-save/caller-restore `stmfd`/`ldmfd` pair around an empty body
/// into nothing, clearing writeback instead of fully deleting when the
/// pair isn't adjacent.
fn remove_redundant_load_store(instrs: Vec<Instr>, changed: &mut bool) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(instrs.len());
    let mut i = 0;
    while i < instrs.len() {
        if i + 1 < instrs.len() {
            let (a, b) = (&instrs[i], &instrs[i + 1]);
            if a.mnemonic == "ldr"
                && b.mnemonic == "str"
                && a.operands.len() == 2
                && b.operands.len() == 2
                && same_operand(&a.operands[0], &b.operands[0])
                && same_operand(&a.operands[1], &b.operands[1])
            {
                out.push(a.clone());
                *changed = true;
                i += 2;
                continue;
            }
            if a.mnemonic == "stmfd"
                && b.mnemonic == "ldmfd"
                && a.has_annotation("caller-save")
                && b.has_annotation("caller-restore")
                && a.operands == b.operands
            {
                *changed = true;
                i += 2;
                continue;
            }
        }
        out.push(instrs[i].clone());
        i += 1;
    }
    out
}

/// `mov r, r` and `add/sub r, r, #0` never change anything.
fn remove_redundant_arithmetic(instrs: Vec<Instr>, changed: &mut bool) -> Vec<Instr> {
    instrs
        .into_iter()
        .filter(|instr| {
            let redundant = match (instr.mnemonic.as_str(), instr.operands.as_slice()) {
                ("mov", [a, b]) => a == b,
                ("add" | "sub", [a, b, Operand::Constant(0)]) => a == b,
                _ => false,
            };
            if redundant {
                *changed = true;
            }
            !redundant
        })
        .collect()
}

/// Collapses the five-instruction window
/// `cmp a,b ; mov<cc> d,#1 ; mov<!cc> d,#0 ; cmp d,#0 ; b<cc2> L`
/// — which the selector emits for `if (a <relop> b) { ... }` after
/// materializing the relational result into a temporary — down to
/// `cmp a,b ; b<cc'> L`, folding the two comparisons into one condition
/// code (`cc'` is `cc` when `cc2` is `ne`, or the inverse when `cc2` is
/// `eq`).
fn optimise_conditional_branches(instrs: Vec<Instr>, changed: &mut bool) -> Vec<Instr> {
    let mut out: Vec<Instr> = Vec::with_capacity(instrs.len());
    let mut i = 0;
    while i < instrs.len() {
        if i + 4 < instrs.len() {
            if let Some(folded) = try_fold_window(&instrs[i..i + 5]) {
                out.push(instrs[i].clone());
                out.push(folded);
                *changed = true;
                i += 5;
                continue;
            }
        }
        out.push(instrs[i].clone());
        i += 1;
    }
    out
}

fn try_fold_window(window: &[Instr]) -> Option<Instr> {
    let [cmp1, mov_true, mov_false, cmp2, branch] = window else { return None };
    if cmp1.mnemonic != "cmp" || cmp2.mnemonic != "cmp" || branch.mnemonic.len() < 2 || !branch.mnemonic.starts_with('b') {
        return None;
    }
    let cc = mov_true.mnemonic.strip_prefix("mov")?;
    let inv_cc = mov_false.mnemonic.strip_prefix("mov")?;
    if cc.is_empty() || inv_cc.is_empty() || !are_inverse(cc, inv_cc) {
        return None;
    }
    let dest = match mov_true.operands.as_slice() {
        [Operand::Register(r), Operand::Constant(1)] => r.clone(),
        _ => return None,
    };
    match mov_false.operands.as_slice() {
        [Operand::Register(r), Operand::Constant(0)] if *r == dest => {}
        _ => return None,
    }
    match cmp2.operands.as_slice() {
        [Operand::Register(r), Operand::Constant(0)] if *r == dest => {}
        _ => return None,
    }
    let branch_cc = branch.mnemonic.strip_prefix('b')?;
    let target = match &branch.operands[..] {
        [Operand::Label(l)] => l.clone(),
        _ => return None,
    };
    let folded_cc = match branch_cc {
        "ne" => cc.to_string(),
        "eq" => inv_cc.to_string(),
        _ => return None,
    };
    Some(Instr::new(format!("b{folded_cc}"), vec![Operand::Label(target)]))
}

fn are_inverse(cc: &str, other: &str) -> bool {
    matches!(
        (cc, other),
        ("eq", "ne") | ("ne", "eq") | ("lt", "ge") | ("ge", "lt") | ("gt", "le") | ("le", "gt")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr;

    #[test]
    fn drops_a_branch_to_the_very_next_label() {
        let instrs = vec![instr::branch(".L1"), Instr::label(".L1")];
        let out = optimise(instrs);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_label);
    }

    #[test]
    fn collapses_the_five_instruction_relop_branch_window() {
        let instrs = vec![
            instr::cmp(Operand::reg("a1"), Operand::reg("a2")),
            instr::mov_cc("lt", Operand::reg("v1"), Operand::Constant(1)),
            instr::mov_cc("ge", Operand::reg("v1"), Operand::Constant(0)),
            instr::cmp(Operand::reg("v1"), Operand::Constant(0)),
            instr::branch_cond("ne", ".L_then"),
        ];
        let out = optimise(instrs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].mnemonic, "blt");
    }

    #[test]
    fn drops_a_store_that_immediately_rewrites_what_was_just_loaded() {
        let instrs = vec![
            instr::load(Operand::reg("v1"), Operand::mem("sp", 4)),
            instr::store(Operand::reg("v1"), Operand::mem("sp", 4)),
        ];
        let out = optimise(instrs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mnemonic, "ldr");
    }

    #[test]
    fn drops_a_mov_to_self() {
        let instrs = vec![instr::mov(Operand::reg("a1"), Operand::reg("a1"))];
        assert!(optimise(instrs).is_empty());
    }
}
