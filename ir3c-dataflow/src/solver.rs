//! The generic worklist solver of spec.md §4.2: one implementation
//! parameterized by direction and combine operator, with `gen`/`kill`
//! supplied per call site. Every specialization in this crate (liveness,
//! reaching expressions/copies/constants) is a thin wrapper around this.

use crate::cfg::StmtGraph;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combine {
    Union,
    Intersection,
}

pub struct Solution<T> {
    pub ins: Vec<HashSet<T>>,
    pub outs: Vec<HashSet<T>>,
}

fn combine_sets<T: Eq + Hash + Clone>(sets: &[&HashSet<T>], combine: Combine) -> HashSet<T> {
    match sets.split_first() {
        None => HashSet::new(),
        Some((first, rest)) => {
            let mut acc = (*first).clone();
            for s in rest {
                match combine {
                    Combine::Union => acc.extend(s.iter().cloned()),
                    Combine::Intersection => acc.retain(|x| s.contains(x)),
                }
            }
            acc
        }
    }
}

/// Run the worklist to a fixed point. `gen`/`kill` are total functions of
/// statement index; `direction` picks which of `preds`/`succs` feeds a
/// node's "incoming" set. Boundary nodes (no predecessors in the direction
/// of flow) start from the empty set regardless of `combine`, matching
/// spec.md §4.2's "initial in/out sets empty".
pub fn solve<T, G, K>(graph: &StmtGraph, direction: Direction, combine: Combine, gen: G, kill: K) -> Solution<T>
where
    T: Eq + Hash + Clone,
    G: Fn(usize) -> HashSet<T>,
    K: Fn(usize) -> HashSet<T>,
{
    let n = graph.len();
    let mut ins: Vec<HashSet<T>> = (0..n).map(|_| HashSet::new()).collect();
    let mut outs: Vec<HashSet<T>> = (0..n).map(|_| HashSet::new()).collect();
    let gens: Vec<HashSet<T>> = (0..n).map(&gen).collect();
    let kills: Vec<HashSet<T>> = (0..n).map(&kill).collect();

    let (incoming, outgoing): (&Vec<Vec<usize>>, &Vec<Vec<usize>>) = match direction {
        Direction::Forward => (&graph.preds, &graph.succs),
        Direction::Backward => (&graph.succs, &graph.preds),
    };

    let mut queue: VecDeque<usize> = (0..n).collect();
    let mut queued = vec![true; n];

    while let Some(node) = queue.pop_front() {
        queued[node] = false;

        let incoming_sets: Vec<&HashSet<T>> = match direction {
            Direction::Forward => incoming[node].iter().map(|&p| &outs[p]).collect(),
            Direction::Backward => incoming[node].iter().map(|&p| &ins[p]).collect(),
        };
        let merged = combine_sets(&incoming_sets, combine);

        let (new_in, new_out) = match direction {
            Direction::Forward => {
                let new_in = merged;
                let mut new_out = gens[node].clone();
                new_out.extend(new_in.iter().filter(|x| !kills[node].contains(*x)).cloned());
                (new_in, new_out)
            }
            Direction::Backward => {
                let new_out = merged;
                let mut new_in = gens[node].clone();
                new_in.extend(new_out.iter().filter(|x| !kills[node].contains(*x)).cloned());
                (new_in, new_out)
            }
        };

        let changed = new_in != ins[node] || new_out != outs[node];
        ins[node] = new_in;
        outs[node] = new_out;

        if changed {
            for &next in &outgoing[node] {
                if !queued[next] {
                    queued[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }

    Solution { ins, outs }
}
