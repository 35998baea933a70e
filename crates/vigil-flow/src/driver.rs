//! Fixpoint exploration of one body's control flow graph.
//!
//! The driver walks `(block, entry environment)` states rather than joining
//! at block entry: each distinct arriving environment is processed on its
//! own, and convergence comes from dropping exact duplicates. States pop
//! lowest block index first, insertion order breaking ties, so work queued
//! through outer blocks drains before the churn a back-edge feeds into an
//! inner loop. The per-block visit limit rides on top and drops late
//! arrivals wholesale, which bounds loop work at a documented precision
//! cost.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use tracing::debug;
use vigil_hir::body::Body;

use crate::cfg::{BlockId, ControlFlowGraph, Terminator};
use crate::diagnostics::FlowConfig;
use crate::eval;
use crate::lattice::{Env, Value};

/// What exploration leaves behind for the reporter.
pub struct Exploration {
    /// Per block: the join of the environments observed at the branch point,
    /// for blocks that end in a branch and processed at least one state.
    pub guard_summaries: Vec<Option<Env>>,
    /// Blocks that dropped a distinct arriving state at the visit limit.
    /// Their own summaries are incomplete, so they never yield findings;
    /// the states they failed to propagate onward are what makes summaries
    /// *downstream* of a loop conservative.
    pub capped: Vec<bool>,
    /// Blocks whose pending states were thrown away when the step budget ran
    /// out. No findings are produced for them.
    pub tainted: Vec<bool>,
    /// True when the step budget ran out before the queue drained.
    pub abandoned: bool,
}

struct Pending {
    block: BlockId,
    seq: u64,
    env: Env,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.block
            .index()
            .cmp(&other.block.index())
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

pub fn explore(body: &Body, cfg: &ControlFlowGraph, config: &FlowConfig) -> Exploration {
    let blocks = cfg.blocks.len();
    let mut queue: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
    let mut seen: Vec<HashSet<Env>> = vec![HashSet::new(); blocks];
    let mut visits: Vec<u32> = vec![0; blocks];
    let mut guard_summaries: Vec<Option<Env>> = vec![None; blocks];
    let mut capped = vec![false; blocks];
    let mut tainted = vec![false; blocks];
    let mut abandoned = false;

    let budget = config.step_budget(blocks);
    let mut steps = 0usize;
    let mut seq = 0u64;

    push(&mut queue, &mut seq, cfg.entry, Env::unknown(body.locals().len()));

    while let Some(Reverse(Pending { block, env, .. })) = queue.pop() {
        let idx = block.index();
        if steps >= budget {
            // Everything still queued is unexplored work; its destinations
            // cannot claim a converged summary.
            abandoned = true;
            tainted[idx] = true;
            for Reverse(pending) in queue.drain() {
                tainted[pending.block.index()] = true;
            }
            debug!(block = idx, steps, "step budget exhausted, abandoning body");
            break;
        }
        steps += 1;
        if !seen[idx].insert(env.clone()) {
            continue;
        }
        if visits[idx] >= config.max_block_visits {
            capped[idx] = true;
            continue;
        }
        visits[idx] += 1;

        let mut env = env;
        let bb = cfg.block(block);
        for &stmt in &bb.stmts {
            eval::transfer_stmt(body, &mut env, stmt);
        }
        match &bb.terminator {
            Terminator::Goto { target, .. } => push(&mut queue, &mut seq, *target, env),
            Terminator::Branch { condition, true_target, false_target, .. } => {
                eval::apply_expr_effects(body, &mut env, *condition);
                // The state joins the guard summary exactly where the guard
                // executes; the reporter re-evaluates against this join.
                guard_summaries[idx] = Some(match guard_summaries[idx].take() {
                    Some(summary) => summary.join(&env),
                    None => env.clone(),
                });
                match eval::eval(body, &env, *condition) {
                    Value::Bool(constant) => {
                        let target = if constant { *true_target } else { *false_target };
                        eval::refine(body, &mut env, *condition, constant);
                        push(&mut queue, &mut seq, target, env);
                    }
                    _ => {
                        let mut on_true = env.clone();
                        eval::refine(body, &mut on_true, *condition, true);
                        push(&mut queue, &mut seq, *true_target, on_true);
                        eval::refine(body, &mut env, *condition, false);
                        push(&mut queue, &mut seq, *false_target, env);
                    }
                }
            }
            Terminator::Iterate { element, iterable, body_target, exit_target, .. } => {
                eval::apply_expr_effects(body, &mut env, *iterable);
                push(&mut queue, &mut seq, *exit_target, env.clone());
                // Each entry into the loop body sees a fresh element.
                env.assign(*element, Value::Unknown);
                push(&mut queue, &mut seq, *body_target, env);
            }
            Terminator::Switch { scrutinee, arms, fallthrough, .. } => {
                eval::apply_expr_effects(body, &mut env, *scrutinee);
                for &arm in arms {
                    push(&mut queue, &mut seq, arm, env.clone());
                }
                if let Some(after) = fallthrough {
                    push(&mut queue, &mut seq, *after, env.clone());
                }
            }
            Terminator::Return { value, .. } | Terminator::Throw { value, .. } => {
                if let Some(value) = value {
                    eval::apply_expr_effects(body, &mut env, *value);
                }
            }
            Terminator::Exit => {}
        }
    }

    Exploration { guard_summaries, capped, tainted, abandoned }
}

fn push(queue: &mut BinaryHeap<Reverse<Pending>>, seq: &mut u64, block: BlockId, env: Env) {
    queue.push(Reverse(Pending { block, seq: *seq, env }));
    *seq += 1;
}
