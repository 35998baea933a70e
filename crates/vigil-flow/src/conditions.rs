//! Turns converged guard summaries into findings.

use vigil_hir::body::{Body, ExprKind};
use vigil_types::Span;

use crate::cfg::{ControlFlowGraph, Terminator};
use crate::driver::Exploration;
use crate::eval;
use crate::lattice::Value;

/// A guard that evaluates to the same constant on every explored path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    /// Span of the condition expression itself, not the whole statement.
    pub span: Span,
    /// The constant the condition always evaluates to.
    pub value: bool,
}

/// Re-evaluates every summarized guard against its converged summary and
/// collects the ones that come out constant, in source order.
pub fn findings(body: &Body, cfg: &ControlFlowGraph, exploration: &Exploration) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (idx, bb) in cfg.blocks.iter().enumerate() {
        // A capped block dropped at least one incoming state, so its summary
        // does not cover every path that reaches it.
        if exploration.tainted[idx] || exploration.capped[idx] {
            continue;
        }
        let condition = match bb.terminator {
            Terminator::Branch { condition, .. } => condition,
            _ => continue,
        };
        // A guard written as a literal is a deliberate idiom, never a bug.
        if matches!(body.expr(condition).kind, ExprKind::Bool(_)) {
            continue;
        }
        let summary = match &exploration.guard_summaries[idx] {
            Some(summary) => summary,
            None => continue,
        };
        if let Value::Bool(value) = eval::eval(body, summary, condition) {
            findings.push(Finding { span: body.expr(condition).span, value });
        }
    }
    findings.sort_by_key(|finding| (finding.span.start, finding.span.end));
    findings
}
