use tracing::debug;
use vigil_hir::body::Body;
use vigil_types::Diagnostic;

use crate::cfg::ControlFlowGraph;
use crate::conditions::{self, Finding};
use crate::diagnostics::{self, FlowConfig};
use crate::driver;
use crate::error::FlowError;
use crate::lower;

/// How far the analysis of one body got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The exploration drained its worklist; findings are trustworthy.
    Converged,
    /// The step budget ran out. Findings cover only the stable blocks.
    Abandoned,
    /// The body contains control flow outside the modelled subset and was
    /// skipped entirely.
    Opaque,
}

#[derive(Debug)]
pub struct FlowAnalysisResult {
    /// The lowered graph, absent for opaque bodies.
    pub cfg: Option<ControlFlowGraph>,
    pub outcome: AnalysisOutcome,
    /// Constant guards, in source order.
    pub findings: Vec<Finding>,
    /// One diagnostic per finding, ready for the host.
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyzes one method body for conditions that always evaluate to the same
/// constant.
///
/// Errors only on a body that violates the front-end contract; every
/// in-language pattern the engine cannot handle degrades to an
/// [`AnalysisOutcome`] with zero or partial findings instead.
pub fn analyze(body: &Body, config: FlowConfig) -> Result<FlowAnalysisResult, FlowError> {
    body.validate()?;

    if lower::contains_opaque(body) {
        debug!("body contains unmodelled control flow, skipping analysis");
        return Ok(FlowAnalysisResult {
            cfg: None,
            outcome: AnalysisOutcome::Opaque,
            findings: Vec::new(),
            diagnostics: Vec::new(),
        });
    }

    let cfg = lower::lower(body);
    let exploration = driver::explore(body, &cfg, &config);
    let findings = conditions::findings(body, &cfg, &exploration);
    let diagnostics = findings.iter().map(diagnostics::diagnostic).collect();
    let outcome = if exploration.abandoned {
        AnalysisOutcome::Abandoned
    } else {
        AnalysisOutcome::Converged
    };

    Ok(FlowAnalysisResult {
        cfg: Some(cfg),
        outcome,
        findings,
        diagnostics,
    })
}
