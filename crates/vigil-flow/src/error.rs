use thiserror::Error;
use vigil_hir::body::BodyError;

/// Faults that break the contract between the front end and the analysis.
///
/// Anything the analysis can recover from (unmodelled constructs, budget
/// exhaustion) is an [`AnalysisOutcome`](crate::AnalysisOutcome), not an
/// error.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The body referenced locals, statements, or expressions outside its
    /// own arenas.
    #[error("invalid body handed to analysis: {0}")]
    InvalidBody(#[from] BodyError),
}
