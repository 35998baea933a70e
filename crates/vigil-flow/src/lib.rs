//! Flow-sensitive detection of conditions that always evaluate to the same
//! constant.
//!
//! One call to [`analyze`] takes a lowered method body, builds its control
//! flow graph, explores it with a finite value lattice, and reports every
//! `if`/`while`/`for` guard that is provably always true or always false on
//! the explored paths. Each body is analyzed in isolation; nothing is
//! assumed about fields, other methods, or the heap.

mod cfg;
mod conditions;
mod diagnostics;
mod driver;
mod error;
mod eval;
mod flow;
mod lattice;
mod lower;

pub use crate::cfg::{BasicBlock, BlockId, ControlFlowGraph, Successors, Terminator};
pub use crate::conditions::Finding;
pub use crate::diagnostics::FlowConfig;
pub use crate::error::FlowError;
pub use crate::flow::{analyze, AnalysisOutcome, FlowAnalysisResult};
