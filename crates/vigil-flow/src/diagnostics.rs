use serde::{Deserialize, Serialize};
use vigil_types::Diagnostic;

use crate::conditions::Finding;

/// Tuning knobs for the fixpoint driver.
///
/// Every field has a default so hosts can deserialize a partial table and
/// still get a working configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// How many entry states one block may process before further arrivals
    /// are silently dropped. Raising it trades speed for loop precision.
    pub max_block_visits: u32,
    /// Per-block factor of the global step budget. The driver abandons a
    /// body once it has popped `max_steps_per_block * block count` states.
    pub max_steps_per_block: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_block_visits: 2,
            max_steps_per_block: 16,
        }
    }
}

impl FlowConfig {
    pub(crate) fn step_budget(&self, blocks: usize) -> usize {
        self.max_steps_per_block.saturating_mul(blocks.max(1))
    }
}

pub(crate) fn diagnostic(finding: &Finding) -> Diagnostic {
    let message = if finding.value {
        "Change this condition so that it does not always evaluate to \"true\"."
    } else {
        "Change this condition so that it does not always evaluate to \"false\"."
    };
    Diagnostic::warning("FLOW_CONST_COND", message, Some(finding.span))
}
