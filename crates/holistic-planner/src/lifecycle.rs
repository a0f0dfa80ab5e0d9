use std::fmt;

use planning_core::PlanningError;
use serde::{Deserialize, Serialize};

/// Where a sequence is in the planning pipeline. Stages only move forward,
/// one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStage {
    Generated,
    Evaluated,
    Selected,
    ConstraintAdjusted,
    Finalized,
}

impl SequenceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStage::Generated => "generated",
            SequenceStage::Evaluated => "evaluated",
            SequenceStage::Selected => "selected",
            SequenceStage::ConstraintAdjusted => "constraint_adjusted",
            SequenceStage::Finalized => "finalized",
        }
    }

    pub fn next(&self) -> Option<SequenceStage> {
        match self {
            SequenceStage::Generated => Some(SequenceStage::Evaluated),
            SequenceStage::Evaluated => Some(SequenceStage::Selected),
            SequenceStage::Selected => Some(SequenceStage::ConstraintAdjusted),
            SequenceStage::ConstraintAdjusted => Some(SequenceStage::Finalized),
            SequenceStage::Finalized => None,
        }
    }

    pub fn advance(self, to: SequenceStage) -> Result<SequenceStage, PlanningError> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(PlanningError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == SequenceStage::Finalized
    }
}

impl fmt::Display for SequenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
