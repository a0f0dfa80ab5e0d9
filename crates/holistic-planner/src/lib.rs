pub mod constraints;
pub mod lifecycle;
pub mod planner;


pub use constraints::{ConstraintEnforcer, EnforcedSequence};
pub use lifecycle::SequenceStage;
pub use planner::{rank_feasible, select_best, HolisticPlanner, MAX_REJECTED_ENTRIES};
