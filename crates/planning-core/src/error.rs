use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No sequences provided")]
    EmptyBatch,

    #[error("Too many sequences: {size} (max {max})")]
    BatchTooLarge { size: usize, max: usize },

    #[error("{0} must be non-negative")]
    NegativeCost(&'static str),

    #[error("Path count {0} out of range (1-1000)")]
    InvalidPathCount(usize),

    #[error("Invalid scenarios: {0}")]
    InvalidScenarios(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Calculator {name} failed: {message}")]
    Calculator { name: String, message: String },

    #[error("Pattern {name} failed: {message}")]
    Pattern { name: String, message: String },

    #[error("Expander {name} failed: {message}")]
    Expander { name: String, message: String },

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Invalid sequence transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlanningError {
    /// True for errors that reject a request before any work is done.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlanningError::InvalidContext(_)
                | PlanningError::InvalidConfig(_)
                | PlanningError::EmptyBatch
                | PlanningError::BatchTooLarge { .. }
                | PlanningError::NegativeCost(_)
                | PlanningError::InvalidPathCount(_)
                | PlanningError::InvalidScenarios(_)
                | PlanningError::UnknownModule(_)
        )
    }
}
