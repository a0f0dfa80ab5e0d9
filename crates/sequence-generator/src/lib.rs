pub mod expanders;
pub mod pattern;
pub mod patterns;
pub mod registry;
pub mod service;

#[cfg(test)]
mod test_support;

pub use expanders::{
    default_expanders, CombinatorialExpander, ConstraintRelaxationExpander,
    PartialExecutionExpander, SequenceExpander,
};
pub use pattern::PatternGenerator;
pub use patterns::default_patterns;
pub use registry::NamedRegistry;
pub use service::SequenceService;
