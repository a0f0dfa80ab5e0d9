pub mod config;
pub mod context;
pub mod error;
pub mod params;
pub mod plan;
pub mod portfolio;
pub mod sequence;
pub mod types;

pub use config::*;
pub use context::*;
pub use error::*;
pub use params::*;
pub use plan::*;
pub use portfolio::*;
pub use sequence::*;
pub use types::*;

/// Hard upper bound on sequences accepted by a single batch call.
pub const MAX_BATCH_SEQUENCES: usize = 10_000;

/// Bounds on Monte Carlo path counts.
pub const MIN_MONTE_CARLO_PATHS: usize = 1;
pub const MAX_MONTE_CARLO_PATHS: usize = 1_000;
