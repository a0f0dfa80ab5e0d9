pub mod cache;
pub mod evaluator;
pub mod feasibility;
pub mod monte_carlo;
pub mod scoring;
pub mod service;
pub mod simulation;
pub mod stochastic;
pub mod worker_pool;

#[cfg(test)]
mod tests;

pub use cache::{CacheStats, EvaluationCache};
pub use evaluator::{evaluate_sequence, EvaluationContext};
pub use feasibility::check_feasibility;
pub use monte_carlo::{run_monte_carlo, MonteCarloResult};
pub use scoring::{diversification_score, final_score, transaction_cost};
pub use service::{
    BatchEvaluationResponse, BatchSimulationResponse, EvaluationService, SimulationResult,
};
pub use simulation::{simulate, SimulationOutcome};
pub use stochastic::{default_scenarios, run_stochastic, Scenario, StochasticResult};
pub use worker_pool::{CancellationToken, WorkerPool};
