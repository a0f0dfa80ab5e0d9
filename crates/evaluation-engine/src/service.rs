use planning_core::{
    ActionSequence, PlanningError, PortfolioContext, SequenceEvaluationResult,
    MAX_BATCH_SEQUENCES,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::EvaluationCache;
use crate::evaluator::{evaluate_sequence, infeasible, EvaluationContext};
use crate::feasibility::check_feasibility;
use crate::monte_carlo::{run_monte_carlo, MonteCarloResult};
use crate::simulation::simulate;
use crate::stochastic::{default_scenarios, run_stochastic, Scenario, StochasticResult};
use crate::worker_pool::{CancellationToken, WorkerPool};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvaluationResponse {
    /// Aligned with the input: `results[i]` belongs to `sequences[i]`.
    pub results: Vec<SequenceEvaluationResult>,
    pub errors: Vec<String>,
}

/// End state of a sequence without any scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub sequence_hash: String,
    pub feasible: bool,
    pub end_cash: f64,
    pub end_portfolio: PortfolioContext,
    pub transaction_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSimulationResponse {
    pub results: Vec<SimulationResult>,
    pub errors: Vec<String>,
}

/// Request-level entry point into the evaluation engine.
pub struct EvaluationService {
    pool: WorkerPool,
}

impl EvaluationService {
    pub fn new(workers: usize) -> Result<Self, PlanningError> {
        Ok(Self {
            pool: WorkerPool::new(workers)?,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    fn validate_batch(
        ctx: &EvaluationContext,
        sequences: &[ActionSequence],
    ) -> Result<(), PlanningError> {
        if sequences.is_empty() {
            return Err(PlanningError::EmptyBatch);
        }
        if sequences.len() > MAX_BATCH_SEQUENCES {
            return Err(PlanningError::BatchTooLarge {
                size: sequences.len(),
                max: MAX_BATCH_SEQUENCES,
            });
        }
        Self::validate_context(ctx)
    }

    fn validate_context(ctx: &EvaluationContext) -> Result<(), PlanningError> {
        ctx.costs.validate()?;
        if !(ctx.cost_penalty_factor >= 0.0) {
            return Err(PlanningError::InvalidConfig(format!(
                "cost_penalty_factor must be non-negative, got {}",
                ctx.cost_penalty_factor
            )));
        }
        Ok(())
    }

    /// Evaluate every sequence on the worker pool.
    pub fn batch_evaluate(
        &self,
        ctx: &EvaluationContext,
        sequences: &[ActionSequence],
        cancel: &CancellationToken,
    ) -> Result<BatchEvaluationResponse, PlanningError> {
        Self::validate_batch(ctx, sequences)?;

        let outcomes = self
            .pool
            .run(sequences, cancel, |seq| evaluate_sequence(seq, ctx, None))?;

        let mut errors = Vec::new();
        let results = sequences
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(i, (seq, outcome))| match outcome {
                Ok(result) => result,
                Err(message) => {
                    warn!(index = i, sequence_hash = %seq.sequence_hash, error = %message, "Sequence evaluation panicked");
                    errors.push(format!("sequence {} ({}): {}", i, seq.sequence_hash, message));
                    infeasible(seq, ctx, format!("evaluation failed: {}", message))
                }
            })
            .collect::<Vec<_>>();

        let feasible = results.iter().filter(|r| r.feasible).count();
        debug!(
            sequences = sequences.len(),
            feasible,
            errors = errors.len(),
            "Batch evaluation complete"
        );
        Ok(BatchEvaluationResponse { results, errors })
    }

    /// Like [`batch_evaluate`](Self::batch_evaluate) but serves repeated
    /// sequences from `cache`. Entries are keyed by
    /// [`EvaluationContext::cache_key`], so a change of portfolio, costs,
    /// penalty or scoring tables never hits a stale result.
    pub fn batch_evaluate_cached(
        &self,
        cache: &EvaluationCache,
        ctx: &EvaluationContext,
        sequences: &[ActionSequence],
        cancel: &CancellationToken,
    ) -> Result<BatchEvaluationResponse, PlanningError> {
        Self::validate_batch(ctx, sequences)?;
        let key = ctx.cache_key();

        // a hit may come from an equal sequence produced by another pattern
        let mut slots: Vec<Option<SequenceEvaluationResult>> = sequences
            .iter()
            .map(|seq| {
                cache.get(&key, &seq.sequence_hash).map(|mut hit| {
                    hit.sequence = seq.clone();
                    hit
                })
            })
            .collect();
        let missing: Vec<ActionSequence> = sequences
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(seq, _)| seq.clone())
            .collect();

        let mut errors = Vec::new();
        if !missing.is_empty() {
            let fresh = self.batch_evaluate(ctx, &missing, cancel)?;
            errors = fresh.errors;
            let mut fresh = fresh.results.into_iter();
            for slot in slots.iter_mut().filter(|s| s.is_none()) {
                if let Some(result) = fresh.next() {
                    cache.insert(&key, result.clone());
                    *slot = Some(result);
                }
            }
        }

        let results = slots
            .into_iter()
            .zip(sequences)
            .map(|(slot, seq)| {
                slot.unwrap_or_else(|| infeasible(seq, ctx, "evaluation missing".to_string()))
            })
            .collect();
        Ok(BatchEvaluationResponse { results, errors })
    }

    /// Simulate every sequence without the cost-penalty scoring step.
    pub fn batch_simulate(
        &self,
        ctx: &EvaluationContext,
        sequences: &[ActionSequence],
        cancel: &CancellationToken,
    ) -> Result<BatchSimulationResponse, PlanningError> {
        Self::validate_batch(ctx, sequences)?;

        let outcomes = self.pool.run(sequences, cancel, |seq| {
            let feasible = check_feasibility(seq, &ctx.opportunity, &ctx.costs).is_ok();
            let outcome = simulate(seq, &ctx.start, ctx.start_cash(), &ctx.costs, None);
            SimulationResult {
                sequence_hash: seq.sequence_hash.clone(),
                feasible,
                end_cash: outcome.end_cash,
                end_portfolio: outcome.end_portfolio,
                transaction_cost: outcome.transaction_cost,
            }
        })?;

        let mut errors = Vec::new();
        let results = sequences
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(i, (seq, outcome))| {
                outcome.unwrap_or_else(|message| {
                    errors.push(format!("sequence {} ({}): {}", i, seq.sequence_hash, message));
                    SimulationResult {
                        sequence_hash: seq.sequence_hash.clone(),
                        feasible: false,
                        end_cash: ctx.start_cash(),
                        end_portfolio: ctx.start.clone(),
                        transaction_cost: 0.0,
                    }
                })
            })
            .collect();
        Ok(BatchSimulationResponse { results, errors })
    }

    pub fn evaluate_monte_carlo(
        &self,
        ctx: &EvaluationContext,
        sequence: &ActionSequence,
        paths: usize,
        seed: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<MonteCarloResult, PlanningError> {
        Self::validate_context(ctx)?;
        run_monte_carlo(sequence, ctx, paths, seed, &self.pool, cancel)
    }

    /// Weighted-scenario evaluation; `None` uses the default five scenarios.
    pub fn evaluate_stochastic(
        &self,
        ctx: &EvaluationContext,
        sequence: &ActionSequence,
        scenarios: Option<&[Scenario]>,
        cancel: &CancellationToken,
    ) -> Result<StochasticResult, PlanningError> {
        Self::validate_context(ctx)?;
        match scenarios {
            Some(scenarios) => run_stochastic(sequence, ctx, scenarios, &self.pool, cancel),
            None => run_stochastic(sequence, ctx, &default_scenarios(), &self.pool, cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{action, context_with, eval_context};
    use planning_core::{TradeSide, TransactionCostModel};

    #[test]
    fn test_empty_batch_rejected() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(100.0, &[]), 0.1);
        let err = service
            .batch_evaluate(&ctx, &[], &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, PlanningError::EmptyBatch));
    }

    #[test]
    fn test_negative_costs_rejected() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(100.0, &[]), 0.1)
            .with_costs(TransactionCostModel::new(-1.0, 0.0));
        let seq = ActionSequence::new(vec![action("AAA", TradeSide::Buy, 1, 10.0)], "t");
        let err = service
            .batch_evaluate(&ctx, &[seq], &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, PlanningError::NegativeCost(_)));
    }

    #[test]
    fn test_simulation_skips_penalty() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(1000.0, &[("AAA", 5.0, 100.0)]), 0.5);
        let seq = ActionSequence::new(vec![action("AAA", TradeSide::Sell, 2, 100.0)], "t");
        let response = service
            .batch_simulate(&ctx, &[seq], &CancellationToken::new())
            .unwrap();
        assert_eq!(response.results.len(), 1);
        let result = &response.results[0];
        assert!(result.feasible);
        assert!(result.end_cash > 1000.0);
        assert!(response.errors.is_empty());
    }

    #[test]
    fn test_cached_batch_reuses_results() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(1000.0, &[("AAA", 5.0, 100.0)]), 0.1);
        let seqs = vec![
            ActionSequence::new(vec![action("BBB", TradeSide::Buy, 1, 50.0)], "a"),
            ActionSequence::new(vec![action("CCC", TradeSide::Buy, 1, 50.0)], "b"),
        ];
        let cache = EvaluationCache::default();
        let token = CancellationToken::new();

        let first = service
            .batch_evaluate_cached(&cache, &ctx, &seqs, &token)
            .unwrap();
        let second = service
            .batch_evaluate_cached(&cache, &ctx, &seqs, &token)
            .unwrap();

        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().misses, 2);
        for (a, b) in first.results.iter().zip(&second.results) {
            assert_eq!(a.sequence.sequence_hash, b.sequence.sequence_hash);
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_cache_separates_cost_configurations() {
        let service = EvaluationService::new(2).unwrap();
        let opportunity = context_with(1000.0, &[("AAA", 5.0, 100.0)]);
        let cheap =
            eval_context(opportunity.clone(), 0.0).with_costs(TransactionCostModel::zero());
        let costly =
            eval_context(opportunity, 1.0).with_costs(TransactionCostModel::new(400.0, 0.0));
        let seqs = vec![ActionSequence::new(vec![action("BBB", TradeSide::Buy, 1, 50.0)], "t")];
        let cache = EvaluationCache::default();
        let token = CancellationToken::new();

        let first = service
            .batch_evaluate_cached(&cache, &cheap, &seqs, &token)
            .unwrap();
        let second = service
            .batch_evaluate_cached(&cache, &costly, &seqs, &token)
            .unwrap();
        let direct = service.batch_evaluate(&costly, &seqs, &token).unwrap();

        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.len(), 2);
        assert!(second.results[0].score < first.results[0].score);
        assert_eq!(second.results[0].score, direct.results[0].score);
        assert_eq!(second.results[0].transaction_cost, 400.0);
    }

    #[test]
    fn test_cache_hit_reports_requested_sequence() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(1000.0, &[]), 0.1);
        let buy = action("BBB", TradeSide::Buy, 1, 50.0);
        let cache = EvaluationCache::default();
        let token = CancellationToken::new();

        service
            .batch_evaluate_cached(
                &cache,
                &ctx,
                &[ActionSequence::new(vec![buy.clone()], "direct_buy")],
                &token,
            )
            .unwrap();
        let response = service
            .batch_evaluate_cached(
                &cache,
                &ctx,
                &[ActionSequence::new(vec![buy], "single_best")],
                &token,
            )
            .unwrap();

        assert_eq!(cache.stats().hits, 1);
        assert_eq!(response.results[0].sequence.pattern_type, "single_best");
    }

    #[test]
    fn test_negative_penalty_rejected_for_single_sequence_modes() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(1000.0, &[]), -0.5);
        let seq = ActionSequence::new(vec![action("BBB", TradeSide::Buy, 1, 50.0)], "t");
        let token = CancellationToken::new();

        let err = service
            .evaluate_monte_carlo(&ctx, &seq, 10, Some(1), &token)
            .unwrap_err();
        assert!(matches!(err, PlanningError::InvalidConfig(_)));
        let err = service
            .evaluate_stochastic(&ctx, &seq, None, &token)
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_stochastic_defaults() {
        let service = EvaluationService::new(2).unwrap();
        let ctx = eval_context(context_with(1000.0, &[("AAA", 5.0, 100.0)]), 0.1);
        let seq = ActionSequence::new(vec![action("BBB", TradeSide::Buy, 1, 50.0)], "t");
        let result = service
            .evaluate_stochastic(&ctx, &seq, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.scenarios_evaluated, 5);
    }
}
