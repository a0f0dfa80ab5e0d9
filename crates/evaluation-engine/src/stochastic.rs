use std::collections::HashMap;

use planning_core::{ActionSequence, PlanningError};
use serde::{Deserialize, Serialize};

use crate::evaluator::{evaluate_sequence, EvaluationContext};
use crate::worker_pool::{CancellationToken, WorkerPool};

/// A named market scenario: every price moves by `price_shift`
/// (e.g. -0.05 for a 5% drop) and the outcome counts with `weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub price_shift: f64,
    pub weight: f64,
}

impl Scenario {
    pub fn new(name: &str, price_shift: f64, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            price_shift,
            weight,
        }
    }
}

pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("down_10", -0.10, 0.1),
        Scenario::new("down_5", -0.05, 0.2),
        Scenario::new("base", 0.0, 0.4),
        Scenario::new("up_5", 0.05, 0.2),
        Scenario::new("up_10", 0.10, 0.1),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticResult {
    pub sequence_hash: String,
    pub weighted_score: f64,
    pub scenarios_evaluated: usize,
    pub scenario_scores: Vec<(String, f64)>,
}

fn validate(scenarios: &[Scenario]) -> Result<(), PlanningError> {
    if scenarios.is_empty() {
        return Err(PlanningError::InvalidScenarios("no scenarios provided".to_string()));
    }
    if let Some(bad) = scenarios
        .iter()
        .find(|s| !(s.weight >= 0.0) || !s.price_shift.is_finite() || s.price_shift <= -1.0)
    {
        return Err(PlanningError::InvalidScenarios(format!(
            "scenario {} has invalid weight or shift",
            bad.name
        )));
    }
    if scenarios.iter().map(|s| s.weight).sum::<f64>() <= 0.0 {
        return Err(PlanningError::InvalidScenarios(
            "scenario weights must sum to a positive value".to_string(),
        ));
    }
    Ok(())
}

/// Weighted score of a sequence across the given scenarios.
pub fn run_stochastic(
    sequence: &ActionSequence,
    ctx: &EvaluationContext,
    scenarios: &[Scenario],
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> Result<StochasticResult, PlanningError> {
    validate(scenarios)?;

    let mut symbols: Vec<&str> = sequence.actions.iter().map(|a| a.symbol.as_str()).collect();
    symbols.extend(ctx.start.positions.keys().map(String::as_str));

    let outcomes = pool.run(scenarios, cancel, |scenario| {
        let multipliers: HashMap<String, f64> = symbols
            .iter()
            .map(|s| (s.to_string(), 1.0 + scenario.price_shift))
            .collect();
        evaluate_sequence(sequence, ctx, Some(&multipliers)).score
    })?;

    let scenario_scores: Vec<(String, f64)> = scenarios
        .iter()
        .zip(outcomes)
        .map(|(s, r)| (s.name.clone(), r.unwrap_or(0.0)))
        .collect();
    let total_weight: f64 = scenarios.iter().map(|s| s.weight).sum();
    let weighted_score = scenarios
        .iter()
        .zip(&scenario_scores)
        .map(|(s, (_, score))| s.weight * score)
        .sum::<f64>()
        / total_weight;

    Ok(StochasticResult {
        sequence_hash: sequence.sequence_hash.clone(),
        weighted_score,
        scenarios_evaluated: scenario_scores.len(),
        scenario_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{action, context_with, eval_context};
    use approx::assert_relative_eq;
    use planning_core::TradeSide;

    fn setup() -> (ActionSequence, EvaluationContext, WorkerPool) {
        let ctx = eval_context(context_with(1000.0, &[("AAA", 10.0, 50.0)]), 0.0);
        let seq = ActionSequence::new(vec![action("BBB", TradeSide::Buy, 2, 100.0)], "t");
        (seq, ctx, WorkerPool::new(2).unwrap())
    }

    #[test]
    fn test_default_scenarios_counted() {
        let (seq, ctx, pool) = setup();
        let result =
            run_stochastic(&seq, &ctx, &default_scenarios(), &pool, &CancellationToken::new())
                .unwrap();
        assert_eq!(result.scenarios_evaluated, 5);
        assert!(result.weighted_score >= 0.0 && result.weighted_score <= 1.0);
    }

    #[test]
    fn test_weighted_average_of_equal_scores() {
        let (seq, ctx, pool) = setup();
        let scenarios = vec![Scenario::new("a", 0.0, 1.0), Scenario::new("b", 0.0, 3.0)];
        let result =
            run_stochastic(&seq, &ctx, &scenarios, &pool, &CancellationToken::new()).unwrap();
        assert_relative_eq!(result.weighted_score, result.scenario_scores[0].1, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_scenarios_rejected() {
        let (seq, ctx, pool) = setup();
        let token = CancellationToken::new();
        assert!(run_stochastic(&seq, &ctx, &[], &pool, &token).is_err());
        let negative = vec![Scenario::new("neg", 0.0, -1.0)];
        assert!(run_stochastic(&seq, &ctx, &negative, &pool, &token).is_err());
        let zero = vec![Scenario::new("zero", 0.0, 0.0)];
        assert!(run_stochastic(&seq, &ctx, &zero, &pool, &token).is_err());
    }
}
