use std::collections::HashMap;
use std::sync::Arc;

use planning_core::{
    evaluation_key, portfolio_hash, ActionSequence, OpportunityContext, PortfolioContext,
    SequenceEvaluationResult, TransactionCostModel,
};

use crate::feasibility::check_feasibility;
use crate::scoring::{diversification_score, final_score, transaction_cost};
use crate::simulation::simulate;

/// Everything a worker needs to evaluate a sequence. Shared read-only.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub opportunity: Arc<OpportunityContext>,
    pub start: PortfolioContext,
    pub costs: TransactionCostModel,
    pub cost_penalty_factor: f64,
}

impl EvaluationContext {
    pub fn new(opportunity: Arc<OpportunityContext>, cost_penalty_factor: f64) -> Self {
        let start = PortfolioContext::from_opportunity_context(&opportunity);
        let costs = opportunity.transaction_costs;
        Self {
            opportunity,
            start,
            costs,
            cost_penalty_factor,
        }
    }

    pub fn with_costs(mut self, costs: TransactionCostModel) -> Self {
        self.costs = costs;
        self
    }

    pub fn start_cash(&self) -> f64 {
        self.opportunity.available_cash
    }

    /// Score of the portfolio as it stands, before any trade.
    pub fn current_score(&self) -> f64 {
        diversification_score(&self.start)
    }

    /// Key under which results for this context are cached.
    pub fn cache_key(&self) -> String {
        evaluation_key(
            &portfolio_hash(&self.opportunity),
            &self.start,
            &self.costs,
            self.cost_penalty_factor,
        )
    }
}

/// Feasibility check, simulation and scoring for one sequence.
///
/// Infeasible sequences come back with score 0 and the start state, but
/// with their transaction cost filled in.
pub fn evaluate_sequence(
    sequence: &ActionSequence,
    ctx: &EvaluationContext,
    price_multipliers: Option<&HashMap<String, f64>>,
) -> SequenceEvaluationResult {
    if let Err(reason) = check_feasibility(sequence, &ctx.opportunity, &ctx.costs) {
        return infeasible(sequence, ctx, reason);
    }

    let outcome = simulate(
        sequence,
        &ctx.start,
        ctx.start_cash(),
        &ctx.costs,
        price_multipliers,
    );
    let diversification = diversification_score(&outcome.end_portfolio);
    let score = final_score(
        diversification,
        outcome.transaction_cost,
        outcome.end_portfolio.total_value,
        ctx.cost_penalty_factor,
    );

    SequenceEvaluationResult {
        sequence: sequence.clone(),
        score,
        diversification_score: diversification,
        feasible: true,
        end_cash: outcome.end_cash,
        end_portfolio: outcome.end_portfolio,
        transaction_cost: outcome.transaction_cost,
        infeasible_reason: None,
    }
}

pub fn infeasible(
    sequence: &ActionSequence,
    ctx: &EvaluationContext,
    reason: String,
) -> SequenceEvaluationResult {
    SequenceEvaluationResult {
        sequence: sequence.clone(),
        score: 0.0,
        diversification_score: 0.0,
        feasible: false,
        end_cash: ctx.start_cash(),
        end_portfolio: ctx.start.clone(),
        transaction_cost: transaction_cost(sequence, &ctx.costs),
        infeasible_reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{action, context_with, eval_context};
    use planning_core::TradeSide;

    #[test]
    fn test_infeasible_keeps_cost_diagnostics() {
        let ctx = eval_context(context_with(10.0, &[]), 0.0);
        let seq = ActionSequence::new(vec![action("AAA", TradeSide::Buy, 5, 100.0)], "t");
        let result = evaluate_sequence(&seq, &ctx, None);
        assert!(!result.feasible);
        assert_eq!(result.score, 0.0);
        assert!(result.transaction_cost > 0.0);
        assert!(result.infeasible_reason.is_some());
    }

    #[test]
    fn test_feasible_result_is_scored() {
        let ctx = eval_context(context_with(1000.0, &[("AAA", 10.0, 10.0)]), 0.1);
        let seq = ActionSequence::new(vec![action("BBB", TradeSide::Buy, 5, 100.0)], "t");
        let result = evaluate_sequence(&seq, &ctx, None);
        assert!(result.feasible);
        assert!(result.score > 0.0 && result.score <= 1.0);
        assert!(result.end_cash < 1000.0);
        assert!(result.end_portfolio.value_of("BBB") > 0.0);
    }
}
