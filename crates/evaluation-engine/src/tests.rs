use std::collections::HashMap;
use std::sync::Arc;

use planning_core::{
    ActionCandidate, ActionSequence, OpportunityContext, PlanningError, PortfolioSnapshot,
    Position, TradeSide, TransactionCostModel, MAX_BATCH_SEQUENCES,
};

use crate::evaluator::EvaluationContext;
use crate::service::EvaluationService;
use crate::worker_pool::CancellationToken;

/// Helper: a trade with `value = quantity * price`.
pub(crate) fn action(symbol: &str, side: TradeSide, quantity: u64, price: f64) -> ActionCandidate {
    ActionCandidate {
        side,
        symbol: symbol.to_string(),
        isin: None,
        name: symbol.to_string(),
        quantity,
        price,
        value: quantity as f64 * price,
        currency: "EUR".to_string(),
        priority: 0.5,
        reason: "test".to_string(),
        tags: Vec::new(),
    }
}

/// Helper: a context holding `(symbol, quantity, price)` positions plus cash.
pub(crate) fn context_with(cash: f64, holdings: &[(&str, f64, f64)]) -> OpportunityContext {
    let snapshot = PortfolioSnapshot {
        positions: holdings
            .iter()
            .map(|(symbol, quantity, price)| Position {
                symbol: symbol.to_string(),
                isin: None,
                quantity: *quantity,
                average_cost: *price,
                market_value: quantity * price,
                currency: "EUR".to_string(),
            })
            .collect(),
        current_prices: holdings
            .iter()
            .map(|(symbol, _, price)| (symbol.to_string(), *price))
            .collect::<HashMap<_, _>>(),
        available_cash: cash,
        allow_buy: true,
        allow_sell: true,
        ..Default::default()
    };
    OpportunityContext::from_snapshot(snapshot).unwrap()
}

/// Helper: evaluation context with the default cost model.
pub(crate) fn eval_context(ctx: OpportunityContext, cost_penalty_factor: f64) -> EvaluationContext {
    EvaluationContext::new(Arc::new(ctx), cost_penalty_factor)
        .with_costs(TransactionCostModel::default())
}

fn buy(symbol: &str, quantity: u64, price: f64) -> ActionSequence {
    ActionSequence::new(vec![action(symbol, TradeSide::Buy, quantity, price)], "test")
}

#[test]
fn test_oversized_batch_rejected_before_evaluation() {
    let service = EvaluationService::new(2).unwrap();
    let ctx = eval_context(context_with(1000.0, &[]), 0.1);
    let sequences: Vec<ActionSequence> = (0..MAX_BATCH_SEQUENCES + 1)
        .map(|i| buy(&format!("S{}", i), 1, 1.0))
        .collect();

    // a tripped token would surface as Cancelled if evaluation had started
    let token = CancellationToken::new();
    token.cancel();
    let err = service.batch_evaluate(&ctx, &sequences, &token).unwrap_err();
    assert!(err.is_validation());
    match err {
        PlanningError::BatchTooLarge { size, max } => {
            assert_eq!(size, 10_001);
            assert_eq!(max, 10_000);
        }
        other => panic!("expected BatchTooLarge, got {:?}", other),
    }
}

#[test]
fn test_results_align_with_input_and_keep_infeasible() {
    let service = EvaluationService::new(4).unwrap();
    let ctx = eval_context(context_with(500.0, &[("HELD", 10.0, 20.0)]), 0.1);
    let sequences: Vec<ActionSequence> = (0..200)
        .map(|i| {
            if i % 3 == 0 {
                // unaffordable
                buy(&format!("BIG{}", i), 100, 100.0)
            } else {
                buy(&format!("S{}", i), 1, 10.0 + i as f64)
            }
        })
        .collect();

    let response = service
        .batch_evaluate(&ctx, &sequences, &CancellationToken::new())
        .unwrap();

    assert_eq!(response.results.len(), sequences.len());
    assert!(response.errors.is_empty());
    for (i, (result, seq)) in response.results.iter().zip(&sequences).enumerate() {
        assert_eq!(result.sequence.sequence_hash, seq.sequence_hash);
        assert_eq!(result.feasible, i % 3 != 0);
        if !result.feasible {
            assert_eq!(result.score, 0.0);
            assert!(result.transaction_cost > 0.0);
        }
    }
}

#[test]
fn test_batch_is_deterministic_across_runs() {
    let service = EvaluationService::new(3).unwrap();
    let ctx = eval_context(context_with(2000.0, &[("AAA", 10.0, 50.0), ("BBB", 4.0, 25.0)]), 0.1);
    let sequences: Vec<ActionSequence> = vec![
        ActionSequence::new(
            vec![
                action("AAA", TradeSide::Sell, 5, 50.0),
                action("CCC", TradeSide::Buy, 3, 40.0),
            ],
            "mixed",
        ),
        buy("DDD", 2, 75.0),
        buy("AAA", 1, 50.0),
    ];

    let token = CancellationToken::new();
    let a = service.batch_evaluate(&ctx, &sequences, &token).unwrap();
    let b = service.batch_evaluate(&ctx, &sequences, &token).unwrap();
    let scores_a: Vec<f64> = a.results.iter().map(|r| r.score).collect();
    let scores_b: Vec<f64> = b.results.iter().map(|r| r.score).collect();
    assert_eq!(scores_a, scores_b);
}

#[test]
fn test_cancelled_batch_returns_error_not_partial() {
    let service = EvaluationService::new(2).unwrap();
    let ctx = eval_context(context_with(1000.0, &[]), 0.1);
    let sequences: Vec<ActionSequence> = (0..10).map(|i| buy(&format!("S{}", i), 1, 1.0)).collect();
    let token = CancellationToken::new();
    token.cancel();
    let err = service.batch_evaluate(&ctx, &sequences, &token).unwrap_err();
    assert!(matches!(err, PlanningError::Cancelled));
}

#[test]
fn test_monte_carlo_through_service() {
    let service = EvaluationService::new(2).unwrap();
    let ctx = eval_context(context_with(1000.0, &[("AAA", 10.0, 50.0)]), 0.1);
    let result = service
        .evaluate_monte_carlo(&ctx, &buy("BBB", 2, 100.0), 25, Some(7), &CancellationToken::new())
        .unwrap();
    assert!(result.feasible);
    assert_eq!(result.paths_evaluated, 25);
    assert_eq!(result.path_scores.len(), 25);
}
