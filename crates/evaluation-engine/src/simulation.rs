use std::collections::HashMap;

use planning_core::{ActionSequence, PortfolioContext, TradeSide, TransactionCostModel};

const VALUE_EPSILON: f64 = 1e-9;

/// End state after applying a sequence to a private copy of the portfolio.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub end_portfolio: PortfolioContext,
    pub end_cash: f64,
    /// Fees of the actions that were actually applied.
    pub transaction_cost: f64,
    /// BUY actions skipped because cash ran out.
    pub skipped_actions: usize,
}

/// Apply each action in order.
///
/// SELL lowers the position value (dropping it at zero) and credits the
/// proceeds net of fees. BUY debits value plus fees and raises the position
/// value; a BUY that cash cannot cover is skipped. When `price_multipliers`
/// is given, held positions are revalued and trades priced at the adjusted
/// prices first.
pub fn simulate(
    sequence: &ActionSequence,
    start: &PortfolioContext,
    start_cash: f64,
    costs: &TransactionCostModel,
    price_multipliers: Option<&HashMap<String, f64>>,
) -> SimulationOutcome {
    let multiplier = |symbol: &str| -> f64 {
        price_multipliers
            .and_then(|m| m.get(symbol))
            .copied()
            .unwrap_or(1.0)
    };

    let mut positions = start.positions.clone();
    let mut total_value = start.total_value;
    if price_multipliers.is_some() {
        for (symbol, value) in positions.iter_mut() {
            let adjusted = *value * multiplier(symbol);
            total_value += adjusted - *value;
            *value = adjusted;
        }
    }

    let mut cash = start_cash;
    let mut fees = 0.0;
    let mut skipped = 0;

    for action in &sequence.actions {
        let value = action.quantity as f64 * action.price * multiplier(&action.symbol);
        let fee = costs.cost_for(value);
        match action.side {
            TradeSide::Sell => {
                let remaining = positions.get(&action.symbol).copied().unwrap_or(0.0) - value;
                if remaining <= VALUE_EPSILON {
                    positions.remove(&action.symbol);
                } else {
                    positions.insert(action.symbol.clone(), remaining);
                }
                cash += value - fee;
            }
            TradeSide::Buy => {
                if value + fee > cash + VALUE_EPSILON {
                    skipped += 1;
                    continue;
                }
                *positions.entry(action.symbol.clone()).or_insert(0.0) += value;
                cash -= value + fee;
            }
        }
        fees += fee;
    }

    SimulationOutcome {
        end_portfolio: PortfolioContext {
            positions,
            total_value: (total_value - fees).max(0.0),
            reference: start.reference.clone(),
        },
        end_cash: cash,
        transaction_cost: fees,
        skipped_actions: skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{action, context_with};
    use approx::assert_relative_eq;

    #[test]
    fn test_sell_then_buy_moves_value() {
        let ctx = context_with(100.0, &[("OLD", 10.0, 50.0)]);
        let start = PortfolioContext::from_opportunity_context(&ctx);
        let seq = ActionSequence::new(
            vec![
                action("OLD", TradeSide::Sell, 10, 50.0),
                action("NEW", TradeSide::Buy, 3, 100.0),
            ],
            "t",
        );
        let out = simulate(&seq, &start, 100.0, &TransactionCostModel::zero(), None);
        assert!(out.end_portfolio.positions.get("OLD").is_none());
        assert_relative_eq!(out.end_portfolio.value_of("NEW"), 300.0);
        assert_relative_eq!(out.end_cash, 300.0);
        assert_relative_eq!(out.end_portfolio.total_value, 600.0);
        assert_eq!(out.skipped_actions, 0);
    }

    #[test]
    fn test_unaffordable_buy_is_skipped() {
        let ctx = context_with(50.0, &[]);
        let start = PortfolioContext::from_opportunity_context(&ctx);
        let seq = ActionSequence::new(vec![action("NEW", TradeSide::Buy, 1, 100.0)], "t");
        let out = simulate(&seq, &start, 50.0, &TransactionCostModel::zero(), None);
        assert_eq!(out.skipped_actions, 1);
        assert_eq!(out.end_cash, 50.0);
        assert_eq!(out.transaction_cost, 0.0);
    }

    #[test]
    fn test_fees_reduce_cash_and_total() {
        let ctx = context_with(1000.0, &[]);
        let start = PortfolioContext::from_opportunity_context(&ctx);
        let seq = ActionSequence::new(vec![action("NEW", TradeSide::Buy, 1, 100.0)], "t");
        let out = simulate(&seq, &start, 1000.0, &TransactionCostModel::new(2.0, 0.01), None);
        assert_relative_eq!(out.transaction_cost, 3.0);
        assert_relative_eq!(out.end_cash, 897.0);
        assert_relative_eq!(out.end_portfolio.total_value, 997.0);
    }

    #[test]
    fn test_price_multipliers_revalue_positions() {
        let ctx = context_with(0.0, &[("HELD", 10.0, 10.0)]);
        let start = PortfolioContext::from_opportunity_context(&ctx);
        let seq = ActionSequence::new(vec![], "t");
        let m = HashMap::from([("HELD".to_string(), 1.5)]);
        let out = simulate(&seq, &start, 0.0, &TransactionCostModel::zero(), Some(&m));
        assert_relative_eq!(out.end_portfolio.value_of("HELD"), 150.0);
        assert_relative_eq!(out.end_portfolio.total_value, 150.0);
    }

    #[test]
    fn test_start_state_is_not_mutated() {
        let ctx = context_with(0.0, &[("HELD", 10.0, 10.0)]);
        let start = PortfolioContext::from_opportunity_context(&ctx);
        let seq = ActionSequence::new(vec![action("HELD", TradeSide::Sell, 10, 10.0)], "t");
        let _ = simulate(&seq, &start, 0.0, &TransactionCostModel::zero(), None);
        assert_eq!(start.value_of("HELD"), 100.0);
    }
}
