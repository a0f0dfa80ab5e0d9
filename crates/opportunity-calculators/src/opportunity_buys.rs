use planning_core::{
    ActionCandidate, OpportunityCategory, OpportunityContext, Params, PlanningError, TradeSide,
};

use crate::calculator::{build_candidate, size_buy, sort_by_priority, OpportunityCalculator};

/// Buys the highest-scoring securities regardless of current allocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpportunityBuysCalculator;

impl OpportunityCalculator for OpportunityBuysCalculator {
    fn name(&self) -> &'static str {
        "opportunity_buys"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::OpportunityBuys
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_score = params.get_f64("min_score", 0.7);
        let max_value_per_trade = params.get_f64("max_value_per_trade", 500.0);
        let max_positions = params.get_usize("max_positions", 5);

        if !ctx.allow_buy || ctx.available_cash <= 0.0 || ctx.security_scores.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for security in ctx.securities.values() {
            let symbol = security.symbol.as_str();
            let Some(&score) = ctx.security_scores.get(symbol) else {
                continue;
            };
            if score < min_score || !ctx.can_trade(symbol, TradeSide::Buy) {
                continue;
            }
            let Some(price) = ctx.price(symbol) else {
                continue;
            };
            let Some(sizing) = size_buy(ctx, price, max_value_per_trade) else {
                continue;
            };
            candidates.push(build_candidate(
                ctx,
                TradeSide::Buy,
                symbol,
                price,
                sizing,
                score.min(1.0),
                format!("High quality score {:.2}", score),
                &["opportunity", "buy", "quality"],
            ));
        }

        sort_by_priority(&mut candidates);
        candidates.truncate(max_positions);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_snapshot, build, prices, security};
    use planning_core::TransactionCostModel;
    use std::collections::HashMap;

    #[test]
    fn test_ranks_by_score_and_caps() {
        let mut snap = base_snapshot(5000.0);
        snap.securities = vec![
            security("AAA", None),
            security("BBB", None),
            security("CCC", None),
        ];
        snap.current_prices = prices(&[("AAA", 10.0), ("BBB", 10.0), ("CCC", 10.0)]);
        snap.security_scores = HashMap::from([
            ("AAA".to_string(), 0.75),
            ("BBB".to_string(), 1.3),
            ("CCC".to_string(), 0.5),
        ]);
        let ctx = build(snap, TransactionCostModel::zero());
        let out = OpportunityBuysCalculator
            .calculate(&ctx, &Params::new().with("max_positions", 5))
            .unwrap();
        let symbols: Vec<_> = out.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB", "AAA"]);
        assert_eq!(out[0].priority, 1.0);
    }

    #[test]
    fn test_security_allow_buy_false_excluded() {
        let mut snap = base_snapshot(5000.0);
        let mut sec = security("AAA", None);
        sec.allow_buy = false;
        snap.securities = vec![sec];
        snap.current_prices = prices(&[("AAA", 10.0)]);
        snap.security_scores = HashMap::from([("AAA".to_string(), 0.9)]);
        let ctx = build(snap, TransactionCostModel::zero());
        assert!(OpportunityBuysCalculator
            .calculate(&ctx, &Params::new())
            .unwrap()
            .is_empty());
    }
}
