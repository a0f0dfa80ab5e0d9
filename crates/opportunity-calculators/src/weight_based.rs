use planning_core::{
    ActionCandidate, OpportunityCategory, OpportunityContext, Params, PlanningError, TradeSide,
};
use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::calculator::{build_candidate, size_buy, size_sell, OpportunityCalculator};

/// Proposes trades that move each symbol toward its target weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightBasedCalculator;

const PRIORITY_SCALE: f64 = 0.8;

struct WeightGap {
    symbol: String,
    target: f64,
    current: f64,
    diff: f64,
}

impl OpportunityCalculator for WeightBasedCalculator {
    fn name(&self) -> &'static str {
        "weight_based"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::WeightBased
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_weight_diff = params.get_f64("min_weight_diff", 0.02);
        let max_value_per_trade = params.get_f64("max_value_per_trade", 500.0);
        let max_buy_positions = params.get_usize("max_buy_positions", 5);
        let max_sell_positions = params.get_usize("max_sell_positions", 5);
        let max_sell_percentage = params.get_f64("max_sell_percentage", 1.0);

        let total = ctx.total_portfolio_value;
        if ctx.target_weights.is_empty() || total <= 0.0 {
            debug!("No target weights or empty portfolio, skipping weight-based");
            return Ok(Vec::new());
        }

        let mut gaps: Vec<WeightGap> = ctx
            .target_weights
            .iter()
            .filter_map(|(symbol, &target)| {
                let current = ctx.current_weight(symbol);
                let diff = target - current;
                (diff.abs() > min_weight_diff).then(|| WeightGap {
                    symbol: symbol.clone(),
                    target,
                    current,
                    diff,
                })
            })
            .collect();

        // Underweight (buys) first, then largest gap first.
        gaps.sort_by(|a, b| match (a.diff > 0.0, b.diff > 0.0) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => b
                .diff
                .abs()
                .partial_cmp(&a.diff.abs())
                .unwrap_or(Ordering::Equal),
        });

        let mut buy_count = 0usize;
        let mut sell_count = 0usize;
        let mut candidates = Vec::new();

        for gap in gaps {
            let Some(price) = ctx.price(&gap.symbol) else {
                warn!(symbol = %gap.symbol, "No price for weight-based candidate, skipping");
                continue;
            };
            let priority = gap.diff.abs() * PRIORITY_SCALE;

            if gap.diff > 0.0 {
                if buy_count >= max_buy_positions || !ctx.can_trade(&gap.symbol, TradeSide::Buy) {
                    continue;
                }
                let target_value = (gap.diff * total).min(max_value_per_trade);
                let Some(sizing) = size_buy(ctx, price, target_value) else {
                    debug!(symbol = %gap.symbol, "Buy does not fit in available cash");
                    continue;
                };
                let reason = format!(
                    "Target weight: {:.1}%, current: {:.1}% (underweight by {:.1}%)",
                    gap.target * 100.0,
                    gap.current * 100.0,
                    gap.diff * 100.0
                );
                candidates.push(build_candidate(
                    ctx,
                    TradeSide::Buy,
                    &gap.symbol,
                    price,
                    sizing,
                    priority,
                    reason,
                    &["weight_based", "buy", "underweight", "optimizer-aligned"],
                ));
                buy_count += 1;
            } else {
                if sell_count >= max_sell_positions || !ctx.can_trade(&gap.symbol, TradeSide::Sell)
                {
                    continue;
                }
                let Some(position) = ctx.position(&gap.symbol) else {
                    continue;
                };
                let target_value = (gap.diff.abs() * total).min(max_value_per_trade);
                let Some(sizing) = size_sell(ctx, position, price, target_value, max_sell_percentage)
                else {
                    continue;
                };
                let reason = format!(
                    "Target weight: {:.1}%, current: {:.1}% (overweight by {:.1}%)",
                    gap.target * 100.0,
                    gap.current * 100.0,
                    gap.diff.abs() * 100.0
                );
                candidates.push(build_candidate(
                    ctx,
                    TradeSide::Sell,
                    &gap.symbol,
                    price,
                    sizing,
                    priority,
                    reason,
                    &["weight_based", "sell", "overweight"],
                ));
                sell_count += 1;
            }
        }

        debug!(
            buys = buy_count,
            sells = sell_count,
            "Weight-based opportunities identified"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_snapshot, build, position, prices};
    use approx::assert_relative_eq;
    use planning_core::TransactionCostModel;
    use std::collections::HashMap;

    fn ctx_with(
        targets: &[(&str, f64)],
        positions: Vec<planning_core::Position>,
        price_list: &[(&str, f64)],
        cash: f64,
        total: f64,
    ) -> OpportunityContext {
        let mut snap = base_snapshot(cash);
        snap.target_weights = targets
            .iter()
            .map(|(s, w)| (s.to_string(), *w))
            .collect::<HashMap<_, _>>();
        snap.positions = positions;
        snap.current_prices = prices(price_list);
        snap.total_portfolio_value = Some(total);
        build(snap, TransactionCostModel::default())
    }

    #[test]
    fn test_underweight_buy_scenario() {
        // 10% held, 30% target, 10k portfolio, capped at 500 per trade.
        let ctx = ctx_with(
            &[("AAA", 0.30)],
            vec![position("AAA", 20.0, 50.0, 1000.0)],
            &[("AAA", 50.0)],
            5000.0,
            10_000.0,
        );
        let params = Params::new()
            .with("min_weight_diff", 0.02)
            .with("max_value_per_trade", 500.0);
        let out = WeightBasedCalculator.calculate(&ctx, &params).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].side, TradeSide::Buy);
        assert_eq!(out[0].quantity, 10);
        assert_relative_eq!(out[0].priority, 0.16, epsilon = 1e-9);
        assert!(out[0].has_tag("underweight"));
    }

    #[test]
    fn test_no_candidate_within_threshold() {
        let ctx = ctx_with(
            &[("AAA", 0.11), ("BBB", 0.09)],
            vec![
                position("AAA", 20.0, 50.0, 1000.0),
                position("BBB", 10.0, 100.0, 1000.0),
            ],
            &[("AAA", 50.0), ("BBB", 100.0)],
            5000.0,
            10_000.0,
        );
        let out = WeightBasedCalculator
            .calculate(&ctx, &Params::new().with("min_weight_diff", 0.02))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_buys_precede_sells_and_larger_gaps_first() {
        let ctx = ctx_with(
            &[("AAA", 0.0), ("BBB", 0.25), ("CCC", 0.40)],
            vec![
                position("AAA", 40.0, 50.0, 2000.0),
                position("BBB", 10.0, 100.0, 1000.0),
            ],
            &[("AAA", 50.0), ("BBB", 100.0), ("CCC", 10.0)],
            5000.0,
            10_000.0,
        );
        let out = WeightBasedCalculator.calculate(&ctx, &Params::new()).unwrap();
        let order: Vec<_> = out.iter().map(|c| (c.symbol.as_str(), c.side)).collect();
        assert_eq!(
            order,
            vec![
                ("CCC", TradeSide::Buy),
                ("BBB", TradeSide::Buy),
                ("AAA", TradeSide::Sell)
            ]
        );
    }

    #[test]
    fn test_sell_capped_by_held_quantity() {
        let ctx = ctx_with(
            &[("AAA", 0.0)],
            vec![position("AAA", 3.0, 50.0, 3000.0)],
            &[("AAA", 1000.0)],
            0.0,
            10_000.0,
        );
        let params = Params::new().with("max_value_per_trade", 100_000.0);
        let out = WeightBasedCalculator.calculate(&ctx, &params).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quantity, 3);
        assert_eq!(out[0].value, 3000.0);
    }

    #[test]
    fn test_recently_bought_and_buy_cap_respected() {
        let mut snap = base_snapshot(10_000.0);
        snap.target_weights = HashMap::from([
            ("AAA".to_string(), 0.2),
            ("BBB".to_string(), 0.2),
            ("CCC".to_string(), 0.2),
        ]);
        snap.current_prices = prices(&[("AAA", 10.0), ("BBB", 10.0), ("CCC", 10.0)]);
        snap.recently_bought = vec!["AAA".to_string()];
        snap.total_portfolio_value = Some(10_000.0);
        let ctx = build(snap, TransactionCostModel::zero());
        let out = WeightBasedCalculator
            .calculate(&ctx, &Params::new().with("max_buy_positions", 1))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "BBB");
    }

    #[test]
    fn test_missing_price_skips_candidate() {
        let ctx = ctx_with(&[("AAA", 0.3)], vec![], &[], 5000.0, 10_000.0);
        let out = WeightBasedCalculator.calculate(&ctx, &Params::new()).unwrap();
        assert!(out.is_empty());
    }
}
