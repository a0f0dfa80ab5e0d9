//! Country-group rebalancing: trim overweight groups, add to underweight ones.

use planning_core::{
    resolve_group, ActionCandidate, OpportunityCategory, OpportunityContext, Params,
    PlanningError, PortfolioContext, TradeSide,
};
use std::collections::HashMap;
use tracing::debug;

use crate::calculator::{
    build_candidate, size_buy, size_sell, sort_by_priority, OpportunityCalculator,
};

fn current_country_weights(ctx: &OpportunityContext) -> HashMap<String, f64> {
    PortfolioContext::from_opportunity_context(ctx).country_weights()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RebalanceSellsCalculator;

impl OpportunityCalculator for RebalanceSellsCalculator {
    fn name(&self) -> &'static str {
        "rebalance_sells"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::RebalanceSells
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_overweight = params.get_f64("min_overweight", 0.05);
        let max_value_per_trade = params.get_f64("max_value_per_trade", 500.0);
        let max_sell_positions = params.get_usize("max_sell_positions", 5);
        let max_sell_percentage = params.get_f64("max_sell_percentage", 1.0);

        let total = ctx.total_portfolio_value;
        if !ctx.allow_sell || ctx.country_targets.is_empty() || total <= 0.0 {
            return Ok(Vec::new());
        }

        let current = current_country_weights(ctx);
        let overweight: HashMap<String, f64> = current
            .iter()
            .filter_map(|(group, &weight)| {
                let target = *ctx.country_targets.get(group)?;
                let excess = weight - target;
                (excess > min_overweight).then(|| (group.clone(), excess))
            })
            .collect();
        if overweight.is_empty() {
            debug!("No overweight country groups");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for position in ctx.positions.values() {
            let symbol = position.symbol.as_str();
            let country = ctx.security(symbol).and_then(|s| s.country.as_deref());
            let group = resolve_group(country, &ctx.country_groups);
            let Some(&excess) = overweight.get(&group) else {
                continue;
            };
            if !ctx.can_trade(symbol, TradeSide::Sell) {
                continue;
            }
            let Some(price) = ctx.price(symbol) else {
                continue;
            };
            let target_value = (excess * total).min(max_value_per_trade);
            let Some(sizing) = size_sell(ctx, position, price, target_value, max_sell_percentage)
            else {
                continue;
            };
            candidates.push(build_candidate(
                ctx,
                TradeSide::Sell,
                symbol,
                price,
                sizing,
                excess * 0.8,
                format!("Country group {} overweight by {:.1}%", group, excess * 100.0),
                &["rebalance", "sell", "overweight"],
            ));
        }

        sort_by_priority(&mut candidates);
        candidates.truncate(max_sell_positions);
        Ok(candidates)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RebalanceBuysCalculator;

impl OpportunityCalculator for RebalanceBuysCalculator {
    fn name(&self) -> &'static str {
        "rebalance_buys"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::RebalanceBuys
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_underweight = params.get_f64("min_underweight", 0.05);
        let min_score = params.get_f64("min_score", 0.65);
        let max_value_per_trade = params.get_f64("max_value_per_trade", 500.0);
        let max_positions = params.get_usize("max_positions", 0);

        if !ctx.allow_buy || ctx.available_cash <= 0.0 || ctx.country_targets.is_empty() {
            return Ok(Vec::new());
        }

        let current = current_country_weights(ctx);
        let underweight: HashMap<&str, f64> = ctx
            .country_targets
            .iter()
            .filter_map(|(group, &target)| {
                let gap = target - current.get(group).copied().unwrap_or(0.0);
                (gap > min_underweight).then_some((group.as_str(), gap))
            })
            .collect();
        if underweight.is_empty() {
            debug!("No underweight country groups");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for security in ctx.securities.values() {
            let symbol = security.symbol.as_str();
            let Some(country) = security.country.as_deref() else {
                continue;
            };
            let group = resolve_group(Some(country), &ctx.country_groups);
            let Some(&gap) = underweight.get(group.as_str()) else {
                continue;
            };
            if !ctx.can_trade(symbol, TradeSide::Buy) {
                continue;
            }
            let score = ctx.security_scores.get(symbol).copied().unwrap_or(0.5);
            if score < min_score {
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
                gap * score * 0.6,
                format!(
                    "Country group {} underweight by {:.1}% (score {:.2})",
                    group,
                    gap * 100.0,
                    score
                ),
                &["rebalance", "buy", "underweight"],
            ));
        }

        sort_by_priority(&mut candidates);
        if max_positions > 0 {
            candidates.truncate(max_positions);
        }
        Ok(candidates)
    }
}
