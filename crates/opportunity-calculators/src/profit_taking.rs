use planning_core::{
    ActionCandidate, OpportunityCategory, OpportunityContext, Params, PlanningError, TradeSide,
};

use crate::calculator::{build_candidate, size_sell, sort_by_priority, OpportunityCalculator};

/// Trims positions that have run up well above their cost basis.
///
/// Gains above `windfall_threshold` are tagged `windfall` so the plan can
/// flag them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfitTakingCalculator;

impl OpportunityCalculator for ProfitTakingCalculator {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::ProfitTaking
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_gain = params.get_f64("min_gain", 0.15);
        let windfall_threshold = params.get_f64("windfall_threshold", 0.30);
        let sell_percentage = params.get_f64("sell_percentage", 0.5);
        let max_sell_positions = params.get_usize("max_sell_positions", 5);

        if !ctx.allow_sell {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for position in ctx.positions.values() {
            let symbol = position.symbol.as_str();
            let Some(price) = ctx.price(symbol) else {
                continue;
            };
            let Some(gain) = position.gain_at(price) else {
                continue;
            };
            if gain < min_gain || !ctx.can_trade(symbol, TradeSide::Sell) {
                continue;
            }
            let target_value = position.quantity * price * sell_percentage;
            let Some(sizing) = size_sell(ctx, position, price, target_value, sell_percentage.max(0.0))
                .or_else(|| size_sell(ctx, position, price, price, 1.0))
            else {
                continue;
            };
            let windfall = gain >= windfall_threshold;
            let tags: &[&str] = if windfall {
                &["profit_taking", "sell", "windfall"]
            } else {
                &["profit_taking", "sell"]
            };
            candidates.push(build_candidate(
                ctx,
                TradeSide::Sell,
                symbol,
                price,
                sizing,
                gain.min(1.0),
                format!("Up {:.1}% over average cost {:.2}", gain * 100.0, position.average_cost),
                tags,
            ));
        }

        sort_by_priority(&mut candidates);
        candidates.truncate(max_sell_positions);
        Ok(candidates)
    }
}
