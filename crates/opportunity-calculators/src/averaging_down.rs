use planning_core::{
    ActionCandidate, OpportunityCategory, OpportunityContext, Params, PlanningError, TradeSide,
};
use tracing::debug;

use crate::calculator::{build_candidate, size_buy, sort_by_priority, OpportunityCalculator};

/// Adds to quality positions trading moderately below their cost basis.
#[derive(Debug, Default, Clone, Copy)]
pub struct AveragingDownCalculator;

impl OpportunityCalculator for AveragingDownCalculator {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn category(&self) -> OpportunityCategory {
        OpportunityCategory::AveragingDown
    }

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError> {
        let min_loss = params.get_f64("min_loss", -0.05);
        let max_loss = params.get_f64("max_loss", -0.20);
        let max_value_per_position = params.get_f64("max_value_per_position", 500.0);
        let averaging_down_percent = params.get_f64("averaging_down_percent", 0.10);
        let min_quality = params.get_f64("min_quality", 0.6);
        let max_positions = params.get_usize("max_positions", 3);

        if !ctx.allow_buy || ctx.available_cash <= 0.0 {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for position in ctx.positions.values() {
            let symbol = position.symbol.as_str();
            let Some(price) = ctx.price(symbol) else {
                continue;
            };
            let Some(change) = position.gain_at(price) else {
                continue;
            };
            if change > min_loss || change < max_loss {
                continue;
            }
            if !ctx.can_trade(symbol, TradeSide::Buy) {
                continue;
            }
            let quality = ctx.security_scores.get(symbol).copied().unwrap_or(0.5);
            if quality < min_quality {
                debug!(symbol, quality, "Quality too low to average down");
                continue;
            }
            let target_value =
                (position.market_value * averaging_down_percent).min(max_value_per_position);
            let Some(sizing) = size_buy(ctx, price, target_value) else {
                continue;
            };
            candidates.push(build_candidate(
                ctx,
                TradeSide::Buy,
                symbol,
                price,
                sizing,
                -change,
                format!(
                    "Down {:.1}% from average cost {:.2}, quality {:.2}",
                    change.abs() * 100.0,
                    position.average_cost,
                    quality
                ),
                &["averaging_down", "buy"],
            ));
        }

        sort_by_priority(&mut candidates);
        candidates.truncate(max_positions);
        Ok(candidates)
    }
}
