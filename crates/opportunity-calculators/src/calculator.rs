use planning_core::{
    ActionCandidate, OpportunityCategory, OpportunityContext, Params, PlanningError, Position,
    TradeSide,
};
use std::cmp::Ordering;

/// A strategy that scans the snapshot and proposes trades for one category.
pub trait OpportunityCalculator: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> OpportunityCategory;

    fn calculate(
        &self,
        ctx: &OpportunityContext,
        params: &Params,
    ) -> Result<Vec<ActionCandidate>, PlanningError>;
}

/// Quantity and value of a sized trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSizing {
    pub quantity: u64,
    pub value: f64,
    pub fee: f64,
}

/// Size a BUY worth roughly `target_value`, limited by available cash.
///
/// Quantity is floored with a minimum of one share; returns `None` when the
/// total cost including fees does not fit in cash.
pub fn size_buy(ctx: &OpportunityContext, price: f64, target_value: f64) -> Option<TradeSizing> {
    let cash = ctx.available_cash;
    if cash <= 0.0 || price <= 0.0 {
        return None;
    }
    let value = target_value.min(cash);
    let quantity = ((value / price).floor() as u64).max(1);
    let value = quantity as f64 * price;
    let fee = ctx.transaction_costs.cost_for(value);
    if value + fee > cash {
        return None;
    }
    Some(TradeSizing {
        quantity,
        value,
        fee,
    })
}

/// Size a SELL worth roughly `target_value`, capped by the held quantity
/// and by `max_fraction` of it. Returns `None` when nothing sellable remains
/// or fees would eat the proceeds.
pub fn size_sell(
    ctx: &OpportunityContext,
    position: &Position,
    price: f64,
    target_value: f64,
    max_fraction: f64,
) -> Option<TradeSizing> {
    if price <= 0.0 || position.quantity < 1.0 {
        return None;
    }
    let held = position.quantity.floor() as u64;
    let fraction_cap = (position.quantity * max_fraction.clamp(0.0, 1.0)).floor() as u64;
    let wanted = ((target_value / price).floor() as u64).max(1);
    let quantity = wanted.min(held).min(fraction_cap);
    if quantity == 0 {
        return None;
    }
    let value = quantity as f64 * price;
    let fee = ctx.transaction_costs.cost_for(value);
    if value - fee <= 0.0 {
        return None;
    }
    Some(TradeSizing {
        quantity,
        value,
        fee,
    })
}

/// Assemble a candidate with identity fields filled from the snapshot.
#[allow(clippy::too_many_arguments)]
pub fn build_candidate(
    ctx: &OpportunityContext,
    side: TradeSide,
    symbol: &str,
    price: f64,
    sizing: TradeSizing,
    priority: f64,
    reason: String,
    tags: &[&str],
) -> ActionCandidate {
    ActionCandidate {
        side,
        symbol: symbol.to_string(),
        isin: ctx.isin_of(symbol),
        name: ctx.display_name(symbol),
        quantity: sizing.quantity,
        price,
        value: sizing.value,
        currency: ctx.currency_of(symbol),
        priority,
        reason,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Stable sort, highest priority first.
pub fn sort_by_priority(candidates: &mut [ActionCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
    });
}
