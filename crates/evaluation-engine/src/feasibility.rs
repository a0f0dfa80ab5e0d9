use planning_core::{ActionSequence, OpportunityContext, TradeSide, TransactionCostModel};

const CASH_EPSILON: f64 = 1e-6;

/// Fast pre-filter run before simulation.
///
/// Walks the actions in order, crediting sell proceeds and debiting buy
/// costs (fees included). Fails on the first SELL of a symbol that is not
/// held in sufficient quantity, or when the running cash balance goes
/// negative.
pub fn check_feasibility(
    sequence: &ActionSequence,
    ctx: &OpportunityContext,
    costs: &TransactionCostModel,
) -> Result<(), String> {
    let mut cash = ctx.available_cash;
    for action in &sequence.actions {
        let fee = costs.cost_for(action.value);
        match action.side {
            TradeSide::Sell => {
                let Some(position) = ctx.position(&action.symbol) else {
                    return Err(format!("no position in {}", action.symbol));
                };
                if (action.quantity as f64) > position.quantity + CASH_EPSILON {
                    return Err(format!(
                        "sell of {} {} exceeds held {}",
                        action.quantity, action.symbol, position.quantity
                    ));
                }
                cash += action.value - fee;
            }
            TradeSide::Buy => {
                cash -= action.value + fee;
                if cash < -CASH_EPSILON {
                    return Err(format!(
                        "insufficient cash for {} (short by {:.2})",
                        action.symbol, -cash
                    ));
                }
            }
        }
    }
    Ok(())
}
