use planning_core::{ActionCandidate, ActionSequence, OpportunityContext, TradeSide};
use tracing::debug;

/// Selected sequence after eligibility and lot-size adjustments.
#[derive(Debug, Clone)]
pub struct EnforcedSequence {
    pub sequence: ActionSequence,
    /// Dropped actions with the reason they were removed.
    pub filtered: Vec<(ActionCandidate, String)>,
    /// Number of actions whose quantity was rounded to a lot multiple.
    pub lot_adjusted: usize,
}

impl EnforcedSequence {
    pub fn changed(&self) -> bool {
        !self.filtered.is_empty() || self.lot_adjusted > 0
    }
}

/// Applies per-security trading constraints to a selected sequence.
pub struct ConstraintEnforcer<'a> {
    ctx: &'a OpportunityContext,
}

impl<'a> ConstraintEnforcer<'a> {
    pub fn new(ctx: &'a OpportunityContext) -> Self {
        Self { ctx }
    }

    /// Drop actions whose security forbids the side and round quantities up
    /// to the security's minimum lot. Actions without a known security pass
    /// through untouched.
    pub fn enforce(&self, sequence: &ActionSequence) -> EnforcedSequence {
        let mut actions = Vec::with_capacity(sequence.len());
        let mut filtered = Vec::new();
        let mut lot_adjusted = 0;

        for action in &sequence.actions {
            let Some(security) = self
                .ctx
                .find_security(&action.symbol, action.isin.as_deref())
            else {
                actions.push(action.clone());
                continue;
            };

            if !security.allows(action.side) {
                let reason = match action.side {
                    TradeSide::Buy => "allow_buy=false",
                    TradeSide::Sell => "allow_sell=false",
                };
                debug!(symbol = %action.symbol, side = %action.side, reason, "Action filtered by constraint");
                filtered.push((action.clone(), reason.to_string()));
                continue;
            }

            let mut adjusted = action.clone();
            if let Some(quantity) = round_to_lot(action.quantity, security.min_lot) {
                debug!(
                    symbol = %action.symbol,
                    from = action.quantity,
                    to = quantity,
                    min_lot = security.min_lot,
                    "Quantity rounded to lot size"
                );
                adjusted.quantity = quantity;
                adjusted.value = quantity as f64 * adjusted.price;
                lot_adjusted += 1;
            }
            actions.push(adjusted);
        }

        let sequence = if filtered.is_empty() && lot_adjusted == 0 {
            sequence.clone()
        } else {
            ActionSequence::new(actions, &sequence.pattern_type)
        };
        EnforcedSequence {
            sequence,
            filtered,
            lot_adjusted,
        }
    }
}

/// The next multiple of `min_lot` at or above `quantity`, or `None` when no
/// rounding is needed.
pub fn round_to_lot(quantity: u64, min_lot: u64) -> Option<u64> {
    if min_lot <= 1 || quantity % min_lot == 0 {
        return None;
    }
    Some(quantity.div_ceil(min_lot) * min_lot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_lot_always_rounds_up() {
        assert_eq!(round_to_lot(13, 500), Some(500));
        assert_eq!(round_to_lot(1200, 500), Some(1500));
        assert_eq!(round_to_lot(1000, 500), None);
        assert_eq!(round_to_lot(7, 1), None);
        assert_eq!(round_to_lot(7, 0), None);
    }
}
