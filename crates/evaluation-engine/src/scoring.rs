use std::collections::HashMap;

use planning_core::{ActionSequence, PortfolioContext, TransactionCostModel};

pub const GEO_WEIGHT: f64 = 0.40;
pub const INDUSTRY_WEIGHT: f64 = 0.30;
pub const QUALITY_WEIGHT: f64 = 0.30;

/// Average absolute deviation at which a sub-score reaches zero.
pub const DEVIATION_SCALE: f64 = 0.3;

const NEUTRAL: f64 = 0.5;

/// Diversification and quality of a portfolio state, in `[0, 1]`.
///
/// An empty portfolio scores 0.5.
pub fn diversification_score(portfolio: &PortfolioContext) -> f64 {
    if portfolio.total_value <= 0.0 {
        return NEUTRAL;
    }
    let geo = allocation_score(
        &portfolio.country_weights(),
        &portfolio.reference.country_targets,
    );
    let industry = allocation_score(
        &portfolio.industry_weights(),
        &portfolio.reference.industry_targets,
    );
    let quality = quality_score(portfolio);

    (geo * GEO_WEIGHT + industry * INDUSTRY_WEIGHT + quality * QUALITY_WEIGHT).clamp(0.0, 1.0)
}

/// `max(0, 1 - avg_deviation / 0.3)` over the target groups; neutral when
/// there are no targets.
pub fn allocation_score(current: &HashMap<String, f64>, targets: &HashMap<String, f64>) -> f64 {
    if targets.is_empty() {
        return NEUTRAL;
    }
    let total_deviation: f64 = targets
        .iter()
        .map(|(group, target)| (current.get(group).copied().unwrap_or(0.0) - target).abs())
        .sum();
    let avg_deviation = total_deviation / targets.len() as f64;
    (1.0 - avg_deviation / DEVIATION_SCALE).max(0.0)
}

/// Value-weighted security quality blended 60/40 with normalized dividend
/// yield. Whichever signal is present is used alone; neither gives 0.5.
pub fn quality_score(portfolio: &PortfolioContext) -> f64 {
    let reference = &portfolio.reference;
    let weighted = |table: &HashMap<String, f64>| -> Option<f64> {
        let mut covered = 0.0;
        let mut sum = 0.0;
        for (symbol, value) in &portfolio.positions {
            if let Some(v) = table.get(symbol) {
                covered += value;
                sum += v * value;
            }
        }
        (covered > 0.0).then(|| sum / covered)
    };

    let quality = weighted(&reference.security_scores).map(|q| q.clamp(0.0, 1.0));
    let dividend = weighted(&reference.dividend_yields).map(|y| (y * 10.0).clamp(0.0, 1.0));

    match (quality, dividend) {
        (Some(q), Some(d)) => q * 0.6 + d * 0.4,
        (Some(q), None) => q,
        (None, Some(d)) => d,
        (None, None) => NEUTRAL,
    }
}

/// `Σ(fixed + percent * |value|)` over all actions.
pub fn transaction_cost(sequence: &ActionSequence, costs: &TransactionCostModel) -> f64 {
    sequence.actions.iter().map(|a| costs.cost_for(a.value)).sum()
}

/// Diversification minus the cost penalty, capped at 1 and floored at 0
/// whenever a penalty applies.
pub fn final_score(
    diversification: f64,
    total_cost: f64,
    end_total_value: f64,
    cost_penalty_factor: f64,
) -> f64 {
    let mut score = diversification;
    if cost_penalty_factor > 0.0 && end_total_value > 0.0 {
        score = (score - cost_penalty_factor * (total_cost / end_total_value)).max(0.0);
    }
    score.min(1.0)
}
