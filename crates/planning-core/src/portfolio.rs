use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::context::OpportunityContext;
use crate::types::TransactionCostModel;

/// Static lookup tables shared by every simulated portfolio state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringReference {
    pub country_targets: HashMap<String, f64>,
    pub industry_targets: HashMap<String, f64>,
    pub security_countries: HashMap<String, String>,
    pub security_industries: HashMap<String, String>,
    pub country_groups: HashMap<String, String>,
    pub industry_groups: HashMap<String, String>,
    pub security_scores: HashMap<String, f64>,
    pub dividend_yields: HashMap<String, f64>,
}

impl ScoringReference {
    pub fn from_context(ctx: &OpportunityContext) -> Self {
        let mut security_countries = HashMap::new();
        let mut security_industries = HashMap::new();
        for sec in ctx.securities.values() {
            if let Some(country) = &sec.country {
                security_countries.insert(sec.symbol.clone(), country.clone());
            }
            if let Some(industry) = &sec.industry {
                security_industries.insert(sec.symbol.clone(), industry.clone());
            }
        }
        Self {
            country_targets: ctx.country_targets.clone(),
            industry_targets: ctx.industry_targets.clone(),
            security_countries,
            security_industries,
            country_groups: ctx.country_groups.clone(),
            industry_groups: ctx.industry_groups.clone(),
            security_scores: ctx.security_scores.clone(),
            dividend_yields: ctx.dividend_yields.clone(),
        }
    }
}

/// Aggregated valuation state used for scoring.
///
/// Each simulation step produces a new instance; the reference tables are
/// shared behind an `Arc` so copies only duplicate the position values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    /// Symbol -> market value in base currency.
    pub positions: BTreeMap<String, f64>,
    /// Positions plus cash.
    pub total_value: f64,
    pub reference: Arc<ScoringReference>,
}

impl PortfolioContext {
    pub fn from_opportunity_context(ctx: &OpportunityContext) -> Self {
        let positions = ctx
            .positions
            .values()
            .filter(|p| p.market_value > 0.0)
            .map(|p| (p.symbol.clone(), p.market_value))
            .collect();
        Self {
            positions,
            total_value: ctx.total_portfolio_value,
            reference: Arc::new(ScoringReference::from_context(ctx)),
        }
    }

    pub fn value_of(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn invested_value(&self) -> f64 {
        self.positions.values().sum()
    }

    pub fn country_weights(&self) -> HashMap<String, f64> {
        group_weights(
            &self.positions,
            self.total_value,
            &self.reference.security_countries,
            &self.reference.country_groups,
        )
    }

    pub fn industry_weights(&self) -> HashMap<String, f64> {
        group_weights(
            &self.positions,
            self.total_value,
            &self.reference.security_industries,
            &self.reference.industry_groups,
        )
    }
}

pub const OTHER_GROUP: &str = "OTHER";

/// Resolve the group a country or industry belongs to.
///
/// With no mapping the value is its own group; with a mapping, unmapped
/// values fall into `OTHER`. A missing value is always `OTHER`.
pub fn resolve_group(value: Option<&str>, mapping: &HashMap<String, String>) -> String {
    match value {
        None => OTHER_GROUP.to_string(),
        Some(v) if mapping.is_empty() => v.to_string(),
        Some(v) => mapping
            .get(v)
            .cloned()
            .unwrap_or_else(|| OTHER_GROUP.to_string()),
    }
}

/// Current weight of each group, given symbol values and a symbol -> value
/// (country or industry) assignment.
pub fn group_weights(
    positions: &BTreeMap<String, f64>,
    total_value: f64,
    assignments: &HashMap<String, String>,
    mapping: &HashMap<String, String>,
) -> HashMap<String, f64> {
    let mut weights = HashMap::new();
    if total_value <= 0.0 {
        return weights;
    }
    for (symbol, value) in positions {
        let group = resolve_group(assignments.get(symbol).map(String::as_str), mapping);
        *weights.entry(group).or_insert(0.0) += value / total_value;
    }
    weights
}

/// Stable digest of the portfolio state a plan was computed against.
///
/// Covers positions, cash, target weights and prices; symbols are sorted so the
/// digest does not depend on input order.
pub fn portfolio_hash(ctx: &OpportunityContext) -> String {
    let mut hasher = Sha256::new();
    for position in ctx.positions.values() {
        hasher.update(
            format!(
                "{}:{}:{}|",
                position.symbol, position.quantity, position.market_value
            )
            .as_bytes(),
        );
    }
    hasher.update(format!("cash:{}|", ctx.available_cash).as_bytes());
    for (symbol, weight) in &ctx.target_weights {
        hasher.update(format!("target:{}:{}|", symbol, weight).as_bytes());
    }
    let mut prices: Vec<_> = ctx.current_prices.iter().collect();
    prices.sort_by(|a, b| a.0.cmp(b.0));
    for (symbol, price) in prices {
        hasher.update(format!("price:{}:{}|", symbol, price).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Cache key for evaluation results: the portfolio hash combined with every
/// other input that changes a score (starting valuation, scoring reference
/// tables, transaction costs and the cost penalty factor).
pub fn evaluation_key(
    portfolio_hash: &str,
    start: &PortfolioContext,
    costs: &TransactionCostModel,
    cost_penalty_factor: f64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("portfolio:{}|", portfolio_hash).as_bytes());
    hasher.update(format!("total:{}|", start.total_value).as_bytes());
    hasher.update(format!("costs:{}:{}|", costs.fixed, costs.percent).as_bytes());
    hasher.update(format!("penalty:{}|", cost_penalty_factor).as_bytes());

    let reference = &start.reference;
    update_sorted(&mut hasher, "country_target", &reference.country_targets);
    update_sorted(&mut hasher, "industry_target", &reference.industry_targets);
    update_sorted(&mut hasher, "country", &reference.security_countries);
    update_sorted(&mut hasher, "industry", &reference.security_industries);
    update_sorted(&mut hasher, "country_group", &reference.country_groups);
    update_sorted(&mut hasher, "industry_group", &reference.industry_groups);
    update_sorted(&mut hasher, "score", &reference.security_scores);
    update_sorted(&mut hasher, "yield", &reference.dividend_yields);
    hex::encode(hasher.finalize())
}

fn update_sorted<V: std::fmt::Display>(
    hasher: &mut Sha256,
    label: &str,
    map: &HashMap<String, V>,
) {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in entries {
        hasher.update(format!("{}:{}:{}|", label, key, value).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PortfolioSnapshot;
    use crate::types::Position;

    fn ctx(cash: f64) -> OpportunityContext {
        OpportunityContext::from_snapshot(PortfolioSnapshot {
            positions: vec![Position {
                symbol: "AAA".to_string(),
                isin: None,
                quantity: 2.0,
                average_cost: 10.0,
                market_value: 20.0,
                currency: "EUR".to_string(),
            }],
            available_cash: cash,
            allow_buy: true,
            allow_sell: true,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_portfolio_hash_is_stable() {
        assert_eq!(portfolio_hash(&ctx(100.0)), portfolio_hash(&ctx(100.0)));
        assert_ne!(portfolio_hash(&ctx(100.0)), portfolio_hash(&ctx(101.0)));
        assert_eq!(portfolio_hash(&ctx(1.0)).len(), 64);
    }

    #[test]
    fn test_evaluation_key_tracks_costs_and_reference() {
        let opportunity = ctx(100.0);
        let hash = portfolio_hash(&opportunity);
        let start = PortfolioContext::from_opportunity_context(&opportunity);
        let zero = TransactionCostModel::new(0.0, 0.0);

        let base = evaluation_key(&hash, &start, &zero, 0.0);
        assert_eq!(base, evaluation_key(&hash, &start, &zero, 0.0));
        assert_ne!(
            base,
            evaluation_key(&hash, &start, &TransactionCostModel::new(400.0, 0.0), 0.0)
        );
        assert_ne!(base, evaluation_key(&hash, &start, &zero, 1.0));

        let mut scored = start.clone();
        scored.reference = Arc::new(ScoringReference {
            security_scores: HashMap::from([("AAA".to_string(), 0.9)]),
            ..ScoringReference::default()
        });
        assert_ne!(base, evaluation_key(&hash, &scored, &zero, 0.0));
    }

    #[test]
    fn test_resolve_group_mapping_rules() {
        let empty = HashMap::new();
        assert_eq!(resolve_group(Some("US"), &empty), "US");
        assert_eq!(resolve_group(None, &empty), OTHER_GROUP);
        let mapping = HashMap::from([("US".to_string(), "NORTH_AMERICA".to_string())]);
        assert_eq!(resolve_group(Some("US"), &mapping), "NORTH_AMERICA");
        assert_eq!(resolve_group(Some("DE"), &mapping), OTHER_GROUP);
    }

    #[test]
    fn test_group_weights_aggregate_by_group() {
        let positions = BTreeMap::from([("A".to_string(), 30.0), ("B".to_string(), 20.0)]);
        let assignments = HashMap::from([
            ("A".to_string(), "US".to_string()),
            ("B".to_string(), "US".to_string()),
        ]);
        let weights = group_weights(&positions, 100.0, &assignments, &HashMap::new());
        assert_eq!(weights.get("US"), Some(&0.5));
    }

    #[test]
    fn test_portfolio_context_totals() {
        let pc = PortfolioContext::from_opportunity_context(&ctx(80.0));
        assert_eq!(pc.value_of("AAA"), 20.0);
        assert_eq!(pc.total_value, 100.0);
        assert_eq!(pc.invested_value(), 20.0);
    }
}
