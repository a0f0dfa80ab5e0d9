use planning_core::{
    OpportunityContext, PortfolioSnapshot, Position, Security, TransactionCostModel,
};
use std::collections::HashMap;

pub fn position(symbol: &str, quantity: f64, average_cost: f64, market_value: f64) -> Position {
    Position {
        symbol: symbol.to_string(),
        isin: None,
        quantity,
        average_cost,
        market_value,
        currency: "EUR".to_string(),
    }
}

pub fn security(symbol: &str, country: Option<&str>) -> Security {
    let mut sec = Security::new(symbol);
    sec.country = country.map(String::from);
    sec
}

pub fn base_snapshot(cash: f64) -> PortfolioSnapshot {
    PortfolioSnapshot {
        available_cash: cash,
        allow_buy: true,
        allow_sell: true,
        ..Default::default()
    }
}

pub fn context(cash: f64, costs: TransactionCostModel) -> OpportunityContext {
    build(base_snapshot(cash), costs)
}

pub fn build(snapshot: PortfolioSnapshot, costs: TransactionCostModel) -> OpportunityContext {
    OpportunityContext::from_snapshot(snapshot)
        .unwrap()
        .with_transaction_costs(costs)
}

pub fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}
