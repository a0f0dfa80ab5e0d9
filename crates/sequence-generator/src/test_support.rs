use planning_core::{ActionCandidate, OpportunitiesByCategory, OpportunityCategory, TradeSide};

pub fn candidate(symbol: &str, side: TradeSide, priority: f64, value: f64) -> ActionCandidate {
    ActionCandidate {
        side,
        symbol: symbol.to_string(),
        isin: None,
        name: symbol.to_string(),
        quantity: 1,
        price: value,
        value,
        currency: "EUR".to_string(),
        priority,
        reason: String::new(),
        tags: vec![],
    }
}

pub fn grouped(entries: Vec<(OpportunityCategory, Vec<ActionCandidate>)>) -> OpportunitiesByCategory {
    entries.into_iter().collect()
}
