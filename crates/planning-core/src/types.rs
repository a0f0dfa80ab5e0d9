use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Direction of a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of opportunity categories a calculator can report under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityCategory {
    ProfitTaking,
    AveragingDown,
    OpportunityBuys,
    RebalanceSells,
    RebalanceBuys,
    WeightBased,
}

impl OpportunityCategory {
    pub const ALL: [OpportunityCategory; 6] = [
        OpportunityCategory::ProfitTaking,
        OpportunityCategory::AveragingDown,
        OpportunityCategory::OpportunityBuys,
        OpportunityCategory::RebalanceSells,
        OpportunityCategory::RebalanceBuys,
        OpportunityCategory::WeightBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityCategory::ProfitTaking => "profit_taking",
            OpportunityCategory::AveragingDown => "averaging_down",
            OpportunityCategory::OpportunityBuys => "opportunity_buys",
            OpportunityCategory::RebalanceSells => "rebalance_sells",
            OpportunityCategory::RebalanceBuys => "rebalance_buys",
            OpportunityCategory::WeightBased => "weight_based",
        }
    }
}

impl fmt::Display for OpportunityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidates grouped by category. Iteration follows category declaration order.
pub type OpportunitiesByCategory = BTreeMap<OpportunityCategory, Vec<ActionCandidate>>;

/// Reference data for a tradable instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
    #[serde(default = "default_min_lot")]
    pub min_lot: u64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

impl Security {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            isin: None,
            name: symbol.to_string(),
            currency: default_currency(),
            allow_buy: true,
            allow_sell: true,
            min_lot: 1,
            country: None,
            industry: None,
        }
    }

    pub fn allows(&self, side: TradeSide) -> bool {
        match side {
            TradeSide::Buy => self.allow_buy,
            TradeSide::Sell => self.allow_sell,
        }
    }
}

/// A holding in the portfolio snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(default)]
    pub isin: Option<String>,
    pub quantity: f64,
    #[serde(default)]
    pub average_cost: f64,
    #[serde(default)]
    pub market_value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Position {
    /// Fractional gain over average cost, if the cost basis is known.
    pub fn gain_at(&self, price: f64) -> Option<f64> {
        if self.average_cost > 0.0 && price > 0.0 {
            Some((price - self.average_cost) / self.average_cost)
        } else {
            None
        }
    }
}

/// A single proposed trade. Created once by a calculator and copied into sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub side: TradeSide,
    pub symbol: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub name: String,
    pub quantity: u64,
    pub price: f64,
    /// Gross trade value in base currency (`quantity * price`).
    pub value: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub priority: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ActionCandidate {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.side == TradeSide::Sell
    }
}

/// Fixed plus percentage transaction cost model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionCostModel {
    pub fixed: f64,
    pub percent: f64,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self {
            fixed: 5.0,
            percent: 0.001,
        }
    }
}

impl TransactionCostModel {
    pub fn new(fixed: f64, percent: f64) -> Self {
        Self { fixed, percent }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Cost of a single trade of the given value.
    pub fn cost_for(&self, value: f64) -> f64 {
        self.fixed + self.percent * value.abs()
    }

    pub fn validate(&self) -> Result<(), crate::PlanningError> {
        if !(self.fixed >= 0.0) {
            return Err(crate::PlanningError::NegativeCost("transaction_cost_fixed"));
        }
        if !(self.percent >= 0.0) {
            return Err(crate::PlanningError::NegativeCost("transaction_cost_percent"));
        }
        Ok(())
    }
}

pub(crate) fn default_currency() -> String {
    "EUR".to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_min_lot() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"BUY\"");
        let side: TradeSide = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(side, TradeSide::Sell);
    }

    #[test]
    fn test_category_order_is_declaration_order() {
        let mut by_cat = OpportunitiesByCategory::new();
        by_cat.insert(OpportunityCategory::WeightBased, vec![]);
        by_cat.insert(OpportunityCategory::ProfitTaking, vec![]);
        let keys: Vec<_> = by_cat.keys().copied().collect();
        assert_eq!(
            keys,
            vec![OpportunityCategory::ProfitTaking, OpportunityCategory::WeightBased]
        );
    }

    #[test]
    fn test_cost_model_uses_absolute_value() {
        let model = TransactionCostModel::new(2.0, 0.01);
        assert_eq!(model.cost_for(-100.0), 3.0);
        assert_eq!(model.cost_for(100.0), 3.0);
    }

    #[test]
    fn test_cost_model_rejects_negative_fields() {
        assert!(TransactionCostModel::new(-1.0, 0.0).validate().is_err());
        assert!(TransactionCostModel::new(0.0, -0.1).validate().is_err());
        assert!(TransactionCostModel::zero().validate().is_ok());
    }

    #[test]
    fn test_security_defaults_from_json() {
        let sec: Security = serde_json::from_str(r#"{"symbol":"ABC"}"#).unwrap();
        assert!(sec.allow_buy && sec.allow_sell);
        assert_eq!(sec.min_lot, 1);
    }
}
