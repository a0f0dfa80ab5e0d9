use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::PlanningError;
use crate::types::{Position, Security, TradeSide, TransactionCostModel};

/// Serializable portfolio and market snapshot handed in by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub securities: Vec<Security>,
    #[serde(default)]
    pub current_prices: HashMap<String, f64>,
    #[serde(default)]
    pub target_weights: HashMap<String, f64>,
    /// Positions plus cash. Derived when absent.
    #[serde(default)]
    pub total_portfolio_value: Option<f64>,
    #[serde(default)]
    pub available_cash: f64,
    #[serde(default)]
    pub recently_bought: Vec<String>,
    #[serde(default)]
    pub recently_sold: Vec<String>,
    #[serde(default)]
    pub ineligible_symbols: Vec<String>,
    #[serde(default = "crate::types::default_true")]
    pub allow_buy: bool,
    #[serde(default = "crate::types::default_true")]
    pub allow_sell: bool,
    #[serde(default)]
    pub security_scores: HashMap<String, f64>,
    #[serde(default)]
    pub dividend_yields: HashMap<String, f64>,
    #[serde(default)]
    pub country_targets: HashMap<String, f64>,
    #[serde(default)]
    pub industry_targets: HashMap<String, f64>,
    #[serde(default)]
    pub country_groups: HashMap<String, String>,
    #[serde(default)]
    pub industry_groups: HashMap<String, String>,
    /// Annualised volatility per symbol, used for Monte Carlo perturbation.
    #[serde(default)]
    pub volatility: HashMap<String, f64>,
}

/// Read-only snapshot consumed by calculators, patterns and the evaluator.
///
/// Positions, securities and targets are kept in ordered maps so every
/// consumer iterates symbols in the same order.
#[derive(Debug, Clone)]
pub struct OpportunityContext {
    pub positions: BTreeMap<String, Position>,
    pub securities: BTreeMap<String, Security>,
    pub isin_index: HashMap<String, String>,
    pub current_prices: HashMap<String, f64>,
    pub target_weights: BTreeMap<String, f64>,
    pub total_portfolio_value: f64,
    pub available_cash: f64,
    pub transaction_costs: TransactionCostModel,
    pub recently_bought: HashSet<String>,
    pub recently_sold: HashSet<String>,
    pub ineligible_symbols: HashSet<String>,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub security_scores: HashMap<String, f64>,
    pub dividend_yields: HashMap<String, f64>,
    pub country_targets: HashMap<String, f64>,
    pub industry_targets: HashMap<String, f64>,
    pub country_groups: HashMap<String, String>,
    pub industry_groups: HashMap<String, String>,
    pub volatility: HashMap<String, f64>,
}

impl OpportunityContext {
    /// Validate a snapshot and build the lookup tables.
    pub fn from_snapshot(snapshot: PortfolioSnapshot) -> Result<Self, PlanningError> {
        if !snapshot.available_cash.is_finite() || snapshot.available_cash < 0.0 {
            return Err(PlanningError::InvalidContext(format!(
                "available_cash must be a non-negative number, got {}",
                snapshot.available_cash
            )));
        }

        let mut securities = BTreeMap::new();
        let mut isin_index = HashMap::new();
        for security in snapshot.securities {
            if security.symbol.is_empty() {
                return Err(PlanningError::InvalidContext(
                    "security with empty symbol".to_string(),
                ));
            }
            if let Some(isin) = &security.isin {
                isin_index.insert(isin.clone(), security.symbol.clone());
            }
            securities.insert(security.symbol.clone(), security);
        }

        let mut positions = BTreeMap::new();
        for mut position in snapshot.positions {
            if !position.quantity.is_finite() || position.quantity < 0.0 {
                return Err(PlanningError::InvalidContext(format!(
                    "position {} has invalid quantity {}",
                    position.symbol, position.quantity
                )));
            }
            if position.market_value <= 0.0 {
                if let Some(price) = snapshot.current_prices.get(&position.symbol) {
                    position.market_value = position.quantity * price;
                }
            }
            positions.insert(position.symbol.clone(), position);
        }

        let invested: f64 = positions.values().map(|p| p.market_value).sum();
        let total_portfolio_value = match snapshot.total_portfolio_value {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            Some(v) => {
                return Err(PlanningError::InvalidContext(format!(
                    "total_portfolio_value must be a non-negative number, got {}",
                    v
                )))
            }
            None => invested + snapshot.available_cash,
        };

        Ok(Self {
            positions,
            securities,
            isin_index,
            current_prices: snapshot.current_prices,
            target_weights: snapshot.target_weights.into_iter().collect(),
            total_portfolio_value,
            available_cash: snapshot.available_cash,
            transaction_costs: TransactionCostModel::default(),
            recently_bought: snapshot.recently_bought.into_iter().collect(),
            recently_sold: snapshot.recently_sold.into_iter().collect(),
            ineligible_symbols: snapshot.ineligible_symbols.into_iter().collect(),
            allow_buy: snapshot.allow_buy,
            allow_sell: snapshot.allow_sell,
            security_scores: snapshot.security_scores,
            dividend_yields: snapshot.dividend_yields,
            country_targets: snapshot.country_targets,
            industry_targets: snapshot.industry_targets,
            country_groups: snapshot.country_groups,
            industry_groups: snapshot.industry_groups,
            volatility: snapshot.volatility,
        })
    }

    pub fn with_transaction_costs(mut self, costs: TransactionCostModel) -> Self {
        self.transaction_costs = costs;
        self
    }

    pub fn security(&self, symbol: &str) -> Option<&Security> {
        self.securities.get(symbol)
    }

    pub fn security_by_isin(&self, isin: &str) -> Option<&Security> {
        self.isin_index
            .get(isin)
            .and_then(|symbol| self.securities.get(symbol))
    }

    /// Look up by symbol, falling back to ISIN.
    pub fn find_security(&self, symbol: &str, isin: Option<&str>) -> Option<&Security> {
        self.security(symbol)
            .or_else(|| isin.and_then(|i| self.security_by_isin(i)))
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Current price, only when known and positive.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.current_prices
            .get(symbol)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn position_value(&self, symbol: &str) -> f64 {
        self.position(symbol).map(|p| p.market_value).unwrap_or(0.0)
    }

    pub fn current_weight(&self, symbol: &str) -> f64 {
        if self.total_portfolio_value <= 0.0 {
            return 0.0;
        }
        self.position_value(symbol) / self.total_portfolio_value
    }

    /// Whether trading `symbol` on `side` is permitted at all: global flag,
    /// security flag, ineligibility and recent-trade cooloffs.
    pub fn can_trade(&self, symbol: &str, side: TradeSide) -> bool {
        let globally_allowed = match side {
            TradeSide::Buy => self.allow_buy,
            TradeSide::Sell => self.allow_sell,
        };
        if !globally_allowed || self.ineligible_symbols.contains(symbol) {
            return false;
        }
        let recently_traded = match side {
            TradeSide::Buy => self.recently_bought.contains(symbol),
            TradeSide::Sell => self.recently_sold.contains(symbol),
        };
        if recently_traded {
            return false;
        }
        self.security(symbol).map(|s| s.allows(side)).unwrap_or(true)
    }

    pub fn display_name(&self, symbol: &str) -> String {
        self.security(symbol)
            .map(|s| s.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.to_string())
    }

    pub fn currency_of(&self, symbol: &str) -> String {
        self.security(symbol)
            .map(|s| s.currency.clone())
            .or_else(|| self.position(symbol).map(|p| p.currency.clone()))
            .unwrap_or_else(crate::types::default_currency)
    }

    pub fn isin_of(&self, symbol: &str) -> Option<String> {
        self.security(symbol)
            .and_then(|s| s.isin.clone())
            .or_else(|| self.position(symbol).and_then(|p| p.isin.clone()))
    }
}
