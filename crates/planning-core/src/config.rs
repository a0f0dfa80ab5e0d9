use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use crate::error::PlanningError;
use crate::params::Params;
use crate::types::TransactionCostModel;

pub const DEFAULT_CALCULATORS: &[&str] = &[
    "profit_taking",
    "averaging_down",
    "opportunity_buys",
    "rebalance_sells",
    "rebalance_buys",
    "weight_based",
];

pub const DEFAULT_PATTERNS: &[&str] = &[
    "direct_buy",
    "single_best",
    "rebalance",
    "cost_optimized",
    "cash_generation",
    "opportunity_first",
    "averaging_down",
    "profit_taking",
    "deep_rebalance",
    "mixed_strategy",
    "multi_sell",
];

pub const DEFAULT_EXPANDERS: &[&str] = &["combinatorial", "partial_execution"];

/// Planner configuration. Every field has a default so partial JSON works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    // Calculator knobs
    pub min_weight_diff: f64,
    pub max_value_per_trade: f64,
    pub max_buy_positions: usize,
    pub max_sell_positions: usize,

    // Opportunity post-processing
    pub max_opportunities_per_category: usize,
    pub priority_threshold: f64,

    // Sequence generation
    pub max_combinations: usize,
    pub max_sequences: usize,
    pub max_depth: usize,
    pub single_action_only: bool,
    pub sell_first: bool,

    // Evaluation
    pub cost_penalty_factor: f64,
    pub transaction_cost_fixed: f64,
    pub transaction_cost_percent: f64,
    /// 0 means one worker per available core.
    pub evaluation_workers: usize,

    // Module selection, in execution order
    pub enabled_calculators: Vec<String>,
    pub enabled_patterns: Vec<String>,
    pub enabled_expanders: Vec<String>,
    pub module_params: BTreeMap<String, Params>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_weight_diff: 0.02,
            max_value_per_trade: 500.0,
            max_buy_positions: 5,
            max_sell_positions: 5,
            max_opportunities_per_category: 5,
            priority_threshold: 0.3,
            max_combinations: 50,
            max_sequences: 10,
            max_depth: 5,
            single_action_only: false,
            sell_first: true,
            cost_penalty_factor: 0.1,
            transaction_cost_fixed: 5.0,
            transaction_cost_percent: 0.001,
            evaluation_workers: 0,
            enabled_calculators: to_strings(DEFAULT_CALCULATORS),
            enabled_patterns: to_strings(DEFAULT_PATTERNS),
            enabled_expanders: to_strings(DEFAULT_EXPANDERS),
            module_params: BTreeMap::new(),
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            min_weight_diff: env::var("PLANNER_MIN_WEIGHT_DIFF")
                .unwrap_or_else(|_| "0.02".to_string())
                .parse()?,
            max_value_per_trade: env::var("PLANNER_MAX_VALUE_PER_TRADE")
                .unwrap_or_else(|_| "500.0".to_string())
                .parse()?,
            max_buy_positions: env::var("PLANNER_MAX_BUY_POSITIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            max_sell_positions: env::var("PLANNER_MAX_SELL_POSITIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            max_opportunities_per_category: env::var("PLANNER_MAX_OPPORTUNITIES_PER_CATEGORY")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            priority_threshold: env::var("PLANNER_PRIORITY_THRESHOLD")
                .unwrap_or_else(|_| "0.3".to_string())
                .parse()?,
            max_combinations: env::var("PLANNER_MAX_COMBINATIONS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_sequences: env::var("PLANNER_MAX_SEQUENCES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            max_depth: env::var("PLANNER_MAX_DEPTH")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            single_action_only: env::var("PLANNER_SINGLE_ACTION_ONLY")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            sell_first: env::var("PLANNER_SELL_FIRST")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            cost_penalty_factor: env::var("PLANNER_COST_PENALTY_FACTOR")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()?,
            transaction_cost_fixed: env::var("PLANNER_TRANSACTION_COST_FIXED")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()?,
            transaction_cost_percent: env::var("PLANNER_TRANSACTION_COST_PERCENT")
                .unwrap_or_else(|_| "0.001".to_string())
                .parse()?,
            evaluation_workers: env::var("PLANNER_EVALUATION_WORKERS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()?,
            enabled_calculators: list_var("PLANNER_CALCULATORS")
                .unwrap_or(defaults.enabled_calculators),
            enabled_patterns: list_var("PLANNER_PATTERNS").unwrap_or(defaults.enabled_patterns),
            enabled_expanders: list_var("PLANNER_EXPANDERS")
                .unwrap_or(defaults.enabled_expanders),
            module_params: BTreeMap::new(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlanningError> {
        self.transaction_costs().validate()?;
        if !(self.cost_penalty_factor >= 0.0) {
            return Err(PlanningError::InvalidConfig(
                "cost_penalty_factor must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_weight_diff) {
            return Err(PlanningError::InvalidConfig(format!(
                "min_weight_diff must be within [0, 1], got {}",
                self.min_weight_diff
            )));
        }
        if !(self.max_value_per_trade > 0.0) {
            return Err(PlanningError::InvalidConfig(
                "max_value_per_trade must be positive".to_string(),
            ));
        }
        if !(self.priority_threshold >= 0.0) {
            return Err(PlanningError::InvalidConfig(
                "priority_threshold must be non-negative".to_string(),
            ));
        }
        if self.max_opportunities_per_category == 0 || self.max_sequences == 0 || self.max_depth == 0
        {
            return Err(PlanningError::InvalidConfig(
                "max_opportunities_per_category, max_sequences and max_depth must be at least 1"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn transaction_costs(&self) -> TransactionCostModel {
        TransactionCostModel::new(self.transaction_cost_fixed, self.transaction_cost_percent)
    }

    /// Flat options shared by every module.
    pub fn base_params(&self) -> Params {
        Params::new()
            .with("min_weight_diff", self.min_weight_diff)
            .with("max_value_per_trade", self.max_value_per_trade)
            .with("max_buy_positions", self.max_buy_positions)
            .with("max_sell_positions", self.max_sell_positions)
            .with("max_combinations", self.max_combinations)
            .with("max_sequences", self.max_sequences)
            .with("max_depth", self.max_depth)
            .with("max_steps", self.max_depth)
            .with("single_action_only", self.single_action_only)
            .with("sell_first", self.sell_first)
    }

    /// Base options overlaid with the module's own overrides.
    pub fn params_for(&self, module: &str) -> Params {
        match self.module_params.get(module) {
            Some(overrides) => self.base_params().merged(overrides),
            None => self.base_params(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn list_var(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}
