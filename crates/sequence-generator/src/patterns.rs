//! Built-in sequence patterns.

use std::cmp::Ordering;
use std::sync::Arc;

use planning_core::{
    ActionCandidate, ActionSequence, OpportunitiesByCategory, OpportunityCategory, Params,
    PlanningError, TradeSide,
};

use crate::pattern::{
    all_candidates, by_side, from_categories, owned, rank_by_priority, single_action_sequences,
    unique_symbols, PatternGenerator,
};
use crate::registry::NamedRegistry;

const REBALANCE_SELL_SOURCES: &[OpportunityCategory] = &[
    OpportunityCategory::RebalanceSells,
    OpportunityCategory::WeightBased,
];
const REBALANCE_BUY_SOURCES: &[OpportunityCategory] = &[
    OpportunityCategory::RebalanceBuys,
    OpportunityCategory::WeightBased,
];

fn max_sequences(params: &Params) -> usize {
    params.get_usize("max_sequences", 10)
}

fn max_depth(params: &Params) -> usize {
    params.get_usize("max_depth", 5).max(1)
}

/// One single-action sequence per BUY candidate.
#[derive(Debug, Default)]
pub struct DirectBuyPattern;

impl PatternGenerator for DirectBuyPattern {
    fn name(&self) -> &'static str {
        "direct_buy"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let buys = by_side(opportunities, TradeSide::Buy);
        Ok(single_action_sequences(&buys, self.name(), max_sequences(params)))
    }
}

/// The single highest-priority candidate; ties go to the first seen.
#[derive(Debug, Default)]
pub struct SingleBestPattern;

impl PatternGenerator for SingleBestPattern {
    fn name(&self) -> &'static str {
        "single_best"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        _params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let mut best: Option<&ActionCandidate> = None;
        for candidate in all_candidates(opportunities) {
            match best {
                Some(b) if candidate.priority <= b.priority => {}
                _ => best = Some(candidate),
            }
        }
        Ok(best
            .map(|c| vec![ActionSequence::new(vec![c.clone()], self.name())])
            .unwrap_or_default())
    }
}

/// Sell-only, buy-only and paired rebalance sequences.
#[derive(Debug, Default)]
pub struct RebalancePattern;

impl PatternGenerator for RebalancePattern {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let limit = max_sequences(params);
        let sell_first = params.get_bool("sell_first", true);
        let sells = from_categories(opportunities, REBALANCE_SELL_SOURCES, TradeSide::Sell);
        let buys = from_categories(opportunities, REBALANCE_BUY_SOURCES, TradeSide::Buy);

        let mut out = single_action_sequences(&sells, self.name(), limit);
        out.extend(single_action_sequences(&buys, self.name(), limit));

        let mut paired = 0;
        'outer: for sell in &sells {
            for buy in &buys {
                if paired >= limit {
                    break 'outer;
                }
                if sell.symbol == buy.symbol {
                    continue;
                }
                let actions = if sell_first {
                    vec![(*sell).clone(), (*buy).clone()]
                } else {
                    vec![(*buy).clone(), (*sell).clone()]
                };
                out.push(ActionSequence::new(actions, self.name()));
                paired += 1;
            }
        }
        Ok(out)
    }
}

/// Top-N candidates by absolute trade value in one sequence.
#[derive(Debug, Default)]
pub struct CostOptimizedPattern;

impl PatternGenerator for CostOptimizedPattern {
    fn name(&self) -> &'static str {
        "cost_optimized"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let top_n = params.get_usize("top_n", max_depth(params));
        let mut candidates = unique_symbols(all_candidates(opportunities));
        candidates.sort_by(|a, b| {
            b.value
                .abs()
                .partial_cmp(&a.value.abs())
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(top_n);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(owned(&candidates), self.name())])
    }
}

/// Top-N SELL candidates in one sequence.
#[derive(Debug, Default)]
pub struct CashGenerationPattern;

impl PatternGenerator for CashGenerationPattern {
    fn name(&self) -> &'static str {
        "cash_generation"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let top_n = params.get_usize("top_n", max_depth(params));
        let mut sells = unique_symbols(by_side(opportunities, TradeSide::Sell));
        rank_by_priority(&mut sells);
        sells.truncate(top_n);
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(owned(&sells), self.name())])
    }
}

/// Single-action sequences from one category, ranked by priority.
#[derive(Debug)]
pub struct CategoryFirstPattern {
    name: &'static str,
    category: OpportunityCategory,
}

impl CategoryFirstPattern {
    pub fn opportunity_first() -> Self {
        Self {
            name: "opportunity_first",
            category: OpportunityCategory::OpportunityBuys,
        }
    }

    pub fn averaging_down() -> Self {
        Self {
            name: "averaging_down",
            category: OpportunityCategory::AveragingDown,
        }
    }

    pub fn profit_taking() -> Self {
        Self {
            name: "profit_taking",
            category: OpportunityCategory::ProfitTaking,
        }
    }
}

impl PatternGenerator for CategoryFirstPattern {
    fn name(&self) -> &'static str {
        self.name
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let Some(candidates) = opportunities.get(&self.category) else {
            return Ok(Vec::new());
        };
        let mut ranked: Vec<_> = candidates.iter().collect();
        rank_by_priority(&mut ranked);
        Ok(single_action_sequences(&ranked, self.name, max_sequences(params)))
    }
}

/// Up to `max_depth` rebalance sells followed by up to `max_depth` buys.
#[derive(Debug, Default)]
pub struct DeepRebalancePattern;

impl PatternGenerator for DeepRebalancePattern {
    fn name(&self) -> &'static str {
        "deep_rebalance"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let depth = max_depth(params);
        let mut sells = unique_symbols(from_categories(
            opportunities,
            REBALANCE_SELL_SOURCES,
            TradeSide::Sell,
        ));
        let mut buys = unique_symbols(from_categories(
            opportunities,
            REBALANCE_BUY_SOURCES,
            TradeSide::Buy,
        ));
        rank_by_priority(&mut sells);
        rank_by_priority(&mut buys);
        sells.truncate(depth);
        buys.truncate(depth);
        if sells.is_empty() || buys.is_empty() {
            return Ok(Vec::new());
        }
        let mut actions = owned(&sells);
        actions.extend(owned(&buys));
        Ok(vec![ActionSequence::new(actions, self.name())])
    }
}

/// The best candidate of each non-empty category, sells first.
#[derive(Debug, Default)]
pub struct MixedStrategyPattern;

impl PatternGenerator for MixedStrategyPattern {
    fn name(&self) -> &'static str {
        "mixed_strategy"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let mut picks = Vec::new();
        for candidates in opportunities.values() {
            let mut ranked: Vec<_> = candidates.iter().collect();
            rank_by_priority(&mut ranked);
            if let Some(best) = ranked.first() {
                picks.push(*best);
            }
        }
        let mut picks = unique_symbols(picks);
        picks.truncate(max_depth(params));
        if picks.len() < 2 {
            return Ok(Vec::new());
        }
        let (sells, buys): (Vec<_>, Vec<_>) =
            picks.into_iter().partition(|c| c.side == TradeSide::Sell);
        let mut actions = owned(&sells);
        actions.extend(owned(&buys));
        Ok(vec![ActionSequence::new(actions, self.name())])
    }
}

/// Every SELL candidate, up to `max_depth`, in one sequence.
#[derive(Debug, Default)]
pub struct MultiSellPattern;

impl PatternGenerator for MultiSellPattern {
    fn name(&self) -> &'static str {
        "multi_sell"
    }

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError> {
        let mut sells = unique_symbols(by_side(opportunities, TradeSide::Sell));
        rank_by_priority(&mut sells);
        sells.truncate(max_depth(params));
        if sells.len() < 2 {
            return Ok(Vec::new());
        }
        Ok(vec![ActionSequence::new(owned(&sells), self.name())])
    }
}

/// Build a registry holding every built-in pattern.
pub fn default_patterns() -> NamedRegistry<dyn PatternGenerator> {
    let registry: NamedRegistry<dyn PatternGenerator> = NamedRegistry::new("pattern");
    let patterns: Vec<Arc<dyn PatternGenerator>> = vec![
        Arc::new(DirectBuyPattern),
        Arc::new(SingleBestPattern),
        Arc::new(RebalancePattern),
        Arc::new(CostOptimizedPattern),
        Arc::new(CashGenerationPattern),
        Arc::new(CategoryFirstPattern::opportunity_first()),
        Arc::new(CategoryFirstPattern::averaging_down()),
        Arc::new(CategoryFirstPattern::profit_taking()),
        Arc::new(DeepRebalancePattern),
        Arc::new(MixedStrategyPattern),
        Arc::new(MultiSellPattern),
    ];
    for pattern in patterns {
        registry.register(pattern.name(), pattern);
    }
    registry
}
