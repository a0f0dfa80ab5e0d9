use std::cmp::Ordering;
use std::collections::HashSet;

use planning_core::{
    ActionCandidate, ActionSequence, OpportunitiesByCategory, OpportunityCategory, Params,
    PlanningError, TradeSide,
};

/// Assembles grouped candidates into ordered action sequences.
pub trait PatternGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        opportunities: &OpportunitiesByCategory,
        params: &Params,
    ) -> Result<Vec<ActionSequence>, PlanningError>;
}

/// Every candidate across categories, in category then list order.
pub fn all_candidates(opportunities: &OpportunitiesByCategory) -> Vec<&ActionCandidate> {
    opportunities.values().flatten().collect()
}

pub fn by_side(opportunities: &OpportunitiesByCategory, side: TradeSide) -> Vec<&ActionCandidate> {
    opportunities
        .values()
        .flatten()
        .filter(|c| c.side == side)
        .collect()
}

pub fn from_categories<'a>(
    opportunities: &'a OpportunitiesByCategory,
    categories: &[OpportunityCategory],
    side: TradeSide,
) -> Vec<&'a ActionCandidate> {
    categories
        .iter()
        .filter_map(|cat| opportunities.get(cat))
        .flatten()
        .filter(|c| c.side == side)
        .collect()
}

/// Stable, highest priority first.
pub fn rank_by_priority(candidates: &mut [&ActionCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
    });
}

/// Keep the first candidate seen for each symbol.
pub fn unique_symbols<'a>(candidates: Vec<&'a ActionCandidate>) -> Vec<&'a ActionCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.symbol.as_str()))
        .collect()
}

pub fn single_action_sequences(
    candidates: &[&ActionCandidate],
    pattern_type: &str,
    limit: usize,
) -> Vec<ActionSequence> {
    candidates
        .iter()
        .take(limit)
        .map(|c| ActionSequence::new(vec![(*c).clone()], pattern_type))
        .collect()
}

pub fn owned(candidates: &[&ActionCandidate]) -> Vec<ActionCandidate> {
    candidates.iter().map(|c| (*c).clone()).collect()
}
