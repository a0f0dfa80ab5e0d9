use std::sync::Arc;

use planning_core::{
    ActionCandidate, OpportunitiesByCategory, OpportunityContext, PlannerConfig, PlanningError,
    RejectedOpportunity,
};
use tracing::{debug, info, warn};

use crate::calculator::sort_by_priority;
use crate::registry::CalculatorRegistry;

/// Candidates that survived post-processing plus the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct OpportunityReport {
    pub by_category: OpportunitiesByCategory,
    pub rejected: Vec<RejectedOpportunity>,
}

impl OpportunityReport {
    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn all_candidates(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.by_category.values().flatten()
    }
}

/// Runs the enabled calculators and post-processes their output.
pub struct OpportunityService {
    registry: Arc<CalculatorRegistry>,
}

impl OpportunityService {
    pub fn new(registry: Arc<CalculatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CalculatorRegistry {
        &self.registry
    }

    /// Discover candidates grouped by category.
    ///
    /// A failing calculator is logged and skipped. Each category is then
    /// capped to `max_opportunities_per_category` by priority (stable), and
    /// candidates below `priority_threshold` are dropped. Empty categories
    /// are removed.
    pub fn identify(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfig,
    ) -> Result<OpportunityReport, PlanningError> {
        let calculators = self.registry.enabled(&config.enabled_calculators)?;
        let mut by_category = OpportunitiesByCategory::new();

        for calculator in calculators {
            let params = config.params_for(calculator.name());
            match calculator.calculate(ctx, &params) {
                Ok(candidates) => {
                    debug!(
                        calculator = calculator.name(),
                        count = candidates.len(),
                        "Calculator finished"
                    );
                    if !candidates.is_empty() {
                        by_category
                            .entry(calculator.category())
                            .or_default()
                            .extend(candidates);
                    }
                }
                Err(e) => {
                    warn!(calculator = calculator.name(), error = %e, "Calculator failed, skipping");
                }
            }
        }

        let report = post_process(
            by_category,
            config.max_opportunities_per_category,
            config.priority_threshold,
        );
        info!(
            categories = report.by_category.len(),
            candidates = report.total(),
            rejected = report.rejected.len(),
            "Opportunities identified"
        );
        Ok(report)
    }
}

/// Apply the per-category cap and the priority threshold.
pub fn post_process(
    by_category: OpportunitiesByCategory,
    max_per_category: usize,
    priority_threshold: f64,
) -> OpportunityReport {
    let mut report = OpportunityReport::default();
    for (category, mut candidates) in by_category {
        sort_by_priority(&mut candidates);
        let overflow = if candidates.len() > max_per_category {
            candidates.split_off(max_per_category)
        } else {
            Vec::new()
        };
        for c in overflow {
            report.rejected.push(rejection(&c, category.as_str(), "category_cap"));
        }

        let (kept, below): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|c| c.priority >= priority_threshold);
        for c in below {
            report
                .rejected
                .push(rejection(&c, category.as_str(), "below_priority_threshold"));
        }
        if !kept.is_empty() {
            report.by_category.insert(category, kept);
        }
    }
    report
}

fn rejection(candidate: &ActionCandidate, category: &str, reason: &str) -> RejectedOpportunity {
    RejectedOpportunity {
        symbol: candidate.symbol.clone(),
        side: candidate.side,
        category: category.to_string(),
        priority: candidate.priority,
        reason: reason.to_string(),
    }
}
