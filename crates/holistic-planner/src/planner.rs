use std::cmp::Ordering;
use std::sync::Arc;

use evaluation_engine::{
    evaluate_sequence, CancellationToken, EvaluationCache, EvaluationContext, EvaluationService,
};
use opportunity_calculators::{default_registry, OpportunityReport, OpportunityService};
use planning_core::{
    portfolio_hash, ActionSequence, HolisticPlan, HolisticStep, OpportunityContext, PlanOutcome,
    PlannerConfig, PlanningError, PortfolioSnapshot, RejectedOpportunity, RejectedSequence,
    SequenceEvaluationResult, TradeSide, MAX_BATCH_SEQUENCES,
};
use sequence_generator::SequenceService;
use tracing::{debug, info, warn};

use crate::constraints::ConstraintEnforcer;
use crate::lifecycle::SequenceStage;

/// Cap on each diagnostics list carried by a [`PlanOutcome`].
pub const MAX_REJECTED_ENTRIES: usize = 100;

const FILTERED_BY_CONSTRAINTS: &str = "filtered_by_constraints";
const INFEASIBLE_AFTER_CONSTRAINTS: &str = "infeasible_after_constraints";

/// Orchestrates calculators, sequence generation, evaluation, selection and
/// constraint enforcement into a single plan.
pub struct HolisticPlanner {
    opportunities: OpportunityService,
    sequences: SequenceService,
    evaluation: EvaluationService,
    cache: Option<Arc<EvaluationCache>>,
}

impl HolisticPlanner {
    /// Planner with the default calculator, pattern and expander registries.
    pub fn new(evaluation_workers: usize) -> Result<Self, PlanningError> {
        Ok(Self::with_services(
            OpportunityService::new(Arc::new(default_registry())),
            SequenceService::default(),
            EvaluationService::new(evaluation_workers)?,
        ))
    }

    pub fn from_config(config: &PlannerConfig) -> Result<Self, PlanningError> {
        Self::new(config.evaluation_workers)
    }

    pub fn with_services(
        opportunities: OpportunityService,
        sequences: SequenceService,
        evaluation: EvaluationService,
    ) -> Self {
        Self {
            opportunities,
            sequences,
            evaluation,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<EvaluationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn create_plan_from_snapshot(
        &self,
        snapshot: PortfolioSnapshot,
        config: &PlannerConfig,
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, PlanningError> {
        let ctx = OpportunityContext::from_snapshot(snapshot)?;
        self.create_plan(&ctx, config, cancel)
    }

    /// Run the full pipeline and return the best plan with diagnostics.
    ///
    /// No opportunities, no feasible sequence, or no candidate surviving
    /// constraint enforcement all produce a plan with zero steps rather
    /// than an error.
    pub fn create_plan(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfig,
        cancel: &CancellationToken,
    ) -> Result<PlanOutcome, PlanningError> {
        config.validate()?;
        let costs = config.transaction_costs();
        let ctx = Arc::new(ctx.clone().with_transaction_costs(costs));
        let hash = portfolio_hash(&ctx);
        let eval_ctx = EvaluationContext::new(Arc::clone(&ctx), config.cost_penalty_factor);
        let current_score = eval_ctx.current_score();

        info!(
            portfolio_hash = %hash,
            positions = ctx.positions.len(),
            cash = ctx.available_cash,
            "Creating holistic plan"
        );

        let report = self.opportunities.identify(&ctx, config)?;
        if report.total() == 0 {
            info!("No opportunities identified, returning empty plan");
            return Ok(empty_outcome(hash, current_score, &report));
        }

        let mut sequences = self.sequences.generate(&report.by_category, config)?;
        if sequences.is_empty() {
            info!("No sequences generated, returning empty plan");
            return Ok(empty_outcome(hash, current_score, &report));
        }
        if sequences.len() > MAX_BATCH_SEQUENCES {
            warn!(
                generated = sequences.len(),
                max = MAX_BATCH_SEQUENCES,
                "Too many sequences, truncating"
            );
            sequences.truncate(MAX_BATCH_SEQUENCES);
        }

        let response = match &self.cache {
            Some(cache) => self
                .evaluation
                .batch_evaluate_cached(cache, &eval_ctx, &sequences, cancel)?,
            None => self.evaluation.batch_evaluate(&eval_ctx, &sequences, cancel)?,
        };
        for error in &response.errors {
            warn!(error = %error, "Sequence evaluation error");
        }
        let results = response.results;
        let ranked = rank_feasible(&results);
        let feasible_count = ranked.len();

        if ranked.is_empty() {
            info!(
                sequences = results.len(),
                "No feasible sequence, returning empty plan"
            );
            let mut outcome = empty_outcome(hash, current_score, &report);
            outcome.plan.feasible = false;
            outcome.plan.sequences_evaluated = results.len();
            outcome.rejected_sequences = rejected_sequences(&results, None, &[]);
            return Ok(outcome);
        }

        // Walk candidates best-first until one survives constraint
        // enforcement and is still feasible with adjusted quantities.
        let enforcer = ConstraintEnforcer::new(&ctx);
        let mut dropped: Vec<(usize, &'static str)> = Vec::new();
        let mut top_filtered = None;
        let mut chosen = None;
        for &index in &ranked {
            let candidate = &results[index];
            let stage = SequenceStage::Generated
                .advance(SequenceStage::Evaluated)?
                .advance(SequenceStage::Selected)?;
            debug!(
                sequence_hash = %candidate.sequence.sequence_hash,
                pattern = %candidate.sequence.pattern_type,
                score = candidate.score,
                stage = %stage,
                "Sequence selected"
            );

            let enforced = enforcer.enforce(&candidate.sequence);
            let stage = stage.advance(SequenceStage::ConstraintAdjusted)?;
            if enforced.sequence.is_empty() {
                if top_filtered.is_none() {
                    top_filtered = Some(enforced.filtered);
                }
                dropped.push((index, FILTERED_BY_CONSTRAINTS));
                continue;
            }

            // Adjusted quantities change cash flow and end state, so re-score.
            let adjusted = if enforced.changed() {
                evaluate_sequence(&enforced.sequence, &eval_ctx, None)
            } else {
                candidate.clone()
            };
            if !adjusted.feasible {
                debug!(
                    sequence_hash = %candidate.sequence.sequence_hash,
                    reason = adjusted.infeasible_reason.as_deref().unwrap_or_default(),
                    "Sequence infeasible after constraint adjustment"
                );
                dropped.push((index, INFEASIBLE_AFTER_CONSTRAINTS));
                continue;
            }

            let stage = stage.advance(SequenceStage::Finalized)?;
            chosen = Some((index, adjusted, enforced.filtered, stage));
            break;
        }

        let Some((best, final_result, filtered, stage)) = chosen else {
            let any_infeasible = dropped
                .iter()
                .any(|(_, reason)| *reason == INFEASIBLE_AFTER_CONSTRAINTS);
            info!(
                candidates = dropped.len(),
                "No sequence survived constraint enforcement, returning empty plan"
            );
            let mut outcome = empty_outcome(hash, current_score, &report);
            outcome.plan.feasible = !any_infeasible;
            outcome.plan.sequences_evaluated = results.len();
            outcome.plan.feasible_sequences = feasible_count;
            outcome.rejected_sequences = rejected_sequences(&results, None, &dropped);
            outcome.filtered_actions = top_filtered.unwrap_or_default();
            return Ok(outcome);
        };

        let sequence = &final_result.sequence;
        let steps: Vec<HolisticStep> = sequence
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                HolisticStep::from_candidate(i + 1, action, costs.cost_for(action.value))
            })
            .collect();
        let total_cost = steps.iter().map(|s| s.estimated_fee).sum();

        let plan = HolisticPlan {
            steps,
            created_at: chrono::Utc::now(),
            portfolio_hash: hash,
            sequence_hash: Some(sequence.sequence_hash.clone()),
            pattern_type: Some(sequence.pattern_type.clone()),
            current_score,
            end_state_score: final_result.score,
            improvement: final_result.score - current_score,
            cash_required: sequence.cash_required(),
            cash_generated: sequence.cash_generated(),
            total_cost,
            feasible: true,
            sequences_evaluated: results.len(),
            feasible_sequences: feasible_count,
        };

        info!(
            steps = plan.steps.len(),
            score = plan.end_state_score,
            improvement = plan.improvement,
            stage = %stage,
            "Plan created"
        );

        Ok(PlanOutcome {
            plan,
            rejected_opportunities: rejected_opportunities(&report, Some(sequence)),
            rejected_sequences: rejected_sequences(&results, Some(best), &dropped),
            filtered_actions: filtered,
        })
    }
}

/// Indices of the feasible results, best first: highest score, then lowest
/// transaction cost, then earliest position.
pub fn rank_feasible(results: &[SequenceEvaluationResult]) -> Vec<usize> {
    let mut ranked: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.feasible)
        .map(|(i, _)| i)
        .collect();
    ranked.sort_by(|&ia, &ib| {
        let (a, b) = (&results[ia], &results[ib]);
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.transaction_cost
                    .partial_cmp(&b.transaction_cost)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| ia.cmp(&ib))
    });
    ranked
}

/// Index of the best feasible result, see [`rank_feasible`].
pub fn select_best(results: &[SequenceEvaluationResult]) -> Option<usize> {
    rank_feasible(results).first().copied()
}

fn empty_outcome(hash: String, current_score: f64, report: &OpportunityReport) -> PlanOutcome {
    PlanOutcome {
        plan: HolisticPlan::empty(hash, current_score),
        rejected_opportunities: rejected_opportunities(report, None),
        rejected_sequences: Vec::new(),
        filtered_actions: Vec::new(),
    }
}

fn rejected_opportunities(
    report: &OpportunityReport,
    selected: Option<&ActionSequence>,
) -> Vec<RejectedOpportunity> {
    let in_plan = |symbol: &str, side: TradeSide| {
        selected.is_some_and(|s| {
            s.actions
                .iter()
                .any(|a| a.symbol == symbol && a.side == side)
        })
    };

    let mut rejected = report.rejected.clone();
    for (category, candidates) in &report.by_category {
        for c in candidates {
            if !in_plan(&c.symbol, c.side) {
                rejected.push(RejectedOpportunity {
                    symbol: c.symbol.clone(),
                    side: c.side,
                    category: category.as_str().to_string(),
                    priority: c.priority,
                    reason: "not_selected".to_string(),
                });
            }
        }
    }
    rejected.truncate(MAX_REJECTED_ENTRIES);
    rejected
}

fn rejected_sequences(
    results: &[SequenceEvaluationResult],
    selected: Option<usize>,
    dropped: &[(usize, &'static str)],
) -> Vec<RejectedSequence> {
    results
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != selected)
        .take(MAX_REJECTED_ENTRIES)
        .map(|(i, r)| {
            let reason = match dropped.iter().find(|(d, _)| *d == i) {
                Some((_, reason)) => *reason,
                None if r.feasible => "lower_score",
                None => "infeasible",
            };
            RejectedSequence {
                sequence_hash: r.sequence.sequence_hash.clone(),
                pattern_type: r.sequence.pattern_type.clone(),
                score: r.score,
                feasible: r.feasible,
                reason: reason.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use planning_core::{ActionCandidate, PortfolioContext, ScoringReference};

    fn result(symbol: &str, score: f64, cost: f64, feasible: bool) -> SequenceEvaluationResult {
        let action = ActionCandidate {
            side: TradeSide::Buy,
            symbol: symbol.to_string(),
            isin: None,
            name: symbol.to_string(),
            quantity: 1,
            price: 10.0,
            value: 10.0,
            currency: "EUR".to_string(),
            priority: 0.5,
            reason: String::new(),
            tags: Vec::new(),
        };
        SequenceEvaluationResult {
            sequence: ActionSequence::new(vec![action], "t"),
            score,
            diversification_score: score,
            feasible,
            end_cash: 0.0,
            end_portfolio: PortfolioContext {
                positions: Default::default(),
                total_value: 0.0,
                reference: Arc::new(ScoringReference::default()),
            },
            transaction_cost: cost,
            infeasible_reason: None,
        }
    }

    #[test]
    fn test_select_best_prefers_score_then_cost_then_order() {
        let results = vec![
            result("A", 0.9, 1.0, false),
            result("B", 0.6, 2.0, true),
            result("C", 0.6, 1.0, true),
            result("D", 0.6, 1.0, true),
        ];
        assert_eq!(select_best(&results), Some(2));
    }

    #[test]
    fn test_rank_feasible_orders_all_candidates() {
        let results = vec![
            result("A", 0.4, 1.0, true),
            result("B", 0.9, 1.0, false),
            result("C", 0.7, 3.0, true),
            result("D", 0.7, 2.0, true),
        ];
        assert_eq!(rank_feasible(&results), vec![3, 2, 0]);
    }

    #[test]
    fn test_select_best_none_when_all_infeasible() {
        let results = vec![result("A", 0.0, 1.0, false)];
        assert_eq!(select_best(&results), None);
    }

    #[test]
    fn test_rejected_sequences_reasons_and_cap() {
        let mut results: Vec<_> = (0..150)
            .map(|i| result(&format!("S{}", i), 0.5, 1.0, i % 2 == 0))
            .collect();
        results[0].score = 0.9;
        let dropped = [(2, INFEASIBLE_AFTER_CONSTRAINTS)];
        let rejected = rejected_sequences(&results, Some(0), &dropped);
        assert_eq!(rejected.len(), MAX_REJECTED_ENTRIES);
        assert_eq!(rejected[0].reason, "infeasible");
        assert_eq!(rejected[1].reason, "infeasible_after_constraints");
        assert_eq!(rejected[2].reason, "infeasible");
        assert_eq!(rejected[3].reason, "lower_score");
    }
}
