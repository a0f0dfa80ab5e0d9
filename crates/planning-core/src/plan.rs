use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::portfolio::PortfolioContext;
use crate::sequence::ActionSequence;
use crate::types::{ActionCandidate, TradeSide};

/// Outcome of simulating and scoring one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceEvaluationResult {
    pub sequence: ActionSequence,
    /// Final score in `[0, 1]`; zero for infeasible sequences.
    pub score: f64,
    pub diversification_score: f64,
    pub feasible: bool,
    pub end_cash: f64,
    pub end_portfolio: PortfolioContext,
    pub transaction_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infeasible_reason: Option<String>,
}

/// One executable step of a finalized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticStep {
    pub step_number: usize,
    pub side: TradeSide,
    pub symbol: String,
    pub isin: Option<String>,
    pub name: String,
    pub quantity: u64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub estimated_fee: f64,
    pub currency: String,
    pub reason: String,
    pub is_windfall: bool,
    pub is_averaging_down: bool,
    pub contributes_to: Vec<String>,
}

impl HolisticStep {
    pub fn from_candidate(step_number: usize, candidate: &ActionCandidate, fee: f64) -> Self {
        Self {
            step_number,
            side: candidate.side,
            symbol: candidate.symbol.clone(),
            isin: candidate.isin.clone(),
            name: candidate.name.clone(),
            quantity: candidate.quantity,
            estimated_price: candidate.price,
            estimated_value: candidate.value,
            estimated_fee: fee,
            currency: candidate.currency.clone(),
            reason: candidate.reason.clone(),
            is_windfall: candidate.has_tag("windfall"),
            is_averaging_down: candidate.has_tag("averaging_down"),
            contributes_to: candidate.tags.clone(),
        }
    }
}

/// The planner's terminal output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolisticPlan {
    pub steps: Vec<HolisticStep>,
    pub created_at: DateTime<Utc>,
    pub portfolio_hash: String,
    pub sequence_hash: Option<String>,
    pub pattern_type: Option<String>,
    pub current_score: f64,
    pub end_state_score: f64,
    pub improvement: f64,
    pub cash_required: f64,
    pub cash_generated: f64,
    pub total_cost: f64,
    pub feasible: bool,
    pub sequences_evaluated: usize,
    pub feasible_sequences: usize,
}

impl HolisticPlan {
    /// A plan with no steps, scored at the current state.
    pub fn empty(portfolio_hash: String, current_score: f64) -> Self {
        Self {
            steps: Vec::new(),
            created_at: Utc::now(),
            portfolio_hash,
            sequence_hash: None,
            pattern_type: None,
            current_score,
            end_state_score: current_score,
            improvement: 0.0,
            cash_required: 0.0,
            cash_generated: 0.0,
            total_cost: 0.0,
            feasible: true,
            sequences_evaluated: 0,
            feasible_sequences: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A candidate that was discovered but did not make it into the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOpportunity {
    pub symbol: String,
    pub side: TradeSide,
    pub category: String,
    pub priority: f64,
    pub reason: String,
}

/// A sequence that was evaluated but not selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedSequence {
    pub sequence_hash: String,
    pub pattern_type: String,
    pub score: f64,
    pub feasible: bool,
    pub reason: String,
}

/// Plan plus diagnostics about what was discarded along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub plan: HolisticPlan,
    pub rejected_opportunities: Vec<RejectedOpportunity>,
    pub rejected_sequences: Vec<RejectedSequence>,
    /// Actions removed by constraint enforcement, with the reason.
    pub filtered_actions: Vec<(ActionCandidate, String)>,
}
