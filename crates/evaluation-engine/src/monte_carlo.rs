use std::collections::{BTreeSet, HashMap};

use planning_core::{
    ActionSequence, PlanningError, MAX_MONTE_CARLO_PATHS, MIN_MONTE_CARLO_PATHS,
};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::{debug, warn};

use crate::evaluator::{evaluate_sequence, EvaluationContext};
use crate::feasibility::check_feasibility;
use crate::worker_pool::{CancellationToken, WorkerPool};

pub const DEFAULT_VOLATILITY: f64 = 0.2;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub sequence_hash: String,
    pub feasible: bool,
    pub paths_evaluated: usize,
    pub path_scores: Vec<f64>,
    pub mean_score: f64,
    pub worst_score: f64,
    pub best_score: f64,
    pub p10_score: f64,
    pub p90_score: f64,
    /// `0.4 * worst + 0.3 * p10 + 0.3 * mean`.
    pub final_score: f64,
    pub seed: u64,
}

/// Re-score a sequence across `paths` independently perturbed price paths.
///
/// Each path draws one daily log-normal move per symbol from its annual
/// volatility (default 0.2, clamped to [0.1, 1.0]), clamps the multiplier
/// to [0.5, 2.0], then simulates and scores against the adjusted prices.
/// Paths run on the worker pool; a given seed reproduces the same scores.
pub fn run_monte_carlo(
    sequence: &ActionSequence,
    ctx: &EvaluationContext,
    paths: usize,
    seed: Option<u64>,
    pool: &WorkerPool,
    cancel: &CancellationToken,
) -> Result<MonteCarloResult, PlanningError> {
    if !(MIN_MONTE_CARLO_PATHS..=MAX_MONTE_CARLO_PATHS).contains(&paths) {
        return Err(PlanningError::InvalidPathCount(paths));
    }
    let seed = seed.unwrap_or_else(rand::random);

    if check_feasibility(sequence, &ctx.opportunity, &ctx.costs).is_err() {
        return Ok(MonteCarloResult {
            sequence_hash: sequence.sequence_hash.clone(),
            feasible: false,
            paths_evaluated: 0,
            path_scores: Vec::new(),
            mean_score: 0.0,
            worst_score: 0.0,
            best_score: 0.0,
            p10_score: 0.0,
            p90_score: 0.0,
            final_score: 0.0,
            seed,
        });
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| PlanningError::InvalidConfig(format!("normal distribution: {}", e)))?;

    let symbols: BTreeSet<&str> = sequence
        .actions
        .iter()
        .map(|a| a.symbol.as_str())
        .chain(ctx.start.positions.keys().map(String::as_str))
        .collect();
    let daily_vols: Vec<(&str, f64)> = symbols
        .into_iter()
        .map(|s| {
            let annual = ctx
                .opportunity
                .volatility
                .get(s)
                .copied()
                .unwrap_or(DEFAULT_VOLATILITY)
                .clamp(0.1, 1.0);
            (s, annual / TRADING_DAYS.sqrt())
        })
        .collect();

    let path_ids: Vec<u64> = (0..paths as u64).collect();
    let outcomes = pool.run(&path_ids, cancel, |&path| {
        let mut rng = StdRng::seed_from_u64(seed ^ path.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let multipliers: HashMap<String, f64> = daily_vols
            .iter()
            .map(|(symbol, daily_vol)| {
                let z: f64 = normal.sample(&mut rng);
                (symbol.to_string(), (daily_vol * z).exp().clamp(0.5, 2.0))
            })
            .collect();
        evaluate_sequence(sequence, ctx, Some(&multipliers)).score
    })?;

    let mut scores: Vec<f64> = outcomes
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|e| {
                warn!(error = %e, "Monte Carlo path failed, scoring 0");
                0.0
            })
        })
        .collect();
    let path_scores = scores.clone();
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let percentile = |sorted: &[f64], p: f64| -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    };

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let worst = scores.first().copied().unwrap_or(0.0);
    let best = scores.last().copied().unwrap_or(0.0);
    let p10 = percentile(&scores, 10.0);
    let p90 = percentile(&scores, 90.0);
    let final_score = worst * 0.4 + p10 * 0.3 + mean * 0.3;

    debug!(paths, mean, worst, final_score, "Monte Carlo evaluation complete");

    Ok(MonteCarloResult {
        sequence_hash: sequence.sequence_hash.clone(),
        feasible: true,
        paths_evaluated: path_scores.len(),
        path_scores,
        mean_score: mean,
        worst_score: worst,
        best_score: best,
        p10_score: p10,
        p90_score: p90,
        final_score,
        seed,
    })
}
