use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use evaluation_engine::CancellationToken;
use holistic_planner::HolisticPlanner;
use planning_core::{PlannerConfig, PortfolioSnapshot};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  planner-cli --snapshot FILE [--config FILE] [--timeout-secs N]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --snapshot FILE     Portfolio snapshot JSON");
    eprintln!("  --config FILE       Planner config JSON (default: PLANNER_* env vars)");
    eprintln!(
        "  --timeout-secs N    Cancel planning after N seconds (default: {})",
        DEFAULT_TIMEOUT_SECS
    );
    std::process::exit(1);
}

fn load_snapshot(path: &Path) -> Result<PortfolioSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
}

fn load_config(path: Option<&str>) -> Result<PlannerConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path))?;
            let config: PlannerConfig =
                serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path))?;
            config.validate()?;
            Ok(config)
        }
        None => PlannerConfig::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the plan, so logs go to stderr
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args: Vec<String> = std::env::args().collect();
    let Some(snapshot_path) = arg_value(&args, "--snapshot") else {
        usage();
    };
    let timeout_secs: u64 = arg_value(&args, "--timeout-secs")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let snapshot = load_snapshot(Path::new(snapshot_path))?;
    let config = load_config(arg_value(&args, "--config"))?;
    tracing::info!(
        positions = snapshot.positions.len(),
        calculators = config.enabled_calculators.len(),
        patterns = config.enabled_patterns.len(),
        timeout_secs,
        "Planner configuration loaded"
    );

    let planner = HolisticPlanner::from_config(&config)?;
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || {
        planner.create_plan_from_snapshot(snapshot, &config, &worker_cancel)
    });

    let outcome = match tokio::time::timeout(Duration::from_secs(timeout_secs), handle).await {
        Ok(joined) => joined.context("planner task panicked")??,
        Err(_) => {
            cancel.cancel();
            tracing::error!(timeout_secs, "Planning timed out");
            anyhow::bail!("planning timed out after {}s", timeout_secs);
        }
    };

    tracing::info!(
        steps = outcome.plan.steps.len(),
        score = outcome.plan.end_state_score,
        improvement = outcome.plan.improvement,
        "Plan ready"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
