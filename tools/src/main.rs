//! resilience-runner: headless Monte-Carlo cascade runner.
//!
//! Usage:
//!   resilience-runner --node n1 --event power_outage --severity 0.8 --runs 200
//!   resilience-runner --graph snapshot.jsonl --node substation-7 --horizon 720

use anyhow::{bail, Context, Result};
use resilience_core::cascade::{EventKind, SimulationRequest, TriggerEvent};
use resilience_core::types::NodeId;
use resilience_core::{Platform, PlatformConfig};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let graph_path = find_flag(&args, "--graph");
    let node_ids = find_flag(&args, "--node")
        .map(|s| s.split(',').map(|n| NodeId(n.to_string())).collect::<Vec<_>>())
        .unwrap_or_default();
    let event_kind = parse_arg(&args, "--event", "power_outage".to_string());
    let severity = parse_arg(&args, "--severity", 0.7f64);
    let runs = parse_arg(&args, "--runs", 200u32);
    let horizon = parse_arg(&args, "--horizon", 1440f64);
    let step = parse_arg(&args, "--step", 15f64);
    let base_propagation = parse_arg(&args, "--propagation", 0.3f64);
    let confidence = parse_arg(&args, "--confidence", 0.95f64);

    if node_ids.is_empty() {
        bail!("at least one --node <id> is required");
    }

    let platform = match graph_path {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("opening graph snapshot {path}"))?;
            Platform::load_snapshot(BufReader::new(file))
                .map_err(|e| anyhow::anyhow!("loading graph snapshot {path}: {e}"))?
        }
        None => Platform::new(PlatformConfig::default()),
    };

    println!("resilience-runner");
    println!("  nodes:       {:?}", node_ids.iter().map(|n| &n.0).collect::<Vec<_>>());
    println!("  event:       {event_kind} (severity {severity})");
    println!("  runs:        {runs}");
    println!("  horizon:     {horizon} min, step {step} min");
    println!();

    let request = SimulationRequest {
        scenario_name: format!("{event_kind}-{severity}"),
        event: TriggerEvent {
            kind: parse_event_kind(&event_kind)?,
            severity,
            environment: None,
        },
        initial_failures: node_ids,
        horizon_minutes: horizon,
        time_step_minutes: step,
        monte_carlo_runs: runs,
        confidence_level: confidence,
        base_propagation_probability: base_propagation,
        load_threshold_multiplier: f64::INFINITY,
        recovery_enabled: false,
        mean_recovery_time_minutes: None,
    };

    let handle = platform
        .coordinator
        .submit(request)
        .map_err(|e| anyhow::anyhow!("submitting simulation: {e}"))?;

    let aggregate = handle
        .await_result(Some(Duration::from_secs(120)))
        .map_err(|e| anyhow::anyhow!("simulation failed: {e}"))?;

    println!("{}", serde_json::to_string_pretty(&*aggregate)?);

    platform.shutdown();
    Ok(())
}

fn parse_event_kind(raw: &str) -> Result<EventKind> {
    let normalized = format!("\"{raw}\"");
    serde_json::from_str(&normalized).with_context(|| format!("unrecognized --event value {raw}"))
}

fn find_flag(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
