//! Component C — the Monte-Carlo cascade simulation engine. See spec §4.C.
//!
//! This module owns the per-run algorithm ([`single_run`]) and the
//! cross-run aggregation ([`stats`]); dispatching runs across worker
//! threads is the [`crate::coordinator`]'s job, which calls
//! [`run_single`] once per work unit and hands the results here to
//! aggregate.

pub mod event_multiplier;
pub mod fingerprint;
pub mod request;
pub mod result;
pub mod single_run;
pub mod stats;

use crate::clock::StopWatch;
use crate::error::{CoreError, CoreResult};
use crate::graph::GraphSnapshot;
use crate::rng::CascadeRng;
use crate::types::NodeId;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

pub use fingerprint::{compute_fingerprint, master_seed_from_fingerprint, Fingerprint};
pub use request::{EventKind, SimulationRequest, TriggerEvent};
pub use result::{AggregateResult, BottleneckNode, ConfidenceInterval, CriticalPath, RunResult};
pub use single_run::run_single;

/// Fraction of requested runs that must complete for a result to be
/// returned without a `quality_warning` (spec §4.C.6).
pub const MIN_COMPLETION_RATIO: f64 = 0.5;

/// Run every Monte-Carlo iteration sequentially on the calling thread
/// and aggregate the result. A thin convenience wrapper around
/// [`run_single`] + [`stats`] for callers that don't need the
/// coordinator's worker pool — the CLI tool uses this directly.
pub fn simulate_sequential(
    snapshot: &GraphSnapshot,
    criticality: &HashMap<NodeId, f64>,
    req: &SimulationRequest,
    master_seed: u64,
) -> CoreResult<AggregateResult> {
    req.validate().map_err(CoreError::invalid)?;
    let stopwatch = StopWatch::start();
    let cancel = AtomicBool::new(false);

    let mut runs = Vec::with_capacity(req.monte_carlo_runs as usize);
    for run_index in 0..req.monte_carlo_runs {
        let mut rng = CascadeRng::for_run(master_seed, run_index);
        if let Some(result) = run_single(snapshot, criticality, req, &mut rng, &cancel) {
            runs.push(result);
        }
    }

    Ok(aggregate(snapshot, criticality, req, runs, stopwatch.elapsed_seconds()))
}

/// Combine a batch of completed [`RunResult`]s into the final
/// [`AggregateResult`]. Exposed separately from [`simulate_sequential`]
/// so the coordinator can stream runs in from its worker pool and call
/// this once all runs (or their retries) have settled.
pub fn aggregate(
    snapshot: &GraphSnapshot,
    criticality: &HashMap<NodeId, f64>,
    req: &SimulationRequest,
    runs: Vec<RunResult>,
    computation_time_seconds: f64,
) -> AggregateResult {
    let all_nodes: Vec<NodeId> = snapshot.nodes().map(|n| n.id.clone()).collect();
    let completed_runs = runs.len() as u32;

    let failure_probability = stats::failure_probability(&runs, &all_nodes);
    let mean_time_to_failure = stats::mean_time_to_failure(&runs, &all_nodes);

    let affected_counts: Vec<f64> = runs.iter().map(|r| r.failed.len() as f64).collect();
    let affected_nodes_ci = stats::mean_interval(&affected_counts, req.confidence_level);

    let impact_values: Vec<f64> = runs.iter().map(|r| r.impact_score).collect();
    let impact_ci = stats::mean_interval(&impact_values, req.confidence_level);

    let critical_paths = stats::extract_critical_paths(&runs, criticality);
    let bottleneck_nodes = stats::compute_bottlenecks(&runs, &all_nodes, criticality, req.horizon_minutes);

    let quality_warning = completed_runs < req.monte_carlo_runs;

    AggregateResult {
        failure_probability,
        mean_time_to_failure,
        affected_nodes_ci,
        impact_ci,
        critical_paths,
        bottleneck_nodes,
        computation_time_seconds,
        requested_runs: req.monte_carlo_runs,
        completed_runs,
        quality_warning,
    }
}
