//! Request deduplication fingerprint. See spec §3/§4.E, §8 property 6.

use crate::cascade::request::SimulationRequest;
use crate::types::GraphVersion;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A deterministic digest of `(graph snapshot version, request parameters)`.
/// Two submissions with the same fingerprint against the same graph
/// version attach to the same in-flight job rather than running twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

use serde::{Deserialize, Serialize};

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

pub fn compute_fingerprint(graph_version: GraphVersion, req: &SimulationRequest) -> Fingerprint {
    let mut hasher = DefaultHasher::new();
    graph_version.hash(&mut hasher);
    req.scenario_name.hash(&mut hasher);
    format!("{:?}", req.event.kind).hash(&mut hasher);
    req.event.severity.to_bits().hash(&mut hasher);
    for id in &req.initial_failures {
        id.hash(&mut hasher);
    }
    req.horizon_minutes.to_bits().hash(&mut hasher);
    req.time_step_minutes.to_bits().hash(&mut hasher);
    req.monte_carlo_runs.hash(&mut hasher);
    req.confidence_level.to_bits().hash(&mut hasher);
    req.base_propagation_probability.to_bits().hash(&mut hasher);
    req.load_threshold_multiplier.to_bits().hash(&mut hasher);
    req.recovery_enabled.hash(&mut hasher);
    req.mean_recovery_time_minutes
        .unwrap_or(0.0)
        .to_bits()
        .hash(&mut hasher);
    Fingerprint(hasher.finish())
}

/// Derive the job's master seed from its fingerprint, so identical
/// requests against identical snapshots always draw identical per-run
/// seeds (spec §4.C.4).
pub fn master_seed_from_fingerprint(fp: Fingerprint) -> u64 {
    fp.0
}
