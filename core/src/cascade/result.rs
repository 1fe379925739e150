//! Single-run and aggregate result types. See spec §3, §4.C.2/.3.

use crate::types::{Minutes, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub t_minutes: Minutes,
    pub node_id: NodeId,
    pub cause: Option<NodeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub timeline: Vec<FailureEvent>,
    pub failed: BTreeSet<NodeId>,
    pub time_to_failure: HashMap<NodeId, f64>,
    pub impact_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalPath {
    pub chain: Vec<NodeId>,
    pub frequency: u32,
    pub total_criticality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleneckNode {
    pub node_id: NodeId,
    pub marginal_impact_reduction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResult {
    pub failure_probability: HashMap<NodeId, f64>,
    pub mean_time_to_failure: HashMap<NodeId, f64>,
    pub affected_nodes_ci: ConfidenceInterval,
    pub impact_ci: ConfidenceInterval,
    pub critical_paths: Vec<CriticalPath>,
    pub bottleneck_nodes: Vec<BottleneckNode>,
    pub computation_time_seconds: f64,
    pub requested_runs: u32,
    pub completed_runs: u32,
    /// Set when `completed_runs < requested_runs` after the one retry
    /// spec §4.C.6 allows per failed run.
    pub quality_warning: bool,
}
