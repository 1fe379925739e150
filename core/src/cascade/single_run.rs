//! A single Monte-Carlo propagation run. See spec §4.C.1.

use crate::cascade::event_multiplier::event_multiplier;
use crate::cascade::request::SimulationRequest;
use crate::cascade::result::{FailureEvent, RunResult};
use crate::graph::GraphSnapshot;
use crate::rng::CascadeRng;
use crate::types::{Minutes, NodeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// Consecutive quiet ticks (no change) before a run terminates early.
const QUIET_TICKS_LIMIT: u32 = 3;
/// Load-redistribution fraction default (spec's `recovery_fraction_α`).
const DEFAULT_ALPHA: f64 = 0.5;
/// Stress-term sensitivity default (`stress_sensitivity_k`).
const DEFAULT_STRESS_K: f64 = 1.0;

struct NodeState {
    failed: bool,
    t_failed: Minutes,
    cause: Option<NodeId>,
    extra_load: f64,
}

/// Run one stochastic propagation to completion (or cancellation).
/// `cancel` is checked at every tick boundary, satisfying spec §5's
/// "workers check it at each tick boundary" cooperative-cancellation rule.
pub fn run_single(
    snapshot: &GraphSnapshot,
    criticality: &HashMap<NodeId, f64>,
    req: &SimulationRequest,
    rng: &mut CascadeRng,
    cancel: &AtomicBool,
) -> Option<RunResult> {
    let step = req.time_step_minutes;
    let horizon = req.horizon_minutes;
    let tau = (horizon / 4.0).max(1e-9);

    let mut state: HashMap<NodeId, NodeState> = snapshot
        .nodes()
        .map(|n| {
            (
                n.id.clone(),
                NodeState {
                    failed: false,
                    t_failed: f64::INFINITY,
                    cause: None,
                    extra_load: 0.0,
                },
            )
        })
        .collect();

    let mut timeline = Vec::new();
    for id in &req.initial_failures {
        if let Some(s) = state.get_mut(id) {
            s.failed = true;
            s.t_failed = 0.0;
            s.cause = None;
            timeline.push(FailureEvent {
                t_minutes: 0.0,
                node_id: id.clone(),
                cause: None,
            });
        }
    }

    let mut quiet_ticks = 0u32;
    let mut t = 0.0;
    while t < horizon {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        t = (t + step).min(horizon);

        let prev_failed: BTreeSet<NodeId> = state
            .iter()
            .filter(|(_, s)| s.failed)
            .map(|(id, _)| id.clone())
            .collect();

        let mut changed = false;

        // ── Failure hazard pass (reads only the previous tick's state) ──
        // `best` tracks the highest-hazard failed in-neighbor, along with
        // its own failure time — the cascade delay is the edge latency
        // measured from *when the cause failed*, not from this detection
        // tick, or a multi-hop chain would double-count every hop's tick
        // boundary on top of its latency.
        let mut to_fail: Vec<(NodeId, Option<NodeId>, Minutes, Minutes)> = Vec::new();
        for node in snapshot.nodes() {
            if state[&node.id].failed {
                continue;
            }
            let mut one_minus_prod = 1.0_f64;
            let mut best: Option<(f64, NodeId, Minutes, Minutes)> = None;

            for (dst, edge) in snapshot.out_edges(&node.id) {
                if !prev_failed.contains(dst) {
                    continue;
                }
                let dst_kind = snapshot.node(dst).map(|n| n.kind).unwrap_or(crate::types::NodeKind::Other);
                let mult = event_multiplier(&req.event, edge, dst_kind);
                let hazard = (req.base_propagation_probability
                    * edge.propagation_probability
                    * edge.strength
                    * mult)
                    .clamp(0.0, 1.0);
                one_minus_prod *= 1.0 - hazard;

                let latency_minutes = edge.latency_ms / 60_000.0;
                let cause_t_failed = state[dst].t_failed;
                let better = match &best {
                    None => true,
                    Some((best_hazard, best_dst, _, _)) => {
                        hazard > *best_hazard || (hazard == *best_hazard && dst < best_dst)
                    }
                };
                if better {
                    best = Some((hazard, dst.clone(), latency_minutes, cause_t_failed));
                }
            }

            let mut p = 1.0 - one_minus_prod;

            if req.load_threshold_multiplier.is_finite() {
                let effective_load = node.load + state[&node.id].extra_load;
                let load_factor = if node.capacity > 0.0 {
                    effective_load / node.capacity
                } else if effective_load > 0.0 {
                    f64::INFINITY
                } else {
                    0.0
                };
                if load_factor > req.load_threshold_multiplier {
                    let excess = load_factor - req.load_threshold_multiplier;
                    let stress_p = (excess * DEFAULT_STRESS_K).min(1.0);
                    p = 1.0 - (1.0 - p) * (1.0 - stress_p);
                }
            }

            if p > 0.0 && rng.chance(p) {
                let (cause, latency_minutes, basis_t) = match best {
                    Some((_, dst, lat, cause_t)) => (Some(dst), lat, cause_t),
                    None => (None, 0.0, t),
                };
                to_fail.push((node.id.clone(), cause, latency_minutes, basis_t));
            }
        }

        for (id, cause, latency_minutes, basis_t) in to_fail {
            let t_fail = (basis_t + latency_minutes).min(horizon);
            {
                let s = state.get_mut(&id).unwrap();
                s.failed = true;
                s.t_failed = t_fail;
                s.cause = cause.clone();
            }
            timeline.push(FailureEvent {
                t_minutes: t_fail,
                node_id: id.clone(),
                cause,
            });
            redistribute_load(snapshot, &mut state, &id, DEFAULT_ALPHA, true);
            changed = true;
        }

        // ── Recovery pass ──
        if req.recovery_enabled {
            let mean_recovery = req.mean_recovery_time_minutes.unwrap_or(1.0).max(1e-9);
            let p_recover = (step / mean_recovery).clamp(0.0, 1.0);
            let candidates: Vec<NodeId> = state
                .iter()
                .filter(|(_, s)| s.failed)
                .filter(|(id, _)| all_dependencies_recovered(snapshot, &state, id))
                .map(|(id, _)| id.clone())
                .collect();
            for id in candidates {
                if rng.chance(p_recover) {
                    {
                        let s = state.get_mut(&id).unwrap();
                        s.failed = false;
                    }
                    redistribute_load(snapshot, &mut state, &id, DEFAULT_ALPHA, false);
                    changed = true;
                }
            }
        }

        if changed {
            quiet_ticks = 0;
        } else {
            quiet_ticks += 1;
            let any_failed_has_live_dependents_still_failing = state.values().any(|s| s.failed);
            if !req.recovery_enabled && !any_failed_has_live_dependents_still_failing {
                break;
            }
            if quiet_ticks >= QUIET_TICKS_LIMIT {
                break;
            }
        }
    }

    let failed: BTreeSet<NodeId> = state
        .iter()
        .filter(|(_, s)| s.t_failed.is_finite())
        .map(|(id, _)| id.clone())
        .collect();

    let time_to_failure: HashMap<NodeId, f64> =
        state.iter().map(|(id, s)| (id.clone(), s.t_failed)).collect();

    let impact_score: f64 = failed
        .iter()
        .map(|id| {
            let c = criticality.get(id).copied().unwrap_or(0.0);
            let t = time_to_failure.get(id).copied().unwrap_or(f64::INFINITY);
            let penalty = if t.is_finite() { (-t / tau).exp() } else { 0.0 };
            c * (1.0 + penalty)
        })
        .sum();

    Some(RunResult {
        timeline,
        failed,
        time_to_failure,
        impact_score,
    })
}

/// Redistribute (or return) a fraction `alpha` of a node's load across its
/// still-alive dependents (nodes with an edge pointing at it) — spec
/// §4.C.1 point 4/5.
fn redistribute_load(
    snapshot: &GraphSnapshot,
    state: &mut HashMap<NodeId, NodeState>,
    id: &NodeId,
    alpha: f64,
    failing: bool,
) {
    let Some(node) = snapshot.node(id) else { return };
    let dependents: Vec<NodeId> = snapshot
        .in_edges(id)
        .map(|(src, _)| src.clone())
        .filter(|src| !failing || state.get(src).map(|s| !s.failed).unwrap_or(false))
        .collect();
    if dependents.is_empty() {
        return;
    }
    let share = (node.load * alpha) / dependents.len() as f64;
    for dep in dependents {
        if let Some(s) = state.get_mut(&dep) {
            if failing {
                s.extra_load += share;
            } else {
                s.extra_load = (s.extra_load - share).max(0.0);
            }
        }
    }
}

/// A failed node may recover once every upstream dependency it has that is
/// itself currently failed has recovered (spec §4.C.1 point 5). A node
/// with no currently-failed dependencies is trivially eligible.
fn all_dependencies_recovered(
    snapshot: &GraphSnapshot,
    state: &HashMap<NodeId, NodeState>,
    id: &NodeId,
) -> bool {
    snapshot
        .out_edges(id)
        .all(|(dst, _)| state.get(dst).map(|s| !s.failed).unwrap_or(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::request::{EventKind, TriggerEvent};
    use crate::graph::{EdgeAttrs, GraphStore, Node};
    use crate::types::NodeKind;

    fn two_node_graph() -> GraphStore {
        let store = GraphStore::new();
        store
            .add_node(Node::new(NodeId::from("P"), NodeKind::Power, 100.0).unwrap())
            .unwrap();
        store
            .add_node(Node::new(NodeId::from("H"), NodeKind::Healthcare, 10.0).unwrap())
            .unwrap();
        store
            .add_edge(
                &NodeId::from("H"),
                &NodeId::from("P"),
                EdgeAttrs {
                    strength: 1.0,
                    propagation_probability: 1.0,
                    latency_ms: 60_000.0,
                    properties: Default::default(),
                },
            )
            .unwrap();
        store
    }

    fn request(initial: &str) -> SimulationRequest {
        SimulationRequest {
            scenario_name: "two-node".into(),
            event: TriggerEvent {
                kind: EventKind::PowerOutage,
                severity: 1.0,
                environment: None,
            },
            initial_failures: vec![NodeId::from(initial)],
            horizon_minutes: 10.0,
            time_step_minutes: 1.0,
            monte_carlo_runs: 1,
            confidence_level: 0.95,
            base_propagation_probability: 1.0,
            load_threshold_multiplier: f64::INFINITY,
            recovery_enabled: false,
            mean_recovery_time_minutes: None,
        }
    }

    #[test]
    fn dependent_fails_deterministically_when_propagation_is_certain() {
        let store = two_node_graph();
        let snap = store.snapshot();
        let req = request("P");
        let cancel = AtomicBool::new(false);
        let mut rng = CascadeRng::for_run(1, 0);
        let result = run_single(&snap, &HashMap::new(), &req, &mut rng, &cancel).unwrap();
        assert!(result.failed.contains(&NodeId::from("P")));
        assert!(result.failed.contains(&NodeId::from("H")));
        assert_eq!(result.time_to_failure[&NodeId::from("H")], 1.0);
    }

    #[test]
    fn isolated_node_never_fails() {
        let store = two_node_graph();
        store
            .add_node(Node::new(NodeId::from("I"), NodeKind::Other, 1.0).unwrap())
            .unwrap();
        let snap = store.snapshot();
        let req = request("P");
        let cancel = AtomicBool::new(false);
        let mut rng = CascadeRng::for_run(1, 0);
        let result = run_single(&snap, &HashMap::new(), &req, &mut rng, &cancel).unwrap();
        assert!(!result.failed.contains(&NodeId::from("I")));
    }

    #[test]
    fn cancellation_stops_the_run() {
        let store = two_node_graph();
        let snap = store.snapshot();
        let req = request("P");
        let cancel = AtomicBool::new(true);
        let mut rng = CascadeRng::for_run(1, 0);
        assert!(run_single(&snap, &HashMap::new(), &req, &mut rng, &cancel).is_none());
    }
}
