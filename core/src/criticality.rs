//! Criticality scoring — component B. See spec §4.B.
//!
//! `CriticalityScorer` is a trait so a learned replacement (a GNN, say) is
//! a drop-in `impl` — it only needs to match this signature and stay in
//! [0,1]. `DefaultScorer` implements the analytic blend spec.md specifies.

use crate::graph::GraphSnapshot;
use crate::types::{Direction, GraphVersion, NodeId};
use std::collections::HashMap;

pub trait CriticalityScorer: Send + Sync {
    fn score(&self, snapshot: &GraphSnapshot) -> HashMap<NodeId, f64>;
}

/// Cached scores for one graph version. Recomputation produces a new
/// immutable map rather than mutating this one in place — see spec §4.B
/// "never silently stale" and §5 "criticality scores are immutable once
/// computed for a given graph version."
#[derive(Debug, Clone)]
pub struct CriticalityScores {
    pub version: GraphVersion,
    pub scores: HashMap<NodeId, f64>,
    pub computed_at: std::time::Instant,
}

impl CriticalityScores {
    pub fn is_stale(&self, current_version: GraphVersion, staleness_bound: std::time::Duration) -> bool {
        current_version != self.version || self.computed_at.elapsed() > staleness_bound
    }

    pub fn get(&self, id: &NodeId) -> f64 {
        self.scores.get(id).copied().unwrap_or(0.0)
    }
}

/// The default blend: 0.5 * reachability mass + 0.3 * weighted in-degree
/// centrality + 0.2 * capacity-health stress, clamped to [0,1].
pub struct DefaultScorer {
    pub reachability_depth: usize,
    pub weight_reachability: f64,
    pub weight_degree: f64,
    pub weight_stress: f64,
}

impl Default for DefaultScorer {
    fn default() -> Self {
        Self {
            reachability_depth: 4,
            weight_reachability: 0.5,
            weight_degree: 0.3,
            weight_stress: 0.2,
        }
    }
}

impl CriticalityScorer for DefaultScorer {
    fn score(&self, snapshot: &GraphSnapshot) -> HashMap<NodeId, f64> {
        let total_nodes = snapshot.node_count().max(1) as f64;

        // Signal 1: weighted in-degree centrality (who depends on me),
        // normalized by the graph's maximum.
        let mut raw_degree: HashMap<NodeId, f64> = HashMap::new();
        let mut max_degree = 0.0_f64;
        for node in snapshot.nodes() {
            let sum: f64 = snapshot.in_edges(&node.id).map(|(_, a)| a.strength).sum();
            max_degree = max_degree.max(sum);
            raw_degree.insert(node.id.clone(), sum);
        }

        // Signal 2: reachability mass — fraction of nodes that transitively
        // depend on this node, following reverse (in) edges up to a bounded
        // depth.
        let mut reachability: HashMap<NodeId, f64> = HashMap::new();
        for node in snapshot.nodes() {
            let reached = snapshot
                .neighbors(&node.id, Direction::In, self.reachability_depth)
                .len() as f64;
            reachability.insert(node.id.clone(), reached / total_nodes);
        }

        // Signal 3: capacity-health stress.
        let mut stress: HashMap<NodeId, f64> = HashMap::new();
        for node in snapshot.nodes() {
            let load_factor = node.load_factor();
            let load_factor = if load_factor.is_finite() { load_factor } else { 1.0 };
            stress.insert(node.id.clone(), (1.0 - node.health) * load_factor);
        }

        let mut out = HashMap::with_capacity(snapshot.node_count());
        for node in snapshot.nodes() {
            let degree_norm = if max_degree > 0.0 {
                raw_degree.get(&node.id).copied().unwrap_or(0.0) / max_degree
            } else {
                0.0
            };
            let reach = reachability.get(&node.id).copied().unwrap_or(0.0);
            let st = stress.get(&node.id).copied().unwrap_or(0.0).min(1.0);

            let score = self.weight_reachability * reach
                + self.weight_degree * degree_norm
                + self.weight_stress * st;
            out.insert(node.id.clone(), score.clamp(0.0, 1.0));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttrs, GraphStore, Node};
    use crate::types::NodeKind;

    fn edge(strength: f64) -> EdgeAttrs {
        EdgeAttrs {
            strength,
            propagation_probability: 1.0,
            latency_ms: 0.0,
            properties: Default::default(),
        }
    }

    #[test]
    fn hub_node_scores_higher_than_leaf() {
        let store = GraphStore::new();
        store
            .add_node(Node::new(NodeId::from("hub"), NodeKind::Power, 100.0).unwrap())
            .unwrap();
        for i in 0..5 {
            let id = format!("leaf{i}");
            store
                .add_node(Node::new(NodeId::from(id.as_str()), NodeKind::Other, 1.0).unwrap())
                .unwrap();
            store
                .add_edge(&NodeId::from(id.as_str()), &NodeId::from("hub"), edge(1.0))
                .unwrap();
        }
        let snap = store.snapshot();
        let scores = DefaultScorer::default().score(&snap);
        let hub_score = scores[&NodeId::from("hub")];
        let leaf_score = scores[&NodeId::from("leaf0")];
        assert!(hub_score > leaf_score);
    }

    #[test]
    fn scores_stay_in_unit_range() {
        let store = GraphStore::new();
        store
            .add_node(
                Node {
                    health: 0.0,
                    load: 1000.0,
                    ..Node::new(NodeId::from("stressed"), NodeKind::Power, 10.0).unwrap()
                },
            )
            .unwrap();
        let snap = store.snapshot();
        let scores = DefaultScorer::default().score(&snap);
        for v in scores.values() {
            assert!((0.0..=1.0).contains(v));
        }
    }
}
