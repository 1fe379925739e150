//! Immutable graph views. See spec §3/§4.A "snapshot semantics".
//!
//! A `GraphSnapshot` is a structural copy taken under the Graph Store's
//! shared lock — the "mutex-protected copy" strategy spec §4.A explicitly
//! allows. Once returned, no subsequent mutation to the live store is
//! visible through it.

use crate::graph::node::{EdgeAttrs, Node};
use crate::types::{Direction, GraphVersion, NodeId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    pub version: GraphVersion,
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) out_edges: HashMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>,
    pub(crate) in_edges: HashMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edges `id` depends on — i.e. `id -> dst` — ordered by destination id.
    pub fn out_edges(&self, id: &NodeId) -> impl Iterator<Item = (&NodeId, &EdgeAttrs)> {
        self.out_edges
            .get(id)
            .into_iter()
            .flat_map(|m| m.iter())
    }

    /// Edges depending on `id` — i.e. `src -> id` — ordered by source id.
    pub fn in_edges(&self, id: &NodeId) -> impl Iterator<Item = (&NodeId, &EdgeAttrs)> {
        self.in_edges.get(id).into_iter().flat_map(|m| m.iter())
    }

    pub fn edge(&self, src: &NodeId, dst: &NodeId) -> Option<&EdgeAttrs> {
        self.out_edges.get(src).and_then(|m| m.get(dst))
    }

    /// Breadth-first walk from `id`, ties broken by lexicographic `NodeId`
    /// order at each depth, as spec §4.A requires for reproducible tests.
    pub fn neighbors(
        &self,
        id: &NodeId,
        direction: Direction,
        max_depth: usize,
    ) -> Vec<(NodeId, usize)> {
        use std::collections::{HashSet, VecDeque};

        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(id.clone());
        let mut frontier: VecDeque<(NodeId, usize)> = VecDeque::new();
        frontier.push_back((id.clone(), 0));
        let mut out = Vec::new();

        while let Some((cur, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.adjacent(&cur, direction) {
                if visited.insert(next.clone()) {
                    out.push((next.clone(), depth + 1));
                    frontier.push_back((next, depth + 1));
                }
            }
        }
        out
    }

    fn adjacent(&self, id: &NodeId, direction: Direction) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = Vec::new();
        match direction {
            Direction::Out => {
                result.extend(self.out_edges.get(id).into_iter().flat_map(|m| m.keys().cloned()));
            }
            Direction::In => {
                result.extend(self.in_edges.get(id).into_iter().flat_map(|m| m.keys().cloned()));
            }
            Direction::Both => {
                result.extend(self.out_edges.get(id).into_iter().flat_map(|m| m.keys().cloned()));
                result.extend(self.in_edges.get(id).into_iter().flat_map(|m| m.keys().cloned()));
            }
        }
        result.sort();
        result.dedup();
        result
    }

    /// Build the reachable subgraph from `seeds`, bounded by `max_depth`,
    /// walking in the given direction. Used both for the public
    /// `GraphStore::subgraph` contract and internally by the cascade
    /// engine's work-budget estimate.
    pub fn reachable_from(
        &self,
        seeds: &[NodeId],
        direction: Direction,
        max_depth: usize,
    ) -> GraphSnapshot {
        let mut keep: std::collections::HashSet<NodeId> = seeds.iter().cloned().collect();
        for seed in seeds {
            if self.nodes.contains_key(seed) {
                for (n, _) in self.neighbors(seed, direction, max_depth) {
                    keep.insert(n);
                }
            }
        }

        let nodes: HashMap<NodeId, Node> = self
            .nodes
            .iter()
            .filter(|(id, _)| keep.contains(*id))
            .map(|(id, n)| (id.clone(), n.clone()))
            .collect();

        let filter_adj = |adj: &HashMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>| {
            adj.iter()
                .filter(|(id, _)| keep.contains(*id))
                .map(|(id, m)| {
                    (
                        id.clone(),
                        m.iter()
                            .filter(|(other, _)| keep.contains(*other))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    )
                })
                .collect()
        };

        GraphSnapshot {
            version: self.version,
            nodes,
            out_edges: filter_adj(&self.out_edges),
            in_edges: filter_adj(&self.in_edges),
        }
    }
}
