//! The dependency graph store — component A. See spec §4.A.
//!
//! RULE: this is the only place in the crate that mutates graph state.
//! Ingestion and admin callers always go through this API — never touch
//! node/edge maps directly.

mod node;
mod snapshot;
pub mod io;

pub use node::{EdgeAttrs, Node, NodeDelta};
pub use snapshot::GraphSnapshot;

use crate::clock::LogicalClock;
use crate::error::{CoreError, CoreResult};
use crate::event::FanoutEvent;
use crate::types::{Direction, GraphVersion, NodeId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct GraphInner {
    nodes: HashMap<NodeId, Node>,
    out_edges: HashMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>,
    in_edges: HashMap<NodeId, BTreeMap<NodeId, EdgeAttrs>>,
}

/// The in-memory, concurrently-readable dependency graph.
///
/// All mutations acquire the write lease; all reads (including snapshot
/// construction) acquire the shared lease just long enough to clone the
/// data they need. A reader therefore always sees either the pre- or
/// post-state of a mutation, never a torn structure.
pub struct GraphStore {
    inner: RwLock<GraphInner>,
    clock: LogicalClock,
    version: AtomicU64,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            clock: LogicalClock::new(),
            version: AtomicU64::new(0),
        }
    }

    pub fn version(&self) -> GraphVersion {
        self.version.load(Ordering::SeqCst)
    }

    fn bump_version(&self) -> GraphVersion {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Add a node. Returns `Conflict` if the id already exists.
    pub fn add_node(&self, mut node: Node) -> CoreResult<FanoutEvent> {
        node.validate_invariants()?;
        let mut inner = self.inner.write();
        if inner.nodes.contains_key(&node.id) {
            return Err(CoreError::Conflict {
                what: format!("node '{}' already exists", node.id),
            });
        }
        node.updated_at = self.clock.tick();
        inner.nodes.insert(node.id.clone(), node.clone());
        let version = self.bump_version();
        Ok(FanoutEvent::NodeAdded { version, node })
    }

    /// Partially update a node's mutable fields.
    pub fn update_node(&self, id: &NodeId, delta: &NodeDelta) -> CoreResult<FanoutEvent> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found_node(id))?;
        delta.apply(node)?;
        node.updated_at = self.clock.tick();
        let version = self.bump_version();
        Ok(FanoutEvent::NodeUpdated {
            version,
            node_id: id.clone(),
        })
    }

    /// Remove a node and all incident edges.
    pub fn remove_node(&self, id: &NodeId) -> CoreResult<FanoutEvent> {
        let mut inner = self.inner.write();
        if inner.nodes.remove(id).is_none() {
            return Err(CoreError::not_found_node(id));
        }
        if let Some(outs) = inner.out_edges.remove(id) {
            for dst in outs.keys() {
                if let Some(m) = inner.in_edges.get_mut(dst) {
                    m.remove(id);
                }
            }
        }
        if let Some(ins) = inner.in_edges.remove(id) {
            for src in ins.keys() {
                if let Some(m) = inner.out_edges.get_mut(src) {
                    m.remove(id);
                }
            }
        }
        let version = self.bump_version();
        Ok(FanoutEvent::NodeRemoved {
            version,
            node_id: id.clone(),
        })
    }

    /// Add a directed dependency edge `src -> dst` ("src depends on dst").
    pub fn add_edge(&self, src: &NodeId, dst: &NodeId, attrs: EdgeAttrs) -> CoreResult<FanoutEvent> {
        if src == dst {
            return Err(CoreError::invalid("self-loops are not permitted"));
        }
        attrs.validate_invariants()?;
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(src) {
            return Err(CoreError::not_found_node(src));
        }
        if !inner.nodes.contains_key(dst) {
            return Err(CoreError::not_found_node(dst));
        }
        if inner
            .out_edges
            .get(src)
            .map(|m| m.contains_key(dst))
            .unwrap_or(false)
        {
            return Err(CoreError::Conflict {
                what: format!("edge '{src}' -> '{dst}' already exists"),
            });
        }
        inner
            .out_edges
            .entry(src.clone())
            .or_default()
            .insert(dst.clone(), attrs.clone());
        inner
            .in_edges
            .entry(dst.clone())
            .or_default()
            .insert(src.clone(), attrs.clone());
        let version = self.bump_version();
        Ok(FanoutEvent::EdgeAdded {
            version,
            src: src.clone(),
            dst: dst.clone(),
            attrs,
        })
    }

    pub fn remove_edge(&self, src: &NodeId, dst: &NodeId) -> CoreResult<FanoutEvent> {
        let mut inner = self.inner.write();
        let removed = inner
            .out_edges
            .get_mut(src)
            .map(|m| m.remove(dst).is_some())
            .unwrap_or(false);
        if !removed {
            return Err(CoreError::NotFound {
                what: format!("edge '{src}' -> '{dst}'"),
            });
        }
        if let Some(m) = inner.in_edges.get_mut(dst) {
            m.remove(src);
        }
        let version = self.bump_version();
        Ok(FanoutEvent::EdgeRemoved {
            version,
            src: src.clone(),
            dst: dst.clone(),
        })
    }

    pub fn get_node(&self, id: &NodeId) -> CoreResult<Node> {
        let inner = self.inner.read();
        inner
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found_node(id))
    }

    /// BFS neighbor walk. See `GraphSnapshot::neighbors` for tie-break
    /// rules.
    pub fn neighbors(
        &self,
        id: &NodeId,
        direction: Direction,
        max_depth: usize,
    ) -> CoreResult<Vec<(Node, usize)>> {
        let snap = self.snapshot();
        if !snap.nodes.contains_key(id) {
            return Err(CoreError::not_found_node(id));
        }
        Ok(snap
            .neighbors(id, direction, max_depth)
            .into_iter()
            .filter_map(|(nid, depth)| snap.node(&nid).cloned().map(|n| (n, depth)))
            .collect())
    }

    /// The reachable subgraph from `seeds`, as a consistent read-only
    /// snapshot. Direction defaults to `Both` — see DESIGN.md for why the
    /// generic contract doesn't fix a direction (callers that need a
    /// specific one, like the cascade engine's work-budget estimate, use
    /// `GraphSnapshot::reachable_from` directly on a snapshot they already
    /// hold).
    pub fn subgraph(&self, seeds: &[NodeId], max_depth: usize) -> GraphSnapshot {
        let snap = self.snapshot();
        snap.reachable_from(seeds, Direction::Both, max_depth)
    }

    /// A consistent, immutable view of the entire graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let inner = self.inner.read();
        GraphSnapshot {
            version: self.version(),
            nodes: inner.nodes.clone(),
            out_edges: inner.out_edges.clone(),
            in_edges: inner.in_edges.clone(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    fn node(id: &str, capacity: f64) -> Node {
        Node::new(NodeId::from(id), NodeKind::Power, capacity).unwrap()
    }

    fn edge() -> EdgeAttrs {
        EdgeAttrs {
            strength: 1.0,
            propagation_probability: 1.0,
            latency_ms: 60_000.0,
            properties: Default::default(),
        }
    }

    #[test]
    fn add_node_then_conflict() {
        let store = GraphStore::new();
        store.add_node(node("a", 10.0)).unwrap();
        let err = store.add_node(node("a", 5.0)).unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }

    #[test]
    fn add_edge_rejects_self_loop() {
        let store = GraphStore::new();
        store.add_node(node("a", 10.0)).unwrap();
        let err = store
            .add_edge(&NodeId::from("a"), &NodeId::from("a"), edge())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest { .. }));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let store = GraphStore::new();
        store.add_node(node("a", 10.0)).unwrap();
        store.add_node(node("b", 10.0)).unwrap();
        store
            .add_edge(&NodeId::from("a"), &NodeId::from("b"), edge())
            .unwrap();
        store.remove_node(&NodeId::from("b")).unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.out_edges(&NodeId::from("a")).count(), 0);
    }

    #[test]
    fn neighbors_are_lexicographically_ordered() {
        let store = GraphStore::new();
        for id in ["a", "z", "m"] {
            store.add_node(node(id, 10.0)).unwrap();
        }
        store.add_node(node("root", 10.0)).unwrap();
        for id in ["z", "a", "m"] {
            store
                .add_edge(&NodeId::from("root"), &NodeId::from(id), edge())
                .unwrap();
        }
        let ns = store
            .neighbors(&NodeId::from("root"), Direction::Out, 1)
            .unwrap();
        let ids: Vec<String> = ns.into_iter().map(|(n, _)| n.id.0).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let store = GraphStore::new();
        store.add_node(node("a", 10.0)).unwrap();
        let snap = store.snapshot();
        store.add_node(node("b", 10.0)).unwrap();
        assert_eq!(snap.node_count(), 1);
        assert_eq!(store.node_count(), 2);
    }
}
