//! Optional cold-start snapshot I/O (spec §6, supplement §10.2).
//!
//! Format: an array of nodes followed by an array of edges, each record
//! one JSON object per line. Not used by the core's normal operation —
//! the core is in-memory by contract — but provided for external
//! collaborators that want to warm-start a `GraphStore` from a prior dump.

use super::{EdgeAttrs, GraphStore, Node};
use crate::error::CoreResult;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

#[derive(Serialize, Deserialize)]
struct EdgeLine {
    src: NodeId,
    dst: NodeId,
    #[serde(flatten)]
    attrs: EdgeAttrs,
}

/// Load nodes then edges from a JSON-lines stream into a fresh
/// `GraphStore`. Node lines and edge lines are distinguished by the
/// presence of an `id` vs. `src`/`dst` field.
pub fn load_snapshot<R: BufRead>(reader: R) -> CoreResult<GraphStore> {
    let store = GraphStore::new();
    let mut edge_lines: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(trimmed)?;
        if value.get("src").is_some() && value.get("dst").is_some() {
            edge_lines.push(trimmed.to_string());
            continue;
        }
        let node: Node = serde_json::from_value(value)?;
        store.add_node(node)?;
    }

    for line in edge_lines {
        let edge: EdgeLine = serde_json::from_str(&line)?;
        store.add_edge(&edge.src, &edge.dst, edge.attrs)?;
    }

    Ok(store)
}

/// Dump a store's current snapshot as JSON-lines: all nodes, then all
/// edges.
pub fn dump_snapshot<W: Write>(store: &GraphStore, mut writer: W) -> CoreResult<()> {
    let snap = store.snapshot();
    for node in snap.nodes() {
        writeln!(writer, "{}", serde_json::to_string(node)?)?;
    }
    for node in snap.nodes() {
        for (dst, attrs) in snap.out_edges(&node.id) {
            let line = EdgeLine {
                src: node.id.clone(),
                dst: dst.clone(),
                attrs: attrs.clone(),
            };
            writeln!(writer, "{}", serde_json::to_string(&line)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;
    use std::io::Cursor;

    #[test]
    fn round_trips_nodes_and_edges() {
        let store = GraphStore::new();
        store
            .add_node(Node::new(NodeId::from("p"), NodeKind::Power, 100.0).unwrap())
            .unwrap();
        store
            .add_node(Node::new(NodeId::from("h"), NodeKind::Healthcare, 10.0).unwrap())
            .unwrap();
        store
            .add_edge(
                &NodeId::from("h"),
                &NodeId::from("p"),
                EdgeAttrs {
                    strength: 1.0,
                    propagation_probability: 1.0,
                    latency_ms: 60_000.0,
                    properties: Default::default(),
                },
            )
            .unwrap();

        let mut buf = Vec::new();
        dump_snapshot(&store, &mut buf).unwrap();

        let loaded = load_snapshot(Cursor::new(buf)).unwrap();
        assert_eq!(loaded.node_count(), 2);
        let snap = loaded.snapshot();
        assert_eq!(snap.edge(&NodeId::from("h"), &NodeId::from("p")).unwrap().strength, 1.0);
    }
}
