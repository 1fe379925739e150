//! Wire record and payload schemas. See spec §4.D/§6.

use crate::error::{CoreError, CoreResult};
use crate::graph::{EdgeAttrs, Node, NodeDelta};
use crate::types::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The six `data_type` values the core recognizes. Anything else is
/// `Unknown` and is passed through to fan-out subscribers but never
/// applied to the graph (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    SensorLoad,
    SensorHealth,
    TopologyNodeUpsert,
    TopologyNodeRemove,
    TopologyEdgeUpsert,
    TopologyEdgeRemove,
    Unknown(String),
}

impl DataType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "sensor.load" => DataType::SensorLoad,
            "sensor.health" => DataType::SensorHealth,
            "topology.node.upsert" => DataType::TopologyNodeUpsert,
            "topology.node.remove" => DataType::TopologyNodeRemove,
            "topology.edge.upsert" => DataType::TopologyEdgeUpsert,
            "topology.edge.remove" => DataType::TopologyEdgeRemove,
            other => DataType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataType::SensorLoad => "sensor.load",
            DataType::SensorHealth => "sensor.health",
            DataType::TopologyNodeUpsert => "topology.node.upsert",
            DataType::TopologyNodeRemove => "topology.node.remove",
            DataType::TopologyEdgeUpsert => "topology.edge.upsert",
            DataType::TopologyEdgeRemove => "topology.edge.remove",
            DataType::Unknown(raw) => raw,
        }
    }
}

/// The accepted wire format (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub source_id: String,
    /// Milliseconds since epoch. Callers that receive ISO8601 on the
    /// wire convert before constructing this type, matching how the
    /// rest of the core measures wall time only for ordering, never for
    /// simulation logic (spec §6 "Clock").
    pub timestamp_ms: i64,
    pub data_type: String,
    pub payload: serde_json::Value,
    pub quality_score: f64,
}

/// What an accepted record resolves to. `Passthrough` carries records
/// whose `data_type` isn't one of the six recognized values — published
/// but never applied (spec §6).
#[derive(Debug, Clone)]
pub enum Mutation {
    UpsertNode(Node),
    UpdateNode { id: NodeId, delta: NodeDelta },
    RemoveNode(NodeId),
    UpsertEdge { src: NodeId, dst: NodeId, attrs: EdgeAttrs },
    RemoveEdge { src: NodeId, dst: NodeId },
    Passthrough { source_id: String, data_type: String },
}

#[derive(Deserialize)]
struct SensorLoadPayload {
    node_id: String,
    load: f64,
}

#[derive(Deserialize)]
struct SensorHealthPayload {
    node_id: String,
    health: f64,
}

#[derive(Deserialize)]
struct NodeUpsertPayload {
    node_id: String,
    kind: NodeKind,
    capacity: f64,
    #[serde(default)]
    location: Option<(f64, f64)>,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct NodeRemovePayload {
    node_id: String,
}

#[derive(Deserialize)]
struct EdgeUpsertPayload {
    src: String,
    dst: String,
    strength: f64,
    propagation_probability: f64,
    #[serde(default)]
    latency_ms: f64,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct EdgeRemovePayload {
    src: String,
    dst: String,
}

/// Validate `record` against its `data_type`'s schema and derive the
/// mutation it describes. Rejects with `invalid_request` on schema
/// mismatch (spec §4.D step 1); unrecognized `data_type`s never fail
/// schema validation — they resolve to `Passthrough`.
pub fn derive_mutation(record: &IngestionRecord) -> CoreResult<Mutation> {
    let data_type = DataType::parse(&record.data_type);
    match data_type {
        DataType::SensorLoad => {
            let p: SensorLoadPayload = parse_payload(&record.payload)?;
            Ok(Mutation::UpdateNode {
                id: NodeId::from(p.node_id.as_str()),
                delta: NodeDelta {
                    load: Some(p.load),
                    ..Default::default()
                },
            })
        }
        DataType::SensorHealth => {
            let p: SensorHealthPayload = parse_payload(&record.payload)?;
            Ok(Mutation::UpdateNode {
                id: NodeId::from(p.node_id.as_str()),
                delta: NodeDelta {
                    health: Some(p.health),
                    ..Default::default()
                },
            })
        }
        DataType::TopologyNodeUpsert => {
            let p: NodeUpsertPayload = parse_payload(&record.payload)?;
            let mut node = Node::new(NodeId::from(p.node_id.as_str()), p.kind, p.capacity)?;
            node.location = p.location;
            node.properties = p.properties;
            Ok(Mutation::UpsertNode(node))
        }
        DataType::TopologyNodeRemove => {
            let p: NodeRemovePayload = parse_payload(&record.payload)?;
            Ok(Mutation::RemoveNode(NodeId::from(p.node_id.as_str())))
        }
        DataType::TopologyEdgeUpsert => {
            let p: EdgeUpsertPayload = parse_payload(&record.payload)?;
            Ok(Mutation::UpsertEdge {
                src: NodeId::from(p.src.as_str()),
                dst: NodeId::from(p.dst.as_str()),
                attrs: EdgeAttrs {
                    strength: p.strength,
                    propagation_probability: p.propagation_probability,
                    latency_ms: p.latency_ms,
                    properties: p.properties,
                },
            })
        }
        DataType::TopologyEdgeRemove => {
            let p: EdgeRemovePayload = parse_payload(&record.payload)?;
            Ok(Mutation::RemoveEdge {
                src: NodeId::from(p.src.as_str()),
                dst: NodeId::from(p.dst.as_str()),
            })
        }
        DataType::Unknown(raw) => Ok(Mutation::Passthrough {
            source_id: record.source_id.clone(),
            data_type: raw,
        }),
    }
}

fn parse_payload<T: for<'de> Deserialize<'de>>(payload: &serde_json::Value) -> CoreResult<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| CoreError::invalid(format!("payload schema mismatch: {e}")))
}
