//! The event bus payloads — everything published through `fanout::EventBus`.
//!
//! RULE: subscribers receive these and only these variants. New topics get
//! a new `Topic` entry and a new `FanoutEvent` variant — existing variants
//! are never removed or reordered (external collaborators may have
//! serialized/matched on them).

use crate::graph::{EdgeAttrs, Node};
use crate::types::{GraphVersion, NodeId};
use serde::{Deserialize, Serialize};

/// The fan-out topics this core publishes. `IngestionPassthrough` is a
/// supplemental topic (see SPEC_FULL.md §10.1) alongside the four spec.md
/// names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    GraphMutation,
    SimulationStarted,
    SimulationCompleted,
    SimulationFailed,
    IngestionPassthrough,
}

/// Every event emitted by the core. Variants are added per topic — never
/// removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FanoutEvent {
    NodeAdded {
        version: GraphVersion,
        node: Node,
    },
    NodeUpdated {
        version: GraphVersion,
        node_id: NodeId,
    },
    NodeRemoved {
        version: GraphVersion,
        node_id: NodeId,
    },
    EdgeAdded {
        version: GraphVersion,
        src: NodeId,
        dst: NodeId,
        attrs: EdgeAttrs,
    },
    EdgeRemoved {
        version: GraphVersion,
        src: NodeId,
        dst: NodeId,
    },
    IngestionPassthrough {
        source_id: String,
        data_type: String,
    },
    SimulationStarted {
        scenario_name: String,
        fingerprint: String,
        monte_carlo_runs: u32,
    },
    SimulationCompleted {
        scenario_name: String,
        fingerprint: String,
        computation_time_seconds: f64,
        completed_runs: u32,
    },
    SimulationFailed {
        scenario_name: String,
        fingerprint: String,
        reason: String,
    },
}

impl FanoutEvent {
    /// The topic a given event variant belongs to. Keeps publishers from
    /// having to repeat this mapping at every call site.
    pub fn topic(&self) -> Topic {
        match self {
            FanoutEvent::NodeAdded { .. }
            | FanoutEvent::NodeUpdated { .. }
            | FanoutEvent::NodeRemoved { .. }
            | FanoutEvent::EdgeAdded { .. }
            | FanoutEvent::EdgeRemoved { .. } => Topic::GraphMutation,
            FanoutEvent::IngestionPassthrough { .. } => Topic::IngestionPassthrough,
            FanoutEvent::SimulationStarted { .. } => Topic::SimulationStarted,
            FanoutEvent::SimulationCompleted { .. } => Topic::SimulationCompleted,
            FanoutEvent::SimulationFailed { .. } => Topic::SimulationFailed,
        }
    }
}
