//! Node and edge attribute types. See spec §3.

use crate::error::{CoreError, CoreResult};
use crate::types::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub capacity: f64,
    pub load: f64,
    pub health: f64,
    pub criticality: f64,
    pub location: Option<(f64, f64)>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
    pub updated_at: u64,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, capacity: f64) -> CoreResult<Self> {
        if capacity < 0.0 {
            return Err(CoreError::invalid("capacity must be >= 0"));
        }
        Ok(Self {
            id,
            kind,
            capacity,
            load: 0.0,
            health: 1.0,
            criticality: 0.0,
            location: None,
            properties: HashMap::new(),
            updated_at: 0,
        })
    }

    /// Ratio of load to capacity. Infinite if capacity is zero and load is
    /// positive; zero if both are zero.
    pub fn load_factor(&self) -> f64 {
        if self.capacity <= 0.0 {
            if self.load > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            self.load / self.capacity
        }
    }

    pub(crate) fn validate_invariants(&self) -> CoreResult<()> {
        if self.capacity < 0.0 {
            return Err(CoreError::invalid("capacity must be >= 0"));
        }
        if self.load < 0.0 {
            return Err(CoreError::invalid("load must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.health) {
            return Err(CoreError::invalid("health must be in [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.criticality) {
            return Err(CoreError::invalid("criticality must be in [0,1]"));
        }
        Ok(())
    }
}

/// A partial update applied through `GraphStore::update_node`. `None`
/// fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDelta {
    pub load: Option<f64>,
    pub health: Option<f64>,
    pub capacity: Option<f64>,
    pub location: Option<(f64, f64)>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl NodeDelta {
    pub fn apply(&self, node: &mut Node) -> CoreResult<()> {
        if let Some(load) = self.load {
            node.load = load;
        }
        if let Some(health) = self.health {
            node.health = health;
        }
        if let Some(capacity) = self.capacity {
            node.capacity = capacity;
        }
        if let Some(loc) = self.location {
            node.location = Some(loc);
        }
        for (k, v) in &self.properties {
            node.properties.insert(k.clone(), v.clone());
        }
        node.validate_invariants()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeAttrs {
    pub strength: f64,
    pub propagation_probability: f64,
    pub latency_ms: f64,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl EdgeAttrs {
    pub(crate) fn validate_invariants(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(CoreError::invalid("edge strength must be in [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.propagation_probability) {
            return Err(CoreError::invalid(
                "edge propagation_probability must be in [0,1]",
            ));
        }
        if self.latency_ms < 0.0 {
            return Err(CoreError::invalid("edge latency_ms must be >= 0"));
        }
        Ok(())
    }
}
