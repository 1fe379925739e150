//! Shared primitive types used across the entire core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, globally unique identifier for a graph node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The tag assigned to a node on creation. Not reinterpreted beyond what
/// the scorer and cascade engine use it for (event-multiplier lookups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Power,
    Water,
    Telecom,
    Transport,
    Healthcare,
    Emergency,
    Other,
}

/// Direction to traverse when walking the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges pointing *into* the node (who depends on me).
    In,
    /// Follow edges pointing *out of* the node (what I depend on).
    Out,
    Both,
}

/// Simulated wall-clock offset, in minutes, from the start of a run.
pub type Minutes = f64;

/// A logical, strictly monotonic mutation counter. Not wall-clock time —
/// see DESIGN.md for why a logical clock was chosen over `Instant`.
pub type LogicalTime = u64;

/// The graph's structural version number. Bumped on every mutation;
/// snapshots and cached criticality scores both carry the version they
/// were computed at.
pub type GraphVersion = u64;
