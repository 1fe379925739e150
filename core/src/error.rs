//! The one error enum for the entire core. See spec §7 — these are
//! contracts, not exception hierarchies: callers match on kind, never on
//! message text.

use crate::types::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("conflict: {what}")]
    Conflict { what: String },

    #[error("stale record for source '{source_id}': record ts {record_ts}, last applied {last_applied}")]
    Stale {
        source_id: String,
        record_ts: i64,
        last_applied: i64,
    },

    #[error("quality score {score} below threshold {threshold}")]
    LowQuality { score: f64, threshold: f64 },

    #[error("ingestion backpressure: buffer at capacity {capacity}")]
    Backpressure { capacity: usize },

    #[error("coordinator overloaded: queue at capacity {capacity}")]
    Overloaded { capacity: usize },

    #[error("simulation work budget exceeded: estimated {estimated}, budget {budget}")]
    BudgetExceeded { estimated: u64, budget: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("partial result: {completed}/{requested} runs completed")]
    Partial { completed: u32, requested: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal invariant failure: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn not_found_node(id: &NodeId) -> Self {
        Self::NotFound {
            what: format!("node '{id}'"),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
