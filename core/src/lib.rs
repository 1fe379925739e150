//! Urban-infrastructure resilience core: a concurrently-readable
//! dependency graph, a pluggable criticality scorer, a Monte-Carlo
//! cascading-failure simulator, and the ingestion/coordination
//! concurrency fabric that ties them together.
//!
//! See [`platform::Platform`] for the single entry point external
//! collaborators construct.

pub mod cascade;
pub mod clock;
pub mod coordinator;
pub mod criticality;
pub mod error;
pub mod event;
pub mod fanout;
pub mod graph;
pub mod ingestion;
pub mod platform;
pub mod rng;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use platform::{Platform, PlatformConfig};
