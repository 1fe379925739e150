//! Simulation request types. See spec §3.

use crate::types::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Hurricane,
    Earthquake,
    Flood,
    Cyberattack,
    PowerOutage,
    Other,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EnvironmentRange {
    pub temperature_c: Option<(f64, f64)>,
    pub wind_speed_kph: Option<(f64, f64)>,
    pub precipitation_mm: Option<(f64, f64)>,
}

/// The trigger for a simulation — "Event" in spec §3, renamed here to
/// avoid colliding with `event::FanoutEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub severity: f64,
    pub environment: Option<EnvironmentRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub scenario_name: String,
    pub event: TriggerEvent,
    pub initial_failures: Vec<NodeId>,
    pub horizon_minutes: f64,
    pub time_step_minutes: f64,
    pub monte_carlo_runs: u32,
    pub confidence_level: f64,
    pub base_propagation_probability: f64,
    /// Use `f64::INFINITY` to disable stress-based propagation entirely
    /// (spec §8 property 4).
    pub load_threshold_multiplier: f64,
    pub recovery_enabled: bool,
    pub mean_recovery_time_minutes: Option<f64>,
}

impl SimulationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_failures.is_empty() {
            return Err("initial_failures must be non-empty".into());
        }
        if self.horizon_minutes <= 0.0 {
            return Err("horizon_minutes must be > 0".into());
        }
        if self.time_step_minutes <= 0.0 || self.time_step_minutes > self.horizon_minutes {
            return Err("time_step_minutes must be in (0, horizon_minutes]".into());
        }
        if self.monte_carlo_runs == 0 {
            return Err("monte_carlo_runs must be positive".into());
        }
        if !(0.0..1.0).contains(&self.confidence_level) {
            return Err("confidence_level must be in (0,1)".into());
        }
        if !(0.0..=1.0).contains(&self.base_propagation_probability) {
            return Err("base_propagation_probability must be in [0,1]".into());
        }
        if self.recovery_enabled && self.mean_recovery_time_minutes.unwrap_or(0.0) <= 0.0 {
            return Err("mean_recovery_time_minutes must be > 0 when recovery is enabled".into());
        }
        Ok(())
    }

    pub fn tick_count(&self) -> u32 {
        (self.horizon_minutes / self.time_step_minutes).ceil() as u32
    }
}
