//! `event_multiplier` — how much an initiating event amplifies a given
//! dependency edge's propagation probability. See spec §4.C.1.
//!
//! Bounded to [0.5, 3.0] as spec.md requires. The table is qualitative by
//! design (spec.md only describes examples, not exact coefficients); the
//! mapping below is the Open Question resolution recorded in DESIGN.md.

use crate::cascade::request::{EnvironmentRange, EventKind, TriggerEvent};
use crate::graph::EdgeAttrs;
use crate::types::NodeKind;

const MIN_MULTIPLIER: f64 = 0.5;
const MAX_MULTIPLIER: f64 = 3.0;

/// `upstream_kind` is the kind of the node whose failure is propagating
/// (the dependency, i.e. `edge`'s destination).
pub fn event_multiplier(event: &TriggerEvent, edge: &EdgeAttrs, upstream_kind: NodeKind) -> f64 {
    let base = match (event.kind, upstream_kind) {
        (EventKind::Hurricane, NodeKind::Power) => 1.0 + event.severity * 1.5,
        (EventKind::Hurricane, NodeKind::Transport) => 1.0 + event.severity * 1.2,
        (EventKind::Hurricane, NodeKind::Telecom) => 1.0 + event.severity * 0.8,
        (EventKind::Hurricane, _) => 1.0 + event.severity * 0.4,

        (EventKind::Earthquake, NodeKind::Power) => 1.0 + event.severity * 1.3,
        (EventKind::Earthquake, NodeKind::Water) => 1.0 + event.severity * 1.3,
        (EventKind::Earthquake, NodeKind::Transport) => 1.0 + event.severity * 1.4,
        (EventKind::Earthquake, NodeKind::Telecom) => 1.0 + event.severity * 0.6,
        (EventKind::Earthquake, _) => 1.0 + event.severity * 0.5,

        (EventKind::Flood, NodeKind::Water) => 1.0 + event.severity * 1.5,
        (EventKind::Flood, NodeKind::Power) => 1.0 + event.severity * 1.2,
        (EventKind::Flood, NodeKind::Transport) => 1.0 + event.severity * 1.1,
        (EventKind::Flood, _) => 1.0 + event.severity * 0.4,

        (EventKind::Cyberattack, NodeKind::Telecom) => 1.0 + event.severity * 1.8,
        (EventKind::Cyberattack, NodeKind::Healthcare) => 1.0 + event.severity * 1.2,
        (EventKind::Cyberattack, NodeKind::Emergency) => 1.0 + event.severity * 1.1,
        (EventKind::Cyberattack, _) => 1.0 + event.severity * 0.3,

        (EventKind::PowerOutage, NodeKind::Power) => 1.0 + event.severity * 2.0,
        (EventKind::PowerOutage, _) => 1.0 + event.severity * 0.9,

        (EventKind::Other, _) => 1.0 + event.severity * 0.5,
    };

    let env_factor = event
        .environment
        .as_ref()
        .map(|env| environment_modulation(event.kind, env))
        .unwrap_or(1.0);

    // Edge strength further modulates exposure: a weakly-coupled
    // dependency is less amplified by the same event than a strong one.
    let coupled = 1.0 + (base - 1.0) * (0.5 + 0.5 * edge.strength);

    (coupled * env_factor).clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

fn environment_modulation(kind: EventKind, env: &EnvironmentRange) -> f64 {
    let mut factor = 1.0;
    if let (EventKind::Hurricane, Some((lo, hi))) = (kind, env.wind_speed_kph) {
        let avg = (lo + hi) / 2.0;
        factor *= 1.0 + (avg / 200.0).min(0.5);
    }
    if let (EventKind::Flood, Some((lo, hi))) = (kind, env.precipitation_mm) {
        let avg = (lo + hi) / 2.0;
        factor *= 1.0 + (avg / 300.0).min(0.5);
    }
    factor
}
