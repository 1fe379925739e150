//! Concrete end-to-end scenarios from the testable-properties section.

use resilience_core::cascade::{simulate_sequential, EventKind, SimulationRequest, TriggerEvent};
use resilience_core::graph::{EdgeAttrs, GraphStore, Node};
use resilience_core::types::{NodeId, NodeKind};
use std::collections::HashMap;

fn dependency_edge() -> EdgeAttrs {
    EdgeAttrs {
        strength: 1.0,
        propagation_probability: 1.0,
        latency_ms: 60_000.0,
        properties: Default::default(),
    }
}

#[test]
fn two_node_deterministic_cascade() {
    let store = GraphStore::new();
    store.add_node(Node::new(NodeId::from("P"), NodeKind::Power, 100.0).unwrap()).unwrap();
    store.add_node(Node::new(NodeId::from("H"), NodeKind::Healthcare, 10.0).unwrap()).unwrap();
    store.add_edge(&NodeId::from("H"), &NodeId::from("P"), dependency_edge()).unwrap();

    let request = SimulationRequest {
        scenario_name: "two-node".into(),
        event: TriggerEvent {
            kind: EventKind::PowerOutage,
            severity: 1.0,
            environment: None,
        },
        initial_failures: vec![NodeId::from("P")],
        horizon_minutes: 10.0,
        time_step_minutes: 1.0,
        monte_carlo_runs: 100,
        confidence_level: 0.95,
        base_propagation_probability: 1.0,
        load_threshold_multiplier: f64::INFINITY,
        recovery_enabled: false,
        mean_recovery_time_minutes: None,
    };

    let snapshot = store.snapshot();
    let result = simulate_sequential(&snapshot, &HashMap::new(), &request, 42).unwrap();

    assert_eq!(result.failure_probability[&NodeId::from("P")], 1.0);
    assert_eq!(result.failure_probability[&NodeId::from("H")], 1.0);
    let mttf_h = result.mean_time_to_failure[&NodeId::from("H")];
    assert!((mttf_h - 1.0).abs() < 0.5, "expected H to fail around t=1min, got {mttf_h}");
}

#[test]
fn isolated_node_never_fails() {
    let store = GraphStore::new();
    store.add_node(Node::new(NodeId::from("P"), NodeKind::Power, 100.0).unwrap()).unwrap();
    store.add_node(Node::new(NodeId::from("H"), NodeKind::Healthcare, 10.0).unwrap()).unwrap();
    store.add_edge(&NodeId::from("H"), &NodeId::from("P"), dependency_edge()).unwrap();
    store.add_node(Node::new(NodeId::from("I"), NodeKind::Other, 5.0).unwrap()).unwrap();

    let request = SimulationRequest {
        scenario_name: "isolated".into(),
        event: TriggerEvent {
            kind: EventKind::PowerOutage,
            severity: 1.0,
            environment: None,
        },
        initial_failures: vec![NodeId::from("P")],
        horizon_minutes: 10.0,
        time_step_minutes: 1.0,
        monte_carlo_runs: 100,
        confidence_level: 0.95,
        base_propagation_probability: 1.0,
        load_threshold_multiplier: f64::INFINITY,
        recovery_enabled: false,
        mean_recovery_time_minutes: None,
    };

    let snapshot = store.snapshot();
    let result = simulate_sequential(&snapshot, &HashMap::new(), &request, 7).unwrap();
    assert_eq!(result.failure_probability[&NodeId::from("I")], 0.0);
}

#[test]
fn initial_failures_have_probability_one_and_zero_mttf() {
    let store = GraphStore::new();
    store.add_node(Node::new(NodeId::from("P"), NodeKind::Power, 100.0).unwrap()).unwrap();

    let request = SimulationRequest {
        scenario_name: "initial-closure".into(),
        event: TriggerEvent {
            kind: EventKind::PowerOutage,
            severity: 1.0,
            environment: None,
        },
        initial_failures: vec![NodeId::from("P")],
        horizon_minutes: 5.0,
        time_step_minutes: 1.0,
        monte_carlo_runs: 10,
        confidence_level: 0.95,
        base_propagation_probability: 1.0,
        load_threshold_multiplier: f64::INFINITY,
        recovery_enabled: false,
        mean_recovery_time_minutes: None,
    };

    let snapshot = store.snapshot();
    let result = simulate_sequential(&snapshot, &HashMap::new(), &request, 1).unwrap();
    assert_eq!(result.failure_probability[&NodeId::from("P")], 1.0);
    assert_eq!(result.mean_time_to_failure[&NodeId::from("P")], 0.0);
}
