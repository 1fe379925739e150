//! Integration coverage for the job coordinator's concurrency fabric:
//! dedup, overload rejection, and cancellation — properties that only
//! show up once `submit` is exercised through the real worker pool, not
//! the sequential `simulate_sequential` shortcut the CLI uses.

use resilience_core::coordinator::{CoordinatorConfig, JobCoordinator};
use resilience_core::criticality::DefaultScorer;
use resilience_core::fanout::EventBus;
use resilience_core::graph::{EdgeAttrs, GraphStore, Node};
use resilience_core::types::{NodeId, NodeKind};
use resilience_core::cascade::{EventKind, SimulationRequest, TriggerEvent};
use std::sync::Arc;
use std::time::Duration;

fn store_with_chain() -> Arc<GraphStore> {
    let store = GraphStore::new();
    store.add_node(Node::new(NodeId::from("p"), NodeKind::Power, 100.0).unwrap()).unwrap();
    store.add_node(Node::new(NodeId::from("h"), NodeKind::Healthcare, 10.0).unwrap()).unwrap();
    store
        .add_edge(
            &NodeId::from("h"),
            &NodeId::from("p"),
            EdgeAttrs {
                strength: 1.0,
                propagation_probability: 1.0,
                latency_ms: 0.0,
                properties: Default::default(),
            },
        )
        .unwrap();
    Arc::new(store)
}

fn request(runs: u32) -> SimulationRequest {
    SimulationRequest {
        scenario_name: "coordinator-test".into(),
        event: TriggerEvent {
            kind: EventKind::PowerOutage,
            severity: 1.0,
            environment: None,
        },
        initial_failures: vec![NodeId::from("p")],
        horizon_minutes: 5.0,
        time_step_minutes: 1.0,
        monte_carlo_runs: runs,
        confidence_level: 0.95,
        base_propagation_probability: 1.0,
        load_threshold_multiplier: f64::INFINITY,
        recovery_enabled: false,
        mean_recovery_time_minutes: None,
    }
}

fn coordinator(store: Arc<GraphStore>, config: CoordinatorConfig) -> JobCoordinator {
    let bus = Arc::new(EventBus::default());
    let scorer = Arc::new(DefaultScorer::default());
    JobCoordinator::new(store, scorer, bus, config)
}

#[test]
fn identical_concurrent_submissions_share_one_execution() {
    let store = store_with_chain();
    let coordinator = coordinator(store, CoordinatorConfig::default());

    let handle_a = coordinator.submit(request(50)).unwrap();
    let handle_b = coordinator.submit(request(50)).unwrap();
    assert_eq!(handle_a.fingerprint(), handle_b.fingerprint());

    let result_a = handle_a.await_result(Some(Duration::from_secs(30))).unwrap();
    let result_b = handle_b.await_result(Some(Duration::from_secs(30))).unwrap();

    assert_eq!(result_a.failure_probability, result_b.failure_probability);
    assert_eq!(result_a.completed_runs, 50, "dedup must not double the run count");
}

#[test]
fn resubmitting_after_completion_starts_fresh_work() {
    let store = store_with_chain();
    let coordinator = coordinator(store, CoordinatorConfig::default());

    let first = coordinator.submit(request(10)).unwrap();
    let _ = first.await_result(Some(Duration::from_secs(30))).unwrap();
    drop(first);

    let second = coordinator.submit(request(10)).unwrap();
    let result = second.await_result(Some(Duration::from_secs(30))).unwrap();
    assert_eq!(result.completed_runs, 10);
}

#[test]
fn oversized_batch_is_rejected_as_overloaded() {
    let store = store_with_chain();
    let config = CoordinatorConfig {
        worker_pool_size: 1,
        queue_capacity: 1,
        ..CoordinatorConfig::default()
    };
    let coordinator = coordinator(store, config);

    let err = coordinator.submit(request(100)).unwrap_err();
    assert!(matches!(err, resilience_core::CoreError::Overloaded { .. }));
}

#[test]
fn request_exceeding_work_budget_is_rejected() {
    let store = store_with_chain();
    let config = CoordinatorConfig {
        work_budget: Some(1),
        ..CoordinatorConfig::default()
    };
    let coordinator = coordinator(store, config);

    let err = coordinator.submit(request(1000)).unwrap_err();
    assert!(matches!(err, resilience_core::CoreError::BudgetExceeded { .. }));
}

#[test]
fn unknown_initial_failure_node_is_rejected_as_invalid() {
    let store = store_with_chain();
    let coordinator = coordinator(store, CoordinatorConfig::default());

    let mut req = request(5);
    req.initial_failures = vec![NodeId::from("does-not-exist")];
    let err = coordinator.submit(req).unwrap_err();
    assert!(matches!(err, resilience_core::CoreError::InvalidRequest { .. }));
}

#[test]
fn cancelling_every_handle_surfaces_as_cancelled() {
    let store = store_with_chain();
    let coordinator = coordinator(store, CoordinatorConfig::default());

    let handle = coordinator.submit(request(200)).unwrap();
    handle.cancel();
    let outcome = handle.await_result(Some(Duration::from_secs(30)));
    // Either every run raced to completion before the cancel flag landed,
    // or the job reports Cancelled — both are acceptable, but a hang is not.
    match outcome {
        Ok(_) => {}
        Err(e) => assert!(matches!(*e, resilience_core::CoreError::Cancelled)),
    }
}
