//! Component E — the job coordinator. See spec §4.E.
//!
//! RULE: `Submit` is the only path into the cascade engine. Callers never
//! construct `RunTask`s or touch `JobState` directly.

pub mod job;
pub mod pool;

use crate::cascade::{compute_fingerprint, master_seed_from_fingerprint, Fingerprint, SimulationRequest};
use crate::criticality::CriticalityScorer;
use crate::error::{CoreError, CoreResult};
use crate::event::FanoutEvent;
use crate::fanout::EventBus;
use crate::graph::GraphStore;
use crossbeam_channel::{bounded, Sender};
use dashmap::DashMap;
use job::{JobHandle, JobState};
use pool::RunTask;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Configuration knobs this coordinator instance honors (spec §6).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub worker_pool_size: usize,
    pub queue_capacity: usize,
    /// Ceiling on `N · |affected subgraph| · (horizon/step)` a single
    /// request may cost (spec §4.C.5). `None` disables the check.
    pub work_budget: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: num_cpus::get(),
            queue_capacity: 64,
            work_budget: Some(50_000_000),
        }
    }
}

/// Schedules `SimulationRequest`s across a fixed worker pool,
/// deduplicating concurrent identical submissions and publishing
/// results through the event bus.
pub struct JobCoordinator {
    store: Arc<GraphStore>,
    scorer: Arc<dyn CriticalityScorer>,
    bus: Arc<EventBus>,
    in_flight: DashMap<Fingerprint, std::sync::Weak<JobState>>,
    sender: Sender<RunTask>,
    queue_len: Arc<AtomicUsize>,
    queue_capacity: usize,
    worker_pool_size: usize,
    work_budget: Option<u64>,
    workers: Vec<JoinHandle<()>>,
}

impl JobCoordinator {
    pub fn new(
        store: Arc<GraphStore>,
        scorer: Arc<dyn CriticalityScorer>,
        bus: Arc<EventBus>,
        config: CoordinatorConfig,
    ) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity + config.worker_pool_size);
        let workers = pool::spawn_workers(receiver, config.worker_pool_size.max(1));
        Self {
            store,
            scorer,
            bus,
            in_flight: DashMap::new(),
            sender,
            queue_len: Arc::new(AtomicUsize::new(0)),
            queue_capacity: config.queue_capacity,
            worker_pool_size: config.worker_pool_size.max(1),
            work_budget: config.work_budget,
            workers,
        }
    }

    /// Submit a simulation request. Attaches to an in-flight job with
    /// the same fingerprint if one exists; otherwise dispatches a fresh
    /// batch of `monte_carlo_runs` work units (spec §4.E).
    pub fn submit(&self, request: SimulationRequest) -> CoreResult<JobHandle> {
        request.validate().map_err(CoreError::invalid)?;
        for id in &request.initial_failures {
            if self.store.get_node(id).is_err() {
                return Err(CoreError::invalid(format!("unknown initial failure node '{id}'")));
            }
        }

        let snapshot = Arc::new(self.store.snapshot());
        let fingerprint = compute_fingerprint(snapshot.version, &request);

        if let Some(handle) = self.attach(fingerprint) {
            return Ok(handle);
        }

        if let Some(budget) = self.work_budget {
            let affected = snapshot
                .reachable_from(&request.initial_failures, crate::types::Direction::Both, usize::MAX)
                .node_count()
                .max(1) as u64;
            let ticks = request.tick_count().max(1) as u64;
            let estimated = (request.monte_carlo_runs as u64) * affected * ticks;
            if estimated > budget {
                return Err(CoreError::BudgetExceeded { estimated, budget });
            }
        }

        // Fail fast if the whole batch can't fit pool + queue capacity
        // (spec §4.E "rejected with overloaded, fail-fast not block").
        let capacity = self.worker_pool_size + self.queue_capacity;
        let runs = request.monte_carlo_runs as usize;
        if self.queue_len.load(Ordering::SeqCst) + runs > capacity {
            return Err(CoreError::Overloaded { capacity });
        }

        let criticality = Arc::new(self.scorer.score(&snapshot));
        let master_seed = master_seed_from_fingerprint(fingerprint);
        let job = JobState::new(fingerprint, request.clone(), master_seed, snapshot, criticality);
        job.runs_dispatched.store(runs, Ordering::SeqCst);
        self.in_flight.insert(fingerprint, Arc::downgrade(&job));

        self.bus.publish(FanoutEvent::SimulationStarted {
            scenario_name: request.scenario_name.clone(),
            fingerprint: fingerprint.to_string(),
            monte_carlo_runs: request.monte_carlo_runs,
        });

        for run_index in 0..request.monte_carlo_runs {
            self.queue_len.fetch_add(1, Ordering::SeqCst);
            let task = RunTask {
                job: job.clone(),
                run_index,
                bus: self.bus.clone(),
                queue_len: self.queue_len.clone(),
            };
            // Capacity was checked above; a bounded channel send can
            // still block briefly under contention, which is the
            // intended suspension point (spec §5), not a failure.
            if self.sender.send(task).is_err() {
                self.queue_len.fetch_sub(1, Ordering::SeqCst);
            }
        }

        Ok(JobHandle { state: job })
    }

    fn attach(&self, fingerprint: Fingerprint) -> Option<JobHandle> {
        let entry = self.in_flight.get(&fingerprint)?;
        let state = entry.upgrade()?;
        if state.is_finished() {
            return None;
        }
        state.attached.fetch_add(1, Ordering::SeqCst);
        Some(JobHandle { state })
    }

    /// Number of worker threads backing this coordinator.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting new work and wait for every worker thread to
    /// drain the queue and exit. Consumes the coordinator — mirrors
    /// `Platform::shutdown`'s explicit-lifecycle style.
    pub fn shutdown(self) {
        let JobCoordinator { sender, workers, .. } = self;
        drop(sender);
        for handle in workers {
            let _ = handle.join();
        }
    }
}
