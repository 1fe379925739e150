//! Per-submission job state and caller-facing handles. See spec §4.E.

use crate::cascade::{AggregateResult, Fingerprint, RunResult, SimulationRequest};
use crate::clock::StopWatch;
use crate::error::{CoreError, CoreResult};
use crate::graph::GraphSnapshot;
use crate::types::NodeId;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared state for one in-flight (or completed) simulation job. Every
/// `Submit` call with the same fingerprint attaches another handle to
/// the same `JobState` instead of starting duplicate work (spec §4.E).
pub struct JobState {
    pub fingerprint: Fingerprint,
    pub request: SimulationRequest,
    pub master_seed: u64,
    /// The snapshot and criticality map every run in this job was
    /// dispatched against — held here, not re-fetched per run, so every
    /// run in the job sees the exact same graph state (spec §4.E
    /// "uses a consistent snapshot").
    pub snapshot: Arc<GraphSnapshot>,
    pub criticality: Arc<HashMap<NodeId, f64>>,
    /// Number of handles currently attached. The job is cancelled when
    /// this reaches zero via an explicit `Cancel` (spec §4.E).
    pub attached: AtomicUsize,
    pub cancel: AtomicBool,
    pub runs_dispatched: AtomicUsize,
    pub runs_settled: AtomicUsize,
    results: Mutex<Vec<RunResult>>,
    outcome: Mutex<Option<Result<Arc<AggregateResult>, Arc<CoreError>>>>,
    done: Condvar,
    stopwatch: StopWatch,
}

impl JobState {
    pub fn new(
        fingerprint: Fingerprint,
        request: SimulationRequest,
        master_seed: u64,
        snapshot: Arc<GraphSnapshot>,
        criticality: Arc<HashMap<NodeId, f64>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            fingerprint,
            request,
            master_seed,
            snapshot,
            criticality,
            attached: AtomicUsize::new(1),
            cancel: AtomicBool::new(false),
            runs_dispatched: AtomicUsize::new(0),
            runs_settled: AtomicUsize::new(0),
            results: Mutex::new(Vec::new()),
            outcome: Mutex::new(None),
            done: Condvar::new(),
            stopwatch: StopWatch::start(),
        })
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.stopwatch.elapsed_seconds()
    }

    /// Record one run's result (or its absence after a failed retry) and
    /// report whether this was the job's last outstanding run.
    pub fn record_run(&self, result: Option<RunResult>) -> bool {
        if let Some(result) = result {
            self.results.lock().push(result);
        }
        let settled = self.runs_settled.fetch_add(1, Ordering::SeqCst) + 1;
        settled >= self.runs_dispatched.load(Ordering::SeqCst)
    }

    pub fn take_results(&self) -> Vec<RunResult> {
        std::mem::take(&mut self.results.lock())
    }

    pub fn finish(&self, outcome: CoreResult<AggregateResult>) {
        let mut slot = self.outcome.lock();
        *slot = Some(outcome.map(Arc::new).map_err(Arc::new));
        self.done.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.lock().is_some()
    }

    fn wait_for_outcome(&self, timeout: Option<Duration>) -> Option<Result<Arc<AggregateResult>, Arc<CoreError>>> {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            match timeout {
                Some(timeout) => {
                    self.done.wait_for(&mut slot, timeout);
                }
                None => self.done.wait(&mut slot),
            }
        }
        slot.clone()
    }
}

/// A caller's attachment to a job. Dropping (or explicitly cancelling)
/// the last handle to a job cancels it.
pub struct JobHandle {
    pub(crate) state: Arc<JobState>,
}

impl JobHandle {
    pub fn fingerprint(&self) -> Fingerprint {
        self.state.fingerprint
    }

    /// Block up to `timeout` (or forever, if `None`) for the job's
    /// result. Returns `Cancelled` if the job was cancelled first, or
    /// the `Err` the cascade engine produced.
    pub fn await_result(&self, timeout: Option<Duration>) -> Result<Arc<AggregateResult>, Arc<CoreError>> {
        match self.state.wait_for_outcome(timeout) {
            Some(outcome) => outcome,
            None => Err(Arc::new(CoreError::Cancelled)),
        }
    }

    /// Detach this handle. The job is cancelled once every handle
    /// attached to it has detached (spec §4.E).
    pub fn cancel(&self) {
        if self.state.attached.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.cancel.store(true, Ordering::SeqCst);
            self.state.done.notify_all();
        }
    }
}

impl Clone for JobHandle {
    fn clone(&self) -> Self {
        self.state.attached.fetch_add(1, Ordering::SeqCst);
        Self {
            state: self.state.clone(),
        }
    }
}
