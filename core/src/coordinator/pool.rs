//! The fixed worker-thread pool that executes Monte-Carlo runs. See
//! spec §4.C.6, §4.E, §5.

use crate::cascade::{aggregate, run_single, RunResult, MIN_COMPLETION_RATIO};
use crate::coordinator::job::JobState;
use crate::error::CoreError;
use crate::event::FanoutEvent;
use crate::fanout::EventBus;
use crate::rng::CascadeRng;
use crossbeam_channel::Receiver;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One unit of dispatchable work: a single Monte-Carlo run belonging to
/// `job`. Run-granularity, not job-granularity, dispatch is what lets
/// the pool interleave runs from different jobs fairly (spec §4.E
/// "worker pool").
pub struct RunTask {
    pub job: Arc<JobState>,
    pub run_index: u32,
    pub bus: Arc<EventBus>,
    /// The coordinator's outstanding-work counter, decremented once
    /// this run settles so a later `submit` sees the freed capacity.
    pub queue_len: Arc<AtomicUsize>,
}

/// Spawn `worker_count` threads draining `receiver`. Each run is
/// attempted once, retried once on worker panic with a distinct
/// derived seed, then recorded as unsettled on a second panic (spec
/// §4.C.6's retry-once-then-partial rule).
pub fn spawn_workers(receiver: Receiver<RunTask>, worker_count: usize) -> Vec<JoinHandle<()>> {
    (0..worker_count)
        .map(|_| {
            let receiver = receiver.clone();
            std::thread::spawn(move || {
                for task in receiver {
                    execute(task);
                }
            })
        })
        .collect()
}

fn execute(task: RunTask) {
    let RunTask {
        job,
        run_index,
        bus,
        queue_len,
    } = task;

    if job.cancel.load(Ordering::SeqCst) {
        settle(&job, None, &bus, &queue_len);
        return;
    }

    let mut rng = CascadeRng::for_run(job.master_seed, run_index);
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        run_single(&job.snapshot, &job.criticality, &job.request, &mut rng, &job.cancel)
    }));

    let result = match attempt {
        Ok(result) => result,
        Err(panic) => {
            log::warn!(
                "cascade run {run_index} panicked, retrying once: {}",
                describe_panic(&panic)
            );
            let mut retry_rng = CascadeRng::for_retry(job.master_seed, run_index);
            match catch_unwind(AssertUnwindSafe(|| {
                run_single(&job.snapshot, &job.criticality, &job.request, &mut retry_rng, &job.cancel)
            })) {
                Ok(result) => result,
                Err(panic) => {
                    log::error!(
                        "cascade run {run_index} panicked again on retry, reporting partial: {}",
                        describe_panic(&panic)
                    );
                    None
                }
            }
        }
    };

    settle(&job, result, &bus, &queue_len);
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn settle(job: &Arc<JobState>, result: Option<RunResult>, bus: &EventBus, queue_len: &AtomicUsize) {
    queue_len.fetch_sub(1, Ordering::SeqCst);
    if job.record_run(result) {
        finalize(job, bus);
    }
}

fn finalize(job: &Arc<JobState>, bus: &EventBus) {
    let runs = job.take_results();
    let computation_time = job.elapsed_seconds();
    let completed_runs = runs.len() as u32;

    let requested = job.request.monte_carlo_runs;
    let completion_ratio = completed_runs as f64 / requested.max(1) as f64;

    if completed_runs == 0 || completion_ratio < MIN_COMPLETION_RATIO {
        let err = if job.cancel.load(Ordering::SeqCst) {
            CoreError::Cancelled
        } else {
            CoreError::Partial {
                completed: completed_runs,
                requested,
            }
        };
        let reason = err.to_string();
        job.finish(Err(err));
        bus.publish(FanoutEvent::SimulationFailed {
            scenario_name: job.request.scenario_name.clone(),
            fingerprint: job.fingerprint.to_string(),
            reason,
        });
        return;
    }

    let result = aggregate(&job.snapshot, &job.criticality, &job.request, runs, computation_time);
    job.finish(Ok(result));
    bus.publish(FanoutEvent::SimulationCompleted {
        scenario_name: job.request.scenario_name.clone(),
        fingerprint: job.fingerprint.to_string(),
        computation_time_seconds: computation_time,
        completed_runs,
    });
}
