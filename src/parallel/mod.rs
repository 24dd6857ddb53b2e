//! Serial and pooled execution of compression jobs
//!
//! Both strategies implement [`Scheduler`] and share the same contract: every
//! dispatched job yields exactly one [`JobOutcome`], failures are recorded in
//! the [`ErrorLog`] alongside (not instead of) the completion signal, and
//! progress is counted once per job.

use crossbeam::channel::{self, Receiver, Sender};
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::error::{BatchError, Result};
use crate::processing::{ImageJob, JobOutcome, JobRunner};

pub mod error_log;
pub mod progress;
pub mod scheduler;

pub use error_log::*;
pub use progress::*;
pub use scheduler::*;

/// Collaborators a scheduler hands each job to
///
/// Passed explicitly into every worker; workers share nothing else.
pub struct Dispatch<'a> {
    pub runner: &'a dyn JobRunner,
    pub errors: &'a ErrorLog,
    pub progress: &'a ProgressReporter,
}

impl<'a> Dispatch<'a> {
    pub fn new(runner: &'a dyn JobRunner, errors: &'a ErrorLog, progress: &'a ProgressReporter) -> Self {
        Self {
            runner,
            errors,
            progress,
        }
    }

    /// Run one job and log it if it failed
    fn execute(&self, job: &ImageJob) -> JobOutcome {
        let outcome = self.runner.run(job);
        self.errors.record(&outcome);
        outcome
    }
}

/// Execution strategy for a list of jobs
pub trait Scheduler {
    fn mode(&self) -> ExecutionMode;

    /// Run every job, returning one outcome per job
    ///
    /// Per-job failures come back as `JobOutcome::Failure`; an `Err` means the
    /// strategy itself could not run.
    fn run(&self, jobs: Vec<ImageJob>, dispatch: &Dispatch<'_>) -> Result<Vec<JobOutcome>>;
}

/// Pick the scheduler for a sized execution mode
pub fn scheduler_for(mode: ExecutionMode) -> Box<dyn Scheduler> {
    match mode {
        ExecutionMode::Serial => Box::new(SerialScheduler),
        ExecutionMode::Parallel { workers } => Box::new(ParallelScheduler::new(workers)),
    }
}

/// Processes jobs one at a time in discovery order
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialScheduler;

impl Scheduler for SerialScheduler {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Serial
    }

    fn run(&self, jobs: Vec<ImageJob>, dispatch: &Dispatch<'_>) -> Result<Vec<JobOutcome>> {
        debug!("Entering {} phase (serial, {} jobs)", RunPhase::Dispatching, jobs.len());

        let outcomes = jobs
            .iter()
            .map(|job| {
                let outcome = dispatch.execute(job);
                dispatch.progress.record(&outcome);
                outcome
            })
            .collect();

        debug!("Entering {} phase", RunPhase::Done);
        Ok(outcomes)
    }
}

/// Fixed-size worker pool fed from a shared job queue
#[derive(Debug, Clone, Copy)]
pub struct ParallelScheduler {
    workers: usize,
}

impl ParallelScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Scheduler for ParallelScheduler {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel {
            workers: self.workers,
        }
    }

    fn run(&self, jobs: Vec<ImageJob>, dispatch: &Dispatch<'_>) -> Result<Vec<JobOutcome>> {
        let dispatched = jobs.len();
        if dispatched == 0 {
            return Ok(Vec::new());
        }

        // no point in spawning workers that would find the queue empty
        let workers = self.workers.min(dispatched);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("batchpress-worker-{index}"))
            .build()
            .map_err(|e| BatchError::scheduling(format!("failed to start {} workers: {}", workers, e)))?;

        info!("Dispatching {} jobs to {} workers", dispatched, workers);
        debug!("Entering {} phase", RunPhase::Dispatching);

        let (job_tx, job_rx) = channel::unbounded::<ImageJob>();
        for job in jobs {
            job_tx
                .send(job)
                .map_err(|_| BatchError::scheduling("job queue closed before dispatch finished"))?;
        }
        drop(job_tx);

        let (done_tx, done_rx) = channel::bounded::<JobOutcome>(1);

        let outcomes = pool.in_place_scope(move |scope| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move |_| worker_loop(worker, job_rx, done_tx, dispatch));
            }
            // only workers hold senders now, so a closed channel means they are all gone
            drop(done_tx);

            drain(done_rx, dispatched, dispatch.progress)
        })?;

        debug!("Entering {} phase", RunPhase::Done);
        Ok(outcomes)
    }
}

/// Pull jobs until the queue is empty, signalling each completion
fn worker_loop(worker: usize, jobs: Receiver<ImageJob>, done: Sender<JobOutcome>, dispatch: &Dispatch<'_>) {
    for job in jobs.iter() {
        let outcome = dispatch.execute(&job);
        if done.send(outcome).is_err() {
            warn!("Worker {} lost the completion channel, stopping", worker);
            return;
        }
    }
    debug!("Worker {} found the queue empty", worker);
}

/// Block until one outcome per dispatched job has arrived
fn drain(done: Receiver<JobOutcome>, dispatched: usize, progress: &ProgressReporter) -> Result<Vec<JobOutcome>> {
    debug!("Entering {} phase, expecting {} outcomes", RunPhase::Draining, dispatched);

    let mut outcomes = Vec::with_capacity(dispatched);
    while outcomes.len() < dispatched {
        match done.recv() {
            Ok(outcome) => {
                progress.record(&outcome);
                outcomes.push(outcome);
            }
            Err(_) => {
                return Err(BatchError::scheduling(format!(
                    "workers exited after {} of {} outcomes",
                    outcomes.len(),
                    dispatched
                )));
            }
        }
    }

    Ok(outcomes)
}
