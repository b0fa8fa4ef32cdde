use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::bail;
use crate::concurrency_error;
use crate::config::JobProcessorConfig;
use crate::error::{ConcurrencyResult, ErrorKind};
use crate::job::dag::{Job, JobDag, JobId};
use crate::signal::{Done, Signal, Waitable};

/// Runs submitted jobs concurrently while keeping conflicting jobs apart.
///
/// Every job carries metadata and a `conflicts_with` predicate. When a job is submitted the
/// predicate is evaluated against the metadata of every job still pending or running, and the
/// new job waits for each one it conflicts with. Conflicting pairs therefore run one after
/// the other in submission order, while everything else runs in parallel up to the worker
/// bound.
///
/// All bookkeeping lives in a single sequencer task spawned on the tokio runtime. Job bodies
/// run on their own tasks and never touch the graph.
///
/// Dropping the processor has the same effect as [`JobProcessor::graceful_stop`].
pub struct JobProcessor<M> {
    /// Submission side of the sequencer's queue. `None` once shutdown began.
    jobs: Mutex<Option<mpsc::UnboundedSender<Job<M>>>>,
    stop: Signal,
    stopped: Arc<Signal>,
    num_workers: usize,
}

impl<M> JobProcessor<M>
where
    M: fmt::Debug + Send + 'static,
{
    /// Creates a processor and spawns its sequencer on the current tokio runtime.
    ///
    /// Fails with [`ErrorKind::NoRuntime`] when called outside a runtime context.
    pub fn new(config: JobProcessorConfig) -> ConcurrencyResult<Self> {
        let handle = Handle::try_current().map_err(|err| {
            concurrency_error!(
                ErrorKind::NoRuntime,
                "Job processor requires a tokio runtime",
                source: err
            )
        })?;

        let num_workers = config.resolved_num_workers();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let stop = Signal::new();
        let stopped = Arc::new(Signal::new());

        let sequencer = Sequencer {
            dag: JobDag::new(),
            jobs: jobs_rx,
            workers: JoinSet::new(),
            num_workers,
        };
        handle.spawn(sequencer.run(stop.done(), stopped.clone()));

        info!(num_workers, "job processor started");

        Ok(Self {
            jobs: Mutex::new(Some(jobs_tx)),
            stop,
            stopped,
            num_workers,
        })
    }

    /// Creates a processor running at most `num_workers` jobs at once.
    ///
    /// Zero selects the available parallelism.
    pub fn with_workers(num_workers: usize) -> ConcurrencyResult<Self> {
        Self::new(JobProcessorConfig { num_workers })
    }

    /// Submits a job.
    ///
    /// `conflicts_with` is called once per job currently pending or running, with that job's
    /// metadata, and must return `true` if the new job may not overlap with it. `execute` is
    /// called on a worker task once every such job has finished.
    ///
    /// Never suspends. Fails with [`ErrorKind::AlreadyStopped`] once either kind of shutdown
    /// has begun. A job admitted here is guaranteed to run unless [`JobProcessor::stop`] is
    /// called before it finishes.
    pub fn add_job<C, F, Fut>(
        &self,
        metadata: M,
        conflicts_with: C,
        execute: F,
    ) -> ConcurrencyResult<()>
    where
        C: Fn(&M) -> bool + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let jobs = self.jobs.lock();
        let Some(sender) = jobs.as_ref() else {
            bail!(ErrorKind::AlreadyStopped, "Job processor is stopped");
        };

        let job = Job {
            metadata,
            conflicts_with: Box::new(conflicts_with),
            execute: Box::new(move || execute().boxed()),
        };

        if sender.send(job).is_err() {
            bail!(
                ErrorKind::AlreadyStopped,
                "Job processor sequencer has exited"
            );
        }

        Ok(())
    }

    /// Stops immediately without waiting.
    ///
    /// No further jobs are accepted, pending jobs are discarded and running jobs are aborted
    /// at their next suspension point.
    pub fn stop(&self) {
        let accepting = self.jobs.lock().take().is_some();
        if self.stop.signal() {
            info!(accepting, "job processor stop requested");
        }
    }

    /// Stops accepting jobs and lets every admitted job run to completion.
    ///
    /// Returns without waiting. Use [`JobProcessor::wait_stopped`] to wait for the drain.
    pub fn graceful_stop(&self) {
        if self.jobs.lock().take().is_some() {
            info!("job processor graceful stop requested");
        }
    }

    /// Returns `true` once the sequencer has exited.
    pub fn stopped(&self) -> bool {
        self.stopped.is_done()
    }

    /// Returns a handle that completes once the sequencer has exited.
    pub fn stopped_signal(&self) -> Done {
        self.stopped.done()
    }

    /// Waits until the sequencer has exited.
    pub async fn wait_stopped(&self) {
        self.stopped.wait().await;
    }

    /// Returns the maximum number of jobs run at once.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
}

impl<M> fmt::Debug for JobProcessor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobProcessor")
            .field("num_workers", &self.num_workers)
            .field("accepting", &self.jobs.lock().is_some())
            .field("stopped", &self.stopped.is_done())
            .finish()
    }
}

/// Signals `stopped` when the sequencer exits, including by unwinding.
struct StoppedGuard(Arc<Signal>);

impl Drop for StoppedGuard {
    fn drop(&mut self) {
        self.0.signal();
    }
}

/// Owns the job graph and drives dispatch.
struct Sequencer<M> {
    dag: JobDag<M>,
    jobs: mpsc::UnboundedReceiver<Job<M>>,
    /// Each worker yields its job id and whether the body panicked.
    workers: JoinSet<(JobId, bool)>,
    num_workers: usize,
}

impl<M> Sequencer<M>
where
    M: fmt::Debug + Send + 'static,
{
    async fn run(mut self, stop: Done, stopped: Arc<Signal>) {
        let _stopped = StoppedGuard(stopped);
        let mut accepting = true;

        loop {
            self.dispatch();

            // Nodes stay in the graph while they run, so an empty graph means nothing is left.
            if !accepting && self.dag.is_empty() {
                info!("job processor drained all admitted jobs");
                break;
            }

            tokio::select! {
                biased;

                _ = stop.wait() => {
                    let pending = self.dag.len();
                    self.workers.abort_all();
                    info!(pending, "job processor stopped, abandoning remaining jobs");
                    break;
                }

                Some(joined) = self.workers.join_next() => {
                    self.on_worker_finished(joined);
                }

                job = self.jobs.recv(), if accepting => {
                    match job {
                        Some(job) => self.admit(job),
                        None => {
                            accepting = false;
                            debug!(pending = self.dag.len(), "job queue closed, draining");
                        }
                    }
                }
            }
        }
    }

    fn admit(&mut self, job: Job<M>) {
        let (job_id, blocked_by) = self.dag.insert(job);
        debug!(job_id, blocked_by, pending = self.dag.len(), "job admitted");
    }

    /// Starts eligible jobs until the worker bound is reached.
    fn dispatch(&mut self) {
        while self.dag.has_eligible() && self.workers.len() < self.num_workers {
            let Some((job_id, execute)) = self.dag.take_eligible() else {
                return;
            };

            debug!(job_id, running = self.workers.len() + 1, "dispatching job");

            self.workers.spawn(async move {
                let panicked = AssertUnwindSafe(async move { execute().await })
                    .catch_unwind()
                    .await
                    .is_err();

                (job_id, panicked)
            });
        }
    }

    fn on_worker_finished(&mut self, joined: Result<(JobId, bool), JoinError>) {
        match joined {
            Ok((job_id, panicked)) => {
                if panicked {
                    error!(
                        job_id,
                        metadata = ?self.dag.metadata(job_id),
                        "job panicked, treating it as completed"
                    );
                }

                let unblocked = self.dag.complete(job_id);
                debug!(job_id, unblocked, pending = self.dag.len(), "job completed");
            }
            Err(err) => {
                // Panics are caught inside the worker and aborts only happen on stop.
                error!(error = %err, "job worker task failed unexpectedly");
            }
        }
    }
}
