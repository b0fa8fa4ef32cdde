use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use futures::future::BoxFuture;
use tracing::error;

/// Identifier of a job inside a [`JobDag`], assigned in submission order.
pub(crate) type JobId = u64;

/// Body of a job, producing the future that runs it.
pub(crate) type JobExecute = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Predicate deciding whether a new job conflicts with an existing job's metadata.
pub(crate) type ConflictFn<M> = Box<dyn Fn(&M) -> bool + Send>;

/// A job as submitted, before it is placed in the graph.
pub(crate) struct Job<M> {
    pub(crate) metadata: M,
    pub(crate) conflicts_with: ConflictFn<M>,
    pub(crate) execute: JobExecute,
}

impl<M: fmt::Debug> fmt::Debug for Job<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

struct JobNode<M> {
    metadata: M,
    /// Taken when the job is dispatched.
    execute: Option<JobExecute>,
    /// Number of earlier jobs this one is still waiting on.
    blocked_by: usize,
    /// Later jobs waiting on this one.
    blocks: Vec<JobId>,
}

/// Live dependency graph of submitted jobs.
///
/// Edges always point from an earlier job to a later one because conflicts are evaluated
/// only against jobs already present at insertion, so the graph cannot contain a cycle.
/// A node stays in the graph from insertion until [`JobDag::complete`], including while it
/// runs, so later conflicting jobs also wait on running ones.
pub(crate) struct JobDag<M> {
    nodes: BTreeMap<JobId, JobNode<M>>,
    eligible: VecDeque<JobId>,
    next_id: JobId,
}

impl<M> JobDag<M> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            eligible: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Adds `job` to the graph and returns its id along with the number of jobs it waits on.
    ///
    /// A predicate that panics is logged and counted as a conflict with that job.
    pub(crate) fn insert(&mut self, job: Job<M>) -> (JobId, usize)
    where
        M: fmt::Debug,
    {
        let id = self.next_id;
        self.next_id += 1;

        let mut blocked_by = 0;
        for (&other_id, node) in self.nodes.iter_mut() {
            let conflicts =
                panic::catch_unwind(AssertUnwindSafe(|| (job.conflicts_with)(&node.metadata)))
                    .unwrap_or_else(|_| {
                        error!(
                            job_id = id,
                            other_job_id = other_id,
                            metadata = ?job.metadata,
                            "conflict predicate panicked, treating it as a conflict"
                        );
                        true
                    });

            if conflicts {
                node.blocks.push(id);
                blocked_by += 1;
            }
        }

        self.nodes.insert(
            id,
            JobNode {
                metadata: job.metadata,
                execute: Some(job.execute),
                blocked_by,
                blocks: Vec::new(),
            },
        );

        if blocked_by == 0 {
            self.eligible.push_back(id);
        }

        (id, blocked_by)
    }

    /// Takes the next job that waits on nothing, in the order jobs became eligible.
    pub(crate) fn take_eligible(&mut self) -> Option<(JobId, JobExecute)> {
        while let Some(id) = self.eligible.pop_front() {
            let execute = self
                .nodes
                .get_mut(&id)
                .and_then(|node| node.execute.take());

            if let Some(execute) = execute {
                return Some((id, execute));
            }
        }

        None
    }

    /// Removes a finished job and releases the jobs it was blocking.
    ///
    /// Returns how many jobs became eligible as a result.
    pub(crate) fn complete(&mut self, id: JobId) -> usize {
        let Some(node) = self.nodes.remove(&id) else {
            return 0;
        };

        let mut unblocked = 0;
        for blocked in node.blocks {
            let Some(successor) = self.nodes.get_mut(&blocked) else {
                continue;
            };

            successor.blocked_by -= 1;
            if successor.blocked_by == 0 {
                self.eligible.push_back(blocked);
                unblocked += 1;
            }
        }

        unblocked
    }

    pub(crate) fn metadata(&self, id: JobId) -> Option<&M> {
        self.nodes.get(&id).map(|node| &node.metadata)
    }

    pub(crate) fn has_eligible(&self) -> bool {
        !self.eligible.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
