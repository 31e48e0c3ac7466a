//! Background indexing service.
//!
//! Each registered fragment gets one worker task that receives jobs over a
//! channel and runs them, one at a time, on the blocking thread pool. Jobs
//! for the same fragment therefore never interleave, while different
//! fragments index in parallel.

use crate::delta::{DeltaNode, DeltaProcessor, DeltaReport, TagUnitIndexer};
use crate::discovery::UnitFilter;
use crate::error::{IndexError, Result};
use crate::fragment::{IndexFragment, TagFragment};
use crate::reindex::{CancelFlag, FullReindexJob, ReindexOutcome};
use crate::tags::TagRunner;
use crate::types::FragmentId;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Job {
    Delta {
        root: DeltaNode,
        reply: oneshot::Sender<Result<DeltaReport>>,
    },
    Reindex {
        roots: Vec<PathBuf>,
        cancel: CancelFlag,
        reply: oneshot::Sender<Result<ReindexOutcome>>,
    },
}

struct Worker {
    fragment: Arc<TagFragment>,
    jobs: mpsc::UnboundedSender<Job>,
    task: JoinHandle<()>,
}

/// Pending result of a submitted job.
pub struct JobHandle<T> {
    fragment: FragmentId,
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> JobHandle<T> {
    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| IndexError::WorkerStopped(self.fragment))?
    }
}

/// A submitted full reindex.
pub struct ReindexHandle {
    pub cancel: CancelFlag,
    pub job: JobHandle<ReindexOutcome>,
}

/// Schedules delta and reindex jobs per fragment.
pub struct IncrementalIndexer {
    workers: DashMap<FragmentId, Worker>,
    /// Tasks of unregistered workers that may still be draining their queue
    retired: DashMap<FragmentId, JoinHandle<()>>,
    filter: Arc<UnitFilter>,
}

impl IncrementalIndexer {
    pub fn new(filter: UnitFilter) -> Self {
        Self {
            workers: DashMap::new(),
            retired: DashMap::new(),
            filter: Arc::new(filter),
        }
    }

    /// Start a worker for the fragment. Must be called inside a tokio
    /// runtime. Registering an id again, or after `unregister`, starts the
    /// new worker only once the previous one has finished its queued jobs,
    /// so jobs for one fragment never overlap.
    pub fn register(&self, fragment: Arc<TagFragment>, runner: TagRunner) {
        let id = fragment.id();
        let retired = self.retired.remove(&id).map(|(_, task)| task);
        // A replaced worker already waits for any retired one; its queue
        // closes when its sender drops here.
        let previous = match self.workers.remove(&id) {
            Some((_, worker)) => Some(worker.task),
            None => retired,
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_worker(
            fragment.clone(),
            runner,
            self.filter.clone(),
            previous,
            receiver,
        ));
        tracing::debug!("Registered indexer worker for {}", id);
        self.workers.insert(
            id,
            Worker {
                fragment,
                jobs: sender,
                task,
            },
        );
    }

    /// Stop scheduling for a fragment, e.g. when its project closes.
    /// Already queued jobs still run.
    pub fn unregister(&self, id: FragmentId) -> bool {
        match self.workers.remove(&id) {
            Some((_, worker)) => {
                self.retired.insert(id, worker.task);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, id: FragmentId) -> bool {
        self.workers.contains_key(&id)
    }

    pub fn fragment(&self, id: FragmentId) -> Option<Arc<TagFragment>> {
        self.workers.get(&id).map(|w| w.fragment.clone())
    }

    /// Queue a change notification for the fragment.
    pub fn submit_delta(&self, id: FragmentId, root: DeltaNode) -> Result<JobHandle<DeltaReport>> {
        let (reply, receiver) = oneshot::channel();
        self.send(id, Job::Delta { root, reply })?;
        Ok(JobHandle {
            fragment: id,
            receiver,
        })
    }

    /// Queue a full reindex of the fragment from `roots`.
    pub fn reindex(&self, id: FragmentId, roots: Vec<PathBuf>) -> Result<ReindexHandle> {
        let cancel = CancelFlag::new();
        let (reply, receiver) = oneshot::channel();
        self.send(
            id,
            Job::Reindex {
                roots,
                cancel: cancel.clone(),
                reply,
            },
        )?;
        Ok(ReindexHandle {
            cancel,
            job: JobHandle {
                fragment: id,
                receiver,
            },
        })
    }

    fn send(&self, id: FragmentId, job: Job) -> Result<()> {
        let worker = self
            .workers
            .get(&id)
            .ok_or(IndexError::UnknownFragment(id))?;
        worker
            .jobs
            .send(job)
            .map_err(|_| IndexError::WorkerStopped(id))
    }

    /// Close every worker's queue and wait for queued jobs to finish.
    pub async fn shutdown(&self) {
        let ids: Vec<FragmentId> = self.workers.iter().map(|w| *w.key()).collect();
        for id in ids {
            let Some((_, worker)) = self.workers.remove(&id) else {
                continue;
            };
            drop(worker.jobs);
            if let Err(err) = worker.task.await {
                tracing::warn!("Indexer worker for {} ended abnormally: {}", id, err);
            }
        }

        let ids: Vec<FragmentId> = self.retired.iter().map(|t| *t.key()).collect();
        for id in ids {
            let Some((_, task)) = self.retired.remove(&id) else {
                continue;
            };
            if let Err(err) = task.await {
                tracing::warn!("Indexer worker for {} ended abnormally: {}", id, err);
            }
        }
    }
}

async fn run_worker(
    fragment: Arc<TagFragment>,
    runner: TagRunner,
    filter: Arc<UnitFilter>,
    previous: Option<JoinHandle<()>>,
    mut jobs: mpsc::UnboundedReceiver<Job>,
) {
    let id = fragment.id();
    if let Some(previous) = previous {
        if let Err(err) = previous.await {
            tracing::warn!("Previous indexer worker for {} ended abnormally: {}", id, err);
        }
    }
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Delta { root, reply } => {
                let fragment = fragment.clone();
                let runner = runner.clone();
                let filter = filter.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let indexer = TagUnitIndexer::new(&fragment, &runner);
                    DeltaProcessor::new(&indexer).process(&root, &filter)
                })
                .await
                .map_err(|err| IndexError::Storage(format!("delta job for {} failed: {}", id, err)));
                // The submitter may have stopped waiting.
                let _ = reply.send(result);
            }
            Job::Reindex {
                roots,
                cancel,
                reply,
            } => {
                let job = FullReindexJob::new(fragment.clone(), runner.clone(), roots)
                    .with_cancel_flag(cancel);
                let result = tokio::task::spawn_blocking(move || job.run(&mut ()))
                    .await
                    .map_err(|err| {
                        IndexError::Storage(format!("reindex job for {} failed: {}", id, err))
                    })
                    .and_then(|outcome| outcome);
                let _ = reply.send(result);
            }
        }
    }
    tracing::debug!("Indexer worker for {} stopped", id);
}
