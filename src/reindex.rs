//! Full reindex of a fragment from its source roots.
//!
//! The job clears the fragment and runs the tag tool over every root in
//! order. Cancellation is cooperative: it is checked before clearing and
//! before each root, never while the tool is running. A cancelled job
//! leaves the fragment holding exactly the roots finished so far.

use crate::error::Result;
use crate::fragment::{IndexFragment, TagFragment};
use crate::tags::{RunStats, TagRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag for a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callbacks; all methods default to no-ops.
pub trait ReindexProgress {
    fn root_started(&mut self, _root: &Path, _index: usize, _total: usize) {}

    fn root_finished(&mut self, _root: &Path, _result: &Result<RunStats>) {}
}

impl ReindexProgress for () {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexOutcome {
    Completed {
        roots: usize,
        /// Roots whose extraction failed
        failed: usize,
        stats: RunStats,
    },
    Cancelled {
        /// Roots processed before cancellation was noticed
        roots_done: usize,
    },
}

impl ReindexOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A scheduled full reindex.
pub struct FullReindexJob {
    fragment: Arc<TagFragment>,
    runner: TagRunner,
    roots: Vec<PathBuf>,
    cancel: CancelFlag,
}

impl FullReindexJob {
    pub fn new(fragment: Arc<TagFragment>, runner: TagRunner, roots: Vec<PathBuf>) -> Self {
        Self {
            fragment,
            runner,
            roots,
            cancel: CancelFlag::new(),
        }
    }

    /// Use an existing flag, e.g. one already handed to the caller.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn run(&self, progress: &mut dyn ReindexProgress) -> Result<ReindexOutcome> {
        let id = self.fragment.id();
        if self.cancel.is_cancelled() {
            tracing::info!("Reindex of {} cancelled before start", id);
            return Ok(ReindexOutcome::Cancelled { roots_done: 0 });
        }

        tracing::info!("Reindexing {} from {} roots", id, self.roots.len());
        self.fragment.write()?.clear_all();

        let mut stats = RunStats::default();
        let mut failed = 0;
        for (index, root) in self.roots.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("Reindex of {} cancelled after {} roots", id, index);
                return Ok(ReindexOutcome::Cancelled { roots_done: index });
            }

            progress.root_started(root, index, self.roots.len());
            let result = self.runner.run(&self.fragment, root);
            match &result {
                Ok(root_stats) => stats.absorb(*root_stats),
                Err(err) => {
                    tracing::warn!("Indexing root {} failed: {}", root.display(), err);
                    failed += 1;
                }
            }
            progress.root_finished(root, &result);
        }

        tracing::info!(
            "Reindex of {} done: {} bindings, {} failed roots",
            id,
            self.fragment.binding_count(),
            failed
        );
        Ok(ReindexOutcome::Completed {
            roots: self.roots.len(),
            failed,
            stats,
        })
    }
}
