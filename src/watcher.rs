//! Filesystem watching for source roots.
//!
//! Debounced filesystem events are turned into [`DeltaNode`] trees, one per
//! source root touched, ready for the delta processor.

use crate::delta::DeltaNode;
use crate::discovery::UnitFilter;
use crate::error::Result;
use crate::fragment::TagFragment;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// The units a fragment already holds data for.
pub trait KnownUnits {
    fn contains(&self, path: &Path) -> bool;

    /// Stored files at or below `path`.
    fn units_under(&self, path: &Path) -> Vec<PathBuf>;
}

impl KnownUnits for TagFragment {
    fn contains(&self, path: &Path) -> bool {
        self.contains_path(path)
    }

    fn units_under(&self, path: &Path) -> Vec<PathBuf> {
        self.paths_under(path)
    }
}

pub struct WorkspaceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<DebounceEventResult>,
    roots: Vec<PathBuf>,
    filter: UnitFilter,
}

impl WorkspaceWatcher {
    /// Watch every root recursively.
    pub fn new(roots: Vec<PathBuf>, filter: UnitFilter, debounce: Duration) -> Result<Self> {
        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(debounce, tx)?;
        for root in &roots {
            debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
            tracing::info!("Watching {}", root.display());
        }
        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            roots,
            filter,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Wait up to `timeout` for the next batch of events.
    ///
    /// `known` decides between added and changed, and which vanished paths
    /// are worth a removal. Returns `None` when nothing relevant happened
    /// or the watcher is gone.
    pub fn next_deltas(&self, timeout: Duration, known: &dyn KnownUnits) -> Option<Vec<DeltaNode>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(events)) => {
                let paths = events.into_iter().map(|e| e.path);
                let deltas = deltas_for_paths(&self.roots, &self.filter, paths, known);
                (!deltas.is_empty()).then_some(deltas)
            }
            Ok(Err(err)) => {
                tracing::warn!("Watch error: {:?}", err);
                None
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("Watcher channel closed");
                None
            }
        }
    }
}

/// Build one delta tree per root from a batch of touched paths.
///
/// Existing files become added or changed units and a new directory
/// contributes every unit below it. A vanished path removes every known
/// unit at or below it, so a deleted directory clears its units too.
pub fn deltas_for_paths(
    roots: &[PathBuf],
    filter: &UnitFilter,
    paths: impl IntoIterator<Item = PathBuf>,
    known: &dyn KnownUnits,
) -> Vec<DeltaNode> {
    let mut touched = BTreeSet::new();
    for path in paths {
        if path.is_dir() {
            touched.extend(filter.discover(&path));
        } else if path.exists() {
            touched.insert(path);
        } else {
            touched.extend(known.units_under(&path));
            touched.insert(path);
        }
    }

    let mut per_root: Vec<(PathBuf, Vec<DeltaNode>)> =
        roots.iter().map(|r| (r.clone(), Vec::new())).collect();
    for path in touched {
        if !filter.is_unit(&path) {
            continue;
        }
        let node = if path.exists() {
            if known.contains(&path) {
                DeltaNode::changed(path.clone())
            } else {
                DeltaNode::added(path.clone())
            }
        } else if known.contains(&path) {
            DeltaNode::removed(path.clone())
        } else {
            continue;
        };
        if let Some((_, children)) = per_root.iter_mut().find(|(root, _)| path.starts_with(root)) {
            children.push(node);
        }
    }

    per_root
        .into_iter()
        .filter(|(_, children)| !children.is_empty())
        .map(|(root, children)| {
            DeltaNode::changed(root)
                .with_content_changed(false)
                .with_children(children)
        })
        .collect()
}
