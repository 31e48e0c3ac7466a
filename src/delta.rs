//! Applying workspace change notifications to a fragment.
//!
//! A change notification arrives as a tree of [`DeltaNode`]s (folders with
//! children, files as leaves). [`IndexDelta::classify`] flattens it into
//! the translation units that were added, changed or removed, and
//! [`DeltaProcessor`] brings the fragment up to date unit by unit.

use crate::discovery::UnitFilter;
use crate::error::Result;
use crate::fragment::{IndexFragment, TagFragment};
use crate::tags::{RunStats, TagRunner};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Added,
    Changed,
    Removed,
}

/// One node of a change notification tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaNode {
    pub kind: DeltaKind,
    /// Set when a file's contents changed, as opposed to e.g. its metadata
    pub content_changed: bool,
    pub path: PathBuf,
    pub children: Vec<DeltaNode>,
}

impl DeltaNode {
    pub fn new(kind: DeltaKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            content_changed: kind == DeltaKind::Changed,
            path: path.into(),
            children: Vec::new(),
        }
    }

    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self::new(DeltaKind::Added, path)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(DeltaKind::Changed, path)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(DeltaKind::Removed, path)
    }

    pub fn with_content_changed(mut self, content_changed: bool) -> Self {
        self.content_changed = content_changed;
        self
    }

    pub fn with_children(mut self, children: Vec<DeltaNode>) -> Self {
        self.children = children;
        self
    }
}

/// Translation units touched by a change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDelta {
    pub changed: Vec<PathBuf>,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl IndexDelta {
    /// Walk the tree and sort units by what happened to them. Changes that
    /// did not touch a unit's contents are ignored. A unit reported twice
    /// is kept once, at its first position.
    pub fn classify(root: &DeltaNode, filter: &UnitFilter) -> Self {
        let mut delta = Self::default();
        let mut seen = HashSet::new();
        delta.visit(root, filter, &mut seen);
        delta
    }

    fn visit(&mut self, node: &DeltaNode, filter: &UnitFilter, seen: &mut HashSet<PathBuf>) {
        if filter.is_unit(&node.path) && !seen.contains(&node.path) {
            let target = match node.kind {
                DeltaKind::Added => Some(&mut self.added),
                DeltaKind::Changed if node.content_changed => Some(&mut self.changed),
                DeltaKind::Changed => None,
                DeltaKind::Removed => Some(&mut self.removed),
            };
            if let Some(target) = target {
                target.push(node.path.clone());
                seen.insert(node.path.clone());
            }
        }
        for child in &node.children {
            self.visit(child, filter, seen);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len() + self.added.len() + self.removed.len()
    }
}

/// Per-unit operations a delta needs.
pub trait UnitIndexer {
    /// Whether the fragment holds data for the unit.
    fn contains(&self, path: &Path) -> bool;

    /// Drop stored data for the unit.
    fn clear(&self, path: &Path) -> Result<()>;

    /// Re-derive data for the unit.
    fn extract(&self, path: &Path) -> Result<RunStats>;
}

/// [`UnitIndexer`] backed by a tag fragment and the tag tool.
pub struct TagUnitIndexer<'a> {
    fragment: &'a TagFragment,
    runner: &'a TagRunner,
}

impl<'a> TagUnitIndexer<'a> {
    pub fn new(fragment: &'a TagFragment, runner: &'a TagRunner) -> Self {
        Self { fragment, runner }
    }
}

impl UnitIndexer for TagUnitIndexer<'_> {
    fn contains(&self, path: &Path) -> bool {
        self.fragment.contains_path(path)
    }

    fn clear(&self, path: &Path) -> Result<()> {
        let removed = self.fragment.write()?.clear_path(path);
        tracing::debug!(
            "Cleared {} names for {} in {}",
            removed,
            path.display(),
            self.fragment.id()
        );
        Ok(())
    }

    fn extract(&self, path: &Path) -> Result<RunStats> {
        self.runner.run(self.fragment, path)
    }
}

/// Outcome of applying a delta.
#[derive(Debug, Clone, Default)]
pub struct DeltaReport {
    /// Units brought up to date
    pub applied: usize,
    /// Units that failed, with the error text
    pub failed: Vec<(PathBuf, String)>,
    pub stats: RunStats,
}

/// Applies classified deltas: changed units first, then added, then
/// removed. A failing unit is logged and skipped.
pub struct DeltaProcessor<'a, U: UnitIndexer> {
    indexer: &'a U,
}

impl<'a, U: UnitIndexer> DeltaProcessor<'a, U> {
    pub fn new(indexer: &'a U) -> Self {
        Self { indexer }
    }

    /// Classify a notification tree and apply it.
    pub fn process(&self, root: &DeltaNode, filter: &UnitFilter) -> DeltaReport {
        self.apply(&IndexDelta::classify(root, filter))
    }

    pub fn apply(&self, delta: &IndexDelta) -> DeltaReport {
        let mut report = DeltaReport::default();
        for path in delta.changed.iter().chain(&delta.added) {
            let result = self.reindex_unit(path);
            report.record(path, result);
        }
        for path in &delta.removed {
            let result = self.indexer.clear(path).map(|()| RunStats::default());
            report.record(path, result);
        }
        if !delta.is_empty() {
            tracing::info!(
                "Applied delta: {} changed, {} added, {} removed, {} failed",
                delta.changed.len(),
                delta.added.len(),
                delta.removed.len(),
                report.failed.len()
            );
        }
        report
    }

    fn reindex_unit(&self, path: &Path) -> Result<RunStats> {
        if self.indexer.contains(path) {
            self.indexer.clear(path)?;
        }
        self.indexer.extract(path)
    }
}

impl DeltaReport {
    fn record(&mut self, path: &Path, result: Result<RunStats>) {
        match result {
            Ok(stats) => {
                self.applied += 1;
                self.stats.absorb(stats);
            }
            Err(err) => {
                tracing::warn!("Failed to update index for {}: {}", path.display(), err);
                self.failed.push((path.to_path_buf(), err.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filter() -> UnitFilter {
        UnitFilter::new().expect("filter")
    }

    #[test]
    fn classifies_nested_tree() {
        let tree = DeltaNode::changed("/p").with_content_changed(false).with_children(vec![
            DeltaNode::changed("/p/src")
                .with_content_changed(false)
                .with_children(vec![
                    DeltaNode::changed("/p/src/a.c"),
                    DeltaNode::added("/p/src/b.h"),
                    DeltaNode::changed("/p/src/meta.c").with_content_changed(false),
                ]),
            DeltaNode::removed("/p/old.cpp"),
            DeltaNode::added("/p/README.md"),
        ]);

        let delta = IndexDelta::classify(&tree, &filter());
        assert_eq!(
            delta,
            IndexDelta {
                changed: vec![PathBuf::from("/p/src/a.c")],
                added: vec![PathBuf::from("/p/src/b.h")],
                removed: vec![PathBuf::from("/p/old.cpp")],
            }
        );
        assert_eq!(delta.len(), 3);
    }

    #[test]
    fn duplicate_units_are_kept_once() {
        let tree = DeltaNode::changed("/p")
            .with_content_changed(false)
            .with_children(vec![DeltaNode::changed("/p/a.c"), DeltaNode::changed("/p/a.c")]);
        assert_eq!(IndexDelta::classify(&tree, &filter()).changed.len(), 1);
    }
}
