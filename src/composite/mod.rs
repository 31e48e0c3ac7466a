//! Composite view layer: one logical, de-duplicated index over any number
//! of fragments.
//!
//! The layer is synchronous and holds no state of its own beyond the
//! attached fragments. [`read_fragments`] read-locks every fragment and
//! hands out a [`CompositesFactory`]; composite objects borrow the factory
//! and so cannot outlive those locks.
//!
//! ```ignore
//! let index = CompositeIndex::new();
//! index.attach(project_fragment);
//! index.attach(library_snapshot);
//!
//! let names = index.query(|factory| {
//!     factory
//!         .find_bindings("open")
//!         .map(|found| found.iter().map(|b| b.qualified_name().join("::")).collect::<Vec<_>>())
//! })?;
//! ```

pub mod binding;
pub mod comparator;
pub mod factory;
pub mod scope;
pub mod types;
pub mod uncertain;

pub use binding::CompositeBinding;
pub use comparator::{
    BindingComparator, ComparatorChain, compare_snapshot_bindings, compare_tag_bindings,
};
pub use factory::{CompositesFactory, IndexView};
pub use scope::{CompositeScope, ScopeKind};
pub use types::{CompositeType, CompositeTypeKind};
pub use uncertain::{
    ClassifiedBinding, ProblemBinding, SpecializationBinding, SyntheticBinding, UncertainBinding,
};

use crate::fragment::IndexFragment;
use crate::types::FragmentId;
use parking_lot::RwLock;
use std::sync::Arc;

/// The set of fragments queried together.
pub struct CompositeIndex {
    fragments: RwLock<Vec<Arc<dyn IndexFragment>>>,
    comparators: ComparatorChain,
}

impl CompositeIndex {
    pub fn new() -> Self {
        Self::with_comparators(ComparatorChain::default())
    }

    pub fn with_comparators(comparators: ComparatorChain) -> Self {
        Self {
            fragments: RwLock::new(Vec::new()),
            comparators,
        }
    }

    /// Add a fragment, replacing one with the same id.
    pub fn attach(&self, fragment: Arc<dyn IndexFragment>) {
        let mut fragments = self.fragments.write();
        let id = fragment.id();
        fragments.retain(|f| f.id() != id);
        fragments.push(fragment);
        tracing::debug!("Attached {} ({} fragments)", id, fragments.len());
    }

    /// Remove a fragment, e.g. when its project is closed or deleted.
    pub fn detach(&self, id: FragmentId) -> Option<Arc<dyn IndexFragment>> {
        let mut fragments = self.fragments.write();
        let position = fragments.iter().position(|f| f.id() == id)?;
        tracing::debug!("Detached {}", id);
        Some(fragments.remove(position))
    }

    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        self.fragments.read().iter().map(|f| f.id()).collect()
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.read().len()
    }

    /// The fragments attached right now. Pass the result to
    /// [`read_fragments`] to query them.
    pub fn fragments(&self) -> Vec<Arc<dyn IndexFragment>> {
        self.fragments.read().clone()
    }

    pub fn comparators(&self) -> &ComparatorChain {
        &self.comparators
    }

    /// Run `f` against a factory over the fragments attached right now,
    /// holding every fragment's read lock for the duration of the call.
    pub fn query<T>(&self, f: impl FnOnce(&CompositesFactory<'_>) -> T) -> T {
        let fragments = self.fragments();
        let factory = read_fragments(&fragments, &self.comparators);
        f(&factory)
    }
}

impl Default for CompositeIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-lock every fragment, in order, and build a factory over them.
///
/// Composite objects derived from the factory are valid only while it is
/// alive; writers on any of the fragments block until it is dropped.
pub fn read_fragments<'a>(
    fragments: &'a [Arc<dyn IndexFragment>],
    comparators: &ComparatorChain,
) -> CompositesFactory<'a> {
    let views = fragments.iter().map(|f| f.read()).collect();
    CompositesFactory::new(IndexView::new(views), comparators.clone())
}
