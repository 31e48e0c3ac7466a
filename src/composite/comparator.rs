//! Total order over bindings read from different fragments.
//!
//! Each comparator in a chain understands some pairs of fragment formats
//! and abstains (`None`) on the rest. The first comparator with an opinion
//! decides. Comparators in one chain must agree on every pair they both
//! decide, otherwise the order is not transitive.

use crate::fragment::FragmentBinding;
use crate::types::FragmentFormat;
use std::cmp::Ordering;
use std::fmt;

/// Orders two bindings, or abstains.
pub type BindingComparator = fn(&FragmentBinding, &FragmentBinding) -> Option<Ordering>;

/// Order on the logical identity of a binding. Two bindings compare equal
/// exactly when they are equivalent.
fn compare_logical(a: &FragmentBinding, b: &FragmentBinding) -> Ordering {
    a.linkage
        .cmp(&b.linkage)
        .then_with(|| a.owner.cmp(&b.owner))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.class.cmp(&b.class))
}

/// Decides pairs of bindings that both come from tag fragments.
pub fn compare_tag_bindings(a: &FragmentBinding, b: &FragmentBinding) -> Option<Ordering> {
    if a.format != FragmentFormat::Tags || b.format != FragmentFormat::Tags {
        return None;
    }
    Some(compare_logical(a, b))
}

/// Decides any pair involving a snapshot fragment. Snapshots keep the tag
/// store's attributes, so the same logical key applies.
pub fn compare_snapshot_bindings(a: &FragmentBinding, b: &FragmentBinding) -> Option<Ordering> {
    if a.format != FragmentFormat::Snapshot && b.format != FragmentFormat::Snapshot {
        return None;
    }
    Some(compare_logical(a, b))
}

/// Ordered list of comparators.
#[derive(Clone)]
pub struct ComparatorChain {
    comparators: Vec<BindingComparator>,
}

impl ComparatorChain {
    pub fn new(comparators: Vec<BindingComparator>) -> Self {
        Self { comparators }
    }

    /// Compare two bindings.
    ///
    /// # Panics
    ///
    /// Panics when every comparator abstains. Two bindings that no
    /// comparator can order would otherwise be merged or split at random.
    pub fn compare(&self, a: &FragmentBinding, b: &FragmentBinding) -> Ordering {
        for comparator in &self.comparators {
            if let Some(ordering) = comparator(a, b) {
                return ordering;
            }
        }
        panic!(
            "no comparator orders {:?} binding `{}` ({}) against {:?} binding `{}` ({})",
            a.format, a.name, a.fragment, b.format, b.name, b.fragment
        );
    }

    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }
}

impl Default for ComparatorChain {
    fn default() -> Self {
        Self::new(vec![compare_tag_bindings, compare_snapshot_bindings])
    }
}

impl fmt::Debug for ComparatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparatorChain")
            .field("comparators", &self.comparators.len())
            .finish()
    }
}
