//! The merge engine: turns per-fragment bindings, types and scopes into
//! composite objects that keep spanning fragments.

use crate::composite::binding::CompositeBinding;
use crate::composite::comparator::ComparatorChain;
use crate::composite::scope::CompositeScope;
use crate::composite::types::CompositeType;
use crate::error::Result;
use crate::fragment::{FragmentBinding, FragmentRead, FragmentScope, FragmentType, TypeKeyword};
use crate::types::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;

// ============================================================================
// Read-locked view over all fragments
// ============================================================================

/// Read-locked views of every attached fragment, in attach order.
///
/// Holds each fragment's read lock until dropped.
pub struct IndexView<'a> {
    fragments: Vec<Box<dyn FragmentRead + 'a>>,
}

impl<'a> IndexView<'a> {
    pub fn new(fragments: Vec<Box<dyn FragmentRead + 'a>>) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &[Box<dyn FragmentRead + 'a>] {
        &self.fragments
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&(dyn FragmentRead + 'a)> {
        self.fragments
            .iter()
            .find(|f| f.id() == id)
            .map(|f| f.as_ref())
    }

    /// Query every fragment, one result array per fragment.
    pub fn find_bindings(&self, name: &str) -> Result<Vec<Vec<FragmentBinding>>> {
        self.fragments.iter().map(|f| f.find_bindings(name)).collect()
    }

    pub fn find_members(&self, owner: &[String]) -> Result<Vec<Vec<FragmentBinding>>> {
        self.fragments.iter().map(|f| f.find_members(owner)).collect()
    }

    /// Every binding, in any fragment, equivalent to `binding`. Includes
    /// the binding itself when its fragment is part of this view.
    pub fn find_equivalent_bindings(&self, binding: &FragmentBinding) -> Result<Vec<FragmentBinding>> {
        let mut equivalents = Vec::new();
        for fragment in &self.fragments {
            if let Some(adapted) = fragment.adapt_binding(binding)? {
                equivalents.push(adapted);
            }
        }
        Ok(equivalents)
    }
}

// ============================================================================
// Merge ordering
// ============================================================================

/// A binding ordered by the comparator chain, for use in ordered sets.
struct MergeEntry<'c> {
    binding: FragmentBinding,
    chain: &'c ComparatorChain,
}

impl PartialEq for MergeEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry<'_> {}

impl PartialOrd for MergeEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chain.compare(&self.binding, &other.binding)
    }
}

/// Among equivalent bindings the one with the lowest handle represents the
/// group, so the outcome does not depend on input order.
fn is_preferred(candidate: &FragmentBinding, current: &FragmentBinding) -> bool {
    candidate.handle() < current.handle()
}

// ============================================================================
// CompositesFactory
// ============================================================================

/// Creates composite bindings, types and scopes over a read-locked view.
///
/// Composite objects borrow the factory, so they cannot outlive the read
/// locks they were derived under.
pub struct CompositesFactory<'a> {
    index: IndexView<'a>,
    comparators: ComparatorChain,
}

impl<'a> CompositesFactory<'a> {
    pub fn new(index: IndexView<'a>, comparators: ComparatorChain) -> Self {
        Self { index, comparators }
    }

    pub fn index(&self) -> &IndexView<'a> {
        &self.index
    }

    pub fn comparators(&self) -> &ComparatorChain {
        &self.comparators
    }

    /// Wrap a single binding.
    pub fn composite_binding(&self, binding: FragmentBinding) -> CompositeBinding<'_> {
        CompositeBinding::new(binding, self)
    }

    /// Merge one result array per fragment into deduplicated composite
    /// bindings, in comparator order.
    pub fn composite_bindings(&self, per_fragment: &[Vec<FragmentBinding>]) -> Vec<CompositeBinding<'_>> {
        self.merge(per_fragment)
            .into_iter()
            .map(|binding| self.composite_binding(binding))
            .collect()
    }

    /// The deduplicated, ordered bindings behind [`Self::composite_bindings`].
    pub fn merge(&self, per_fragment: &[Vec<FragmentBinding>]) -> Vec<FragmentBinding> {
        let mut merged: BTreeSet<MergeEntry<'_>> = BTreeSet::new();
        for binding in per_fragment.iter().flatten() {
            let entry = MergeEntry {
                binding: binding.clone(),
                chain: &self.comparators,
            };
            let keep_existing = merged
                .get(&entry)
                .is_some_and(|existing| !is_preferred(&entry.binding, &existing.binding));
            if !keep_existing {
                merged.replace(entry);
            }
        }
        merged.into_iter().map(|entry| entry.binding).collect()
    }

    /// Wrap a type. Contained types are wrapped on access.
    pub fn composite_type(&self, ty: FragmentType) -> CompositeType<'_> {
        CompositeType::new(ty, self)
    }

    /// Wrap a scope.
    ///
    /// Scope bindings are normalized to their group representative so a
    /// scope reached along different paths yields equal composites. Named
    /// scopes are resolved across all fragments.
    pub fn composite_scope(&self, scope: FragmentScope) -> CompositeScope<'_> {
        match scope {
            FragmentScope::Binding(binding) => {
                let canonical = self.canonical(binding);
                CompositeScope::new(FragmentScope::Binding(canonical), self)
            }
            FragmentScope::Named(path) => self.scope_for_path(&path),
            other => CompositeScope::new(other, self),
        }
    }

    /// All bindings with the given name, merged across fragments.
    pub fn find_bindings(&self, name: &str) -> Result<Vec<CompositeBinding<'_>>> {
        let per_fragment = self.index.find_bindings(name)?;
        Ok(self.composite_bindings(&per_fragment))
    }

    pub fn global_scope(&self) -> CompositeScope<'_> {
        CompositeScope::new(FragmentScope::Global, self)
    }

    pub fn macro_container(&self) -> CompositeScope<'_> {
        CompositeScope::new(FragmentScope::MacroContainer, self)
    }

    /// The scope with the given qualified name.
    pub fn scope_for_path(&self, path: &[String]) -> CompositeScope<'_> {
        let Some((last, outer)) = path.split_last() else {
            return self.global_scope();
        };
        let candidates = match self.index.find_bindings(last) {
            Ok(per_fragment) => per_fragment
                .into_iter()
                .map(|bindings| {
                    bindings
                        .into_iter()
                        .filter(|b| b.class.is_scope() && b.owner == outer)
                        .collect()
                })
                .collect::<Vec<Vec<_>>>(),
            Err(e) => {
                tracing::warn!("Scope lookup for {} failed: {}", path.join("::"), e);
                Vec::new()
            }
        };
        match self.merge(&candidates).into_iter().next() {
            Some(binding) => CompositeScope::new(FragmentScope::Binding(binding), self),
            None => CompositeScope::new(FragmentScope::Named(path.to_vec()), self),
        }
    }

    /// Resolve a named type to the binding it names, across fragments.
    pub fn resolve_named_type(&self, keyword: TypeKeyword, name: &[String]) -> Option<CompositeBinding<'_>> {
        let (last, outer) = name.split_last()?;
        let per_fragment = match self.index.find_bindings(last) {
            Ok(per_fragment) => per_fragment,
            Err(e) => {
                tracing::warn!("Type lookup for {} failed: {}", name.join("::"), e);
                return None;
            }
        };
        let candidates: Vec<Vec<FragmentBinding>> = per_fragment
            .into_iter()
            .map(|bindings| {
                bindings
                    .into_iter()
                    .filter(|b| keyword.accepts(b.class) && b.owner == outer)
                    .collect()
            })
            .collect();
        self.composite_bindings(&candidates).into_iter().next()
    }

    /// Equivalent bindings in every fragment.
    ///
    /// Lookup failures are logged and reported as "no equivalents".
    pub fn find_equivalent_bindings(&self, binding: &FragmentBinding) -> Vec<FragmentBinding> {
        match self.index.find_equivalent_bindings(binding) {
            Ok(equivalents) => equivalents,
            Err(e) => {
                tracing::warn!(
                    "Equivalent binding search for `{}` ({}) failed: {}",
                    binding.name,
                    binding.fragment,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Pick one equivalent of `binding`: one with a definition if any,
    /// otherwise (when allowed) one with a declaration, otherwise any.
    ///
    /// # Panics
    ///
    /// Panics when no equivalent exists at all; the seed binding itself
    /// must be findable in the view it was read from.
    pub fn find_one_binding(&self, binding: &FragmentBinding, allow_declaration_fallback: bool) -> FragmentBinding {
        let equivalents = self.find_equivalent_bindings(binding);
        if let Some(definition) = equivalents.iter().find(|b| b.has_definition()) {
            return definition.clone();
        }
        if allow_declaration_fallback {
            if let Some(declaration) = equivalents.iter().find(|b| b.has_declaration()) {
                return declaration.clone();
            }
        }
        match equivalents.into_iter().next() {
            Some(any) => any,
            None => panic!(
                "no equivalent of binding `{}` ({}) found in any fragment",
                binding.qualified_name().join("::"),
                binding.fragment
            ),
        }
    }

    /// The representative of the equivalence group `binding` belongs to.
    fn canonical(&self, binding: FragmentBinding) -> FragmentBinding {
        self.find_equivalent_bindings(&binding)
            .into_iter()
            .min_by_key(|b| b.handle())
            .filter(|b| is_preferred(b, &binding))
            .unwrap_or(binding)
    }
}
