use crate::composite::binding::CompositeBinding;
use crate::composite::factory::CompositesFactory;
use crate::error::{IndexError, Result};
use crate::fragment::{FragmentBinding, FragmentScope};
use crate::types::KindClass;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of a composite scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Enumeration,
    MacroContainer,
    /// Known only by name; no fragment indexed the owning binding
    Unresolved,
}

/// A scope whose lookups span every fragment.
///
/// Equality considers only the wrapped fragment scope, so a scope reached
/// through different bindings compares equal and visited sets built from
/// parent chains terminate.
#[derive(Clone)]
pub struct CompositeScope<'f> {
    representative: FragmentScope,
    factory: &'f CompositesFactory<'f>,
}

impl<'f> CompositeScope<'f> {
    pub(crate) fn new(representative: FragmentScope, factory: &'f CompositesFactory<'f>) -> Self {
        Self {
            representative,
            factory,
        }
    }

    pub fn representative(&self) -> &FragmentScope {
        &self.representative
    }

    pub fn kind(&self) -> ScopeKind {
        match &self.representative {
            FragmentScope::Global => ScopeKind::Global,
            FragmentScope::MacroContainer => ScopeKind::MacroContainer,
            FragmentScope::Named(_) => ScopeKind::Unresolved,
            FragmentScope::Binding(binding) => match binding.class {
                KindClass::Namespace => ScopeKind::Namespace,
                KindClass::Enumeration => ScopeKind::Enumeration,
                _ => ScopeKind::Class,
            },
        }
    }

    /// Qualified name of the scope, empty for the global scope and the
    /// macro container.
    pub fn qualified_name(&self) -> Vec<String> {
        match &self.representative {
            FragmentScope::Global | FragmentScope::MacroContainer => Vec::new(),
            FragmentScope::Named(path) => path.clone(),
            FragmentScope::Binding(binding) => binding.qualified_name(),
        }
    }

    /// The binding that owns this scope.
    pub fn scope_binding(&self) -> Option<CompositeBinding<'f>> {
        match &self.representative {
            FragmentScope::Binding(binding) => Some(self.factory.composite_binding(binding.clone())),
            _ => None,
        }
    }

    /// The enclosing scope. `None` for the global scope and the macro
    /// container.
    pub fn parent(&self) -> Option<CompositeScope<'f>> {
        match &self.representative {
            FragmentScope::Global | FragmentScope::MacroContainer => None,
            FragmentScope::Binding(binding) => {
                Some(self.factory.composite_binding(binding.clone()).scope())
            }
            FragmentScope::Named(path) => {
                let outer = &path[..path.len().saturating_sub(1)];
                Some(self.factory.scope_for_path(outer))
            }
        }
    }

    /// Bindings with the given name declared directly in this scope.
    pub fn find_bindings(&self, name: &str) -> Result<Vec<CompositeBinding<'f>>> {
        let per_fragment = self.factory.index().find_bindings(name)?;
        let filtered = self.retain_members(per_fragment);
        Ok(self.factory.composite_bindings(&filtered))
    }

    /// All bindings declared directly in this scope.
    pub fn bindings(&self) -> Result<Vec<CompositeBinding<'f>>> {
        let per_fragment = self.factory.index().find_members(&self.qualified_name())?;
        let filtered = self.retain_members(per_fragment);
        Ok(self.factory.composite_bindings(&filtered))
    }

    /// Composite scopes are read-only views.
    pub fn add_binding(&self, _binding: &CompositeBinding<'_>) -> Result<()> {
        Err(IndexError::CompositionUnsupported("CompositeScope::add_binding"))
    }

    fn retain_members(&self, per_fragment: Vec<Vec<FragmentBinding>>) -> Vec<Vec<FragmentBinding>> {
        let is_macro_container = matches!(self.representative, FragmentScope::MacroContainer);
        let owner = self.qualified_name();
        per_fragment
            .into_iter()
            .map(|bindings| {
                bindings
                    .into_iter()
                    .filter(|b| {
                        if is_macro_container {
                            b.class == KindClass::Macro
                        } else {
                            b.class != KindClass::Macro && b.owner == owner
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

impl PartialEq for CompositeScope<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.representative == other.representative
    }
}

impl Eq for CompositeScope<'_> {}

impl Hash for CompositeScope<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.representative.hash(state);
    }
}

impl fmt::Debug for CompositeScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeScope")
            .field("kind", &self.kind())
            .field("name", &self.qualified_name().join("::"))
            .finish()
    }
}
