use crate::composite::factory::CompositesFactory;
use crate::composite::scope::CompositeScope;
use crate::composite::types::CompositeType;
use crate::error::{IndexError, Result};
use crate::fragment::{FragmentBinding, FragmentScope};
use crate::types::*;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One logical binding, possibly backed by equivalent bindings in several
/// fragments.
///
/// Delegates attribute queries to a representative fragment binding and
/// routes every derived binding, type or scope back through the factory.
/// Equality and hashing consider only the representative.
#[derive(Clone)]
pub struct CompositeBinding<'f> {
    representative: FragmentBinding,
    factory: &'f CompositesFactory<'f>,
}

impl<'f> CompositeBinding<'f> {
    pub(crate) fn new(representative: FragmentBinding, factory: &'f CompositesFactory<'f>) -> Self {
        Self {
            representative,
            factory,
        }
    }

    pub fn representative(&self) -> &FragmentBinding {
        &self.representative
    }

    pub fn name(&self) -> &str {
        &self.representative.name
    }

    pub fn qualified_name(&self) -> Vec<String> {
        self.representative.qualified_name()
    }

    pub fn kind(&self) -> TagKind {
        self.representative.kind
    }

    pub fn class(&self) -> KindClass {
        self.representative.class
    }

    pub fn linkage(&self) -> Linkage {
        self.representative.linkage
    }

    /// The scope owning this binding.
    pub fn scope(&self) -> CompositeScope<'f> {
        let fragment_scope = match self.factory.index().fragment(self.representative.fragment) {
            Some(fragment) => fragment.scope_of(&self.representative).unwrap_or_else(|e| {
                tracing::warn!("Scope lookup for `{}` failed: {}", self.name(), e);
                FragmentScope::Named(self.representative.owner.clone())
            }),
            None => FragmentScope::Named(self.representative.owner.clone()),
        };
        self.factory.composite_scope(fragment_scope)
    }

    /// The binding owning this one's scope, if it is a binding.
    pub fn owner(&self) -> Option<CompositeBinding<'f>> {
        self.scope().scope_binding()
    }

    /// Declared type, wrapped so that nested types stay composite.
    pub fn ty(&self) -> Option<CompositeType<'f>> {
        self.representative
            .ty
            .clone()
            .map(|ty| self.factory.composite_type(ty))
    }

    /// The equivalent binding stored in a specific fragment.
    pub fn adapt(&self, fragment: FragmentId) -> Option<FragmentBinding> {
        let view = self.factory.index().fragment(fragment)?;
        match view.adapt_binding(&self.representative) {
            Ok(adapted) => adapted,
            Err(e) => {
                tracing::warn!("Adapting `{}` to {} failed: {}", self.name(), fragment, e);
                None
            }
        }
    }

    /// Equivalent bindings across all fragments.
    pub fn equivalents(&self) -> Vec<FragmentBinding> {
        self.factory.find_equivalent_bindings(&self.representative)
    }

    /// The preferred equivalent: a definition when one exists.
    pub fn preferred(&self, allow_declaration_fallback: bool) -> CompositeBinding<'f> {
        let binding = self
            .factory
            .find_one_binding(&self.representative, allow_declaration_fallback);
        self.factory.composite_binding(binding)
    }

    /// Whether any fragment holds a definition.
    pub fn has_definition(&self) -> bool {
        self.equivalents().iter().any(|b| b.has_definition())
    }

    /// Declaration presence cannot be decided from merged fragments yet.
    pub fn has_declaration(&self) -> Result<bool> {
        Err(IndexError::CompositionUnsupported(
            "CompositeBinding::has_declaration",
        ))
    }

    /// Declarations and definitions from every fragment, deduplicated.
    pub fn names(&self) -> Vec<BindingName> {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        for binding in self.equivalents() {
            for name in binding.names {
                if seen.insert((name.file.clone(), name.line, name.is_definition)) {
                    names.push(name);
                }
            }
        }
        names
    }
}

impl PartialEq for CompositeBinding<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.representative == other.representative
    }
}

impl Eq for CompositeBinding<'_> {}

impl Hash for CompositeBinding<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.representative.hash(state);
    }
}

impl fmt::Debug for CompositeBinding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBinding")
            .field("name", &self.qualified_name().join("::"))
            .field("kind", &self.kind())
            .field("fragment", &self.representative.fragment)
            .field("key", &self.representative.key)
            .finish()
    }
}
