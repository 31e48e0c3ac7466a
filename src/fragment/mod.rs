//! Index fragments: persisted stores of bindings for one source root or
//! library.
//!
//! The composite view layer only sees fragments through [`IndexFragment`]
//! and the read-locked [`FragmentRead`] view it hands out. The tag indexer
//! additionally writes to [`TagFragment`] through a [`FragmentWriter`].

pub mod snapshot;
pub mod store;

pub use snapshot::{load_snapshot, save_snapshot};
pub use store::{FragmentWriter, NewBinding, TagFragment};

use crate::error::Result;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::Path;

// ============================================================================
// Fragment interfaces
// ============================================================================

/// A persisted store of bindings.
pub trait IndexFragment: Send + Sync {
    fn id(&self) -> FragmentId;

    fn format(&self) -> FragmentFormat;

    /// Acquire the fragment's read lock. The lock is released when the
    /// returned view is dropped.
    fn read(&self) -> Box<dyn FragmentRead + '_>;
}

/// Read-locked view of one fragment.
///
/// Bindings returned from a view are snapshots; they stay meaningful only
/// while the view is alive.
pub trait FragmentRead: Sync {
    fn id(&self) -> FragmentId;

    fn format(&self) -> FragmentFormat;

    /// Look up a binding by its fragment-internal key.
    fn binding(&self, key: BindingKey) -> Option<FragmentBinding>;

    /// All bindings with the given simple name, in any scope.
    fn find_bindings(&self, name: &str) -> Result<Vec<FragmentBinding>>;

    /// All bindings owned by the scope with the given qualified name. An
    /// empty owner lists the global scope.
    fn find_members(&self, owner: &[String]) -> Result<Vec<FragmentBinding>>;

    /// Simple names stored in this fragment.
    fn name_candidates(&self) -> Vec<String>;

    /// Whether any stored name comes from the given file.
    fn contains_path(&self, path: &Path) -> bool;

    fn binding_count(&self) -> usize;

    /// The scope owning a binding, as far as this fragment knows it.
    fn scope_of(&self, binding: &FragmentBinding) -> Result<FragmentScope> {
        if binding.class == KindClass::Macro {
            return Ok(FragmentScope::MacroContainer);
        }
        let Some((last, outer)) = binding.owner.split_last() else {
            return Ok(FragmentScope::Global);
        };
        let scope = self
            .find_bindings(last)?
            .into_iter()
            .find(|candidate| candidate.class.is_scope() && candidate.owner == outer);
        Ok(match scope {
            Some(scope) => FragmentScope::Binding(scope),
            None => FragmentScope::Named(binding.owner.clone()),
        })
    }

    /// Find the binding in this fragment equivalent to one read from any
    /// fragment: same name, owner, class and linkage.
    fn adapt_binding(&self, binding: &FragmentBinding) -> Result<Option<FragmentBinding>> {
        if binding.fragment == self.id() {
            return Ok(self.binding(binding.key));
        }
        Ok(self
            .find_bindings(&binding.name)?
            .into_iter()
            .find(|candidate| candidate.is_equivalent(binding)))
    }
}

// ============================================================================
// Bindings and types
// ============================================================================

/// A binding read from one fragment.
///
/// Identity is `(fragment, key)`; the remaining fields are the attributes
/// the fragment stored for it.
#[derive(Debug, Clone)]
pub struct FragmentBinding {
    pub fragment: FragmentId,
    pub format: FragmentFormat,
    pub key: BindingKey,
    pub name: String,
    /// Qualified name of the owning scope, empty at global scope
    pub owner: Vec<String>,
    pub class: KindClass,
    /// Kind of the most specific record seen (definitions win)
    pub kind: TagKind,
    pub linkage: Linkage,
    pub ty: Option<FragmentType>,
    pub names: Vec<BindingName>,
}

impl FragmentBinding {
    pub fn handle(&self) -> BindingRef {
        BindingRef {
            fragment: self.fragment,
            key: self.key,
        }
    }

    pub fn qualified_name(&self) -> Vec<String> {
        let mut qualified = self.owner.clone();
        qualified.push(self.name.clone());
        qualified
    }

    pub fn has_definition(&self) -> bool {
        self.names.iter().any(|n| n.is_definition)
    }

    pub fn has_declaration(&self) -> bool {
        self.names.iter().any(|n| !n.is_definition)
    }

    /// Whether two bindings, possibly from different fragments, describe the
    /// same logical binding.
    pub fn is_equivalent(&self, other: &FragmentBinding) -> bool {
        self.name == other.name
            && self.owner == other.owner
            && self.class == other.class
            && self.linkage == other.linkage
    }
}

impl PartialEq for FragmentBinding {
    fn eq(&self, other: &Self) -> bool {
        self.fragment == other.fragment && self.key == other.key
    }
}

impl Eq for FragmentBinding {}

impl Hash for FragmentBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fragment.hash(state);
        self.key.hash(state);
    }
}

/// A scope as seen from one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentScope {
    Global,
    /// Container of all macro definitions
    MacroContainer,
    /// A namespace, class or enumeration binding
    Binding(FragmentBinding),
    /// A scope known only by its qualified name, e.g. a class whose
    /// definition this fragment has not indexed
    Named(Vec<String>),
}

/// Keyword a named type was spelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKeyword {
    Struct,
    Union,
    Enum,
    Class,
    /// A bare name such as a typedef
    Plain,
}

impl TypeKeyword {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "struct" => Some(Self::Struct),
            "union" => Some(Self::Union),
            "enum" => Some(Self::Enum),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    /// Whether a binding of the given class can be named by this keyword.
    pub fn accepts(&self, class: KindClass) -> bool {
        match self {
            Self::Struct | Self::Union | Self::Class => class == KindClass::Composite,
            Self::Enum => class == KindClass::Enumeration,
            Self::Plain => class.is_type(),
        }
    }
}

/// Type information stored with a binding.
///
/// Named types are kept by name and resolved lazily by the composite
/// layer, so that type graphs with cycles never have to be materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentType {
    Basic(String),
    Named {
        keyword: TypeKeyword,
        /// Qualified name, outermost scope first
        name: Vec<String>,
    },
    Pointer(Box<FragmentType>),
    Qualifier {
        is_const: bool,
        is_volatile: bool,
        target: Box<FragmentType>,
    },
    Array {
        size: Option<u64>,
        element: Box<FragmentType>,
    },
    Function {
        return_type: Box<FragmentType>,
        params: Vec<FragmentType>,
    },
}
