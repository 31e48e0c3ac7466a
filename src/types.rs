//! Core types shared by the fragment store, the composite view layer and
//! the tag indexer.
//!
//! - Identity handles (fragments, bindings)
//! - Symbol classification (tag kinds, kind classes, linkage)
//! - Tag records produced by the tag file parser

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier of an index fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentId(pub u32);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment-{}", self.0)
    }
}

/// Fragment-internal key of a stored binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingKey(pub u32);

/// Index-stable handle to a binding: which fragment, which record.
///
/// Handles stay valid while the owning fragment's read lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingRef {
    pub fragment: FragmentId,
    pub key: BindingKey,
}

/// Storage representation of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentFormat {
    /// Writable fragment maintained by the tag indexer.
    Tags,
    /// Read-only fragment loaded from a persisted snapshot.
    Snapshot,
}

// ============================================================================
// Symbol classification
// ============================================================================

/// Kind of a tag record, as reported by the tag tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    Class,
    Macro,
    Enumerator,
    Function,
    Enum,
    Member,
    Namespace,
    Prototype,
    Struct,
    Typedef,
    Union,
    Variable,
    ExternVar,
    Unknown,
}

impl TagKind {
    /// Parse a kind from either its long name (`function`) or the
    /// single-letter form the tool emits without `--fields=+K`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "class" | "c" => Self::Class,
            "macro" | "d" => Self::Macro,
            "enumerator" | "e" => Self::Enumerator,
            "function" | "f" => Self::Function,
            "enum" | "g" => Self::Enum,
            "member" | "m" => Self::Member,
            "namespace" | "n" => Self::Namespace,
            "prototype" | "p" => Self::Prototype,
            "struct" | "s" => Self::Struct,
            "typedef" | "t" => Self::Typedef,
            "union" | "u" => Self::Union,
            "variable" | "v" => Self::Variable,
            "externvar" | "x" => Self::ExternVar,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Macro => "macro",
            Self::Enumerator => "enumerator",
            Self::Function => "function",
            Self::Enum => "enum",
            Self::Member => "member",
            Self::Namespace => "namespace",
            Self::Prototype => "prototype",
            Self::Struct => "struct",
            Self::Typedef => "typedef",
            Self::Union => "union",
            Self::Variable => "variable",
            Self::ExternVar => "externvar",
            Self::Unknown => "unknown",
        }
    }

    /// The logical binding class this kind contributes to.
    pub fn class(&self) -> KindClass {
        match self {
            Self::Function | Self::Prototype => KindClass::Function,
            Self::Variable | Self::ExternVar => KindClass::Variable,
            Self::Member => KindClass::Field,
            Self::Class | Self::Struct | Self::Union => KindClass::Composite,
            Self::Enum => KindClass::Enumeration,
            Self::Enumerator => KindClass::Enumerator,
            Self::Typedef => KindClass::Typedef,
            Self::Macro => KindClass::Macro,
            Self::Namespace => KindClass::Namespace,
            Self::Unknown => KindClass::Unknown,
        }
    }

    /// Whether a record of this kind is a definition rather than a
    /// declaration.
    pub fn is_definition(&self) -> bool {
        !matches!(self, Self::Prototype | Self::ExternVar)
    }
}

/// Logical class of a binding.
///
/// Records of different kinds can describe one binding (a prototype and a
/// function definition), so matching and merging work on classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KindClass {
    Namespace,
    Composite,
    Enumeration,
    Enumerator,
    Typedef,
    Function,
    Variable,
    Field,
    Macro,
    Unknown,
}

impl KindClass {
    /// Whether bindings of this class own a scope.
    pub fn is_scope(&self) -> bool {
        matches!(self, Self::Namespace | Self::Composite | Self::Enumeration)
    }

    /// Whether bindings of this class can be the target of a named type.
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Composite | Self::Enumeration | Self::Typedef)
    }
}

/// Linkage of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Linkage {
    C,
    Cpp,
}

impl Linkage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Cpp => "C++",
        }
    }
}

// ============================================================================
// Names and records
// ============================================================================

/// One occurrence (declaration or definition) of a binding in a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingName {
    pub file: PathBuf,
    /// Zero-based line, `-1` when the tool emitted an unreadable anchor.
    pub line: i64,
    pub is_definition: bool,
}

/// A single parsed line of a tag file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub element_name: String,
    pub file: PathBuf,
    /// Zero-based line, `-1` when the anchor could not be parsed.
    pub line: i64,
    pub kind: TagKind,
    pub extra_fields: BTreeMap<String, String>,
}

impl TagRecord {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.extra_fields.get(key).map(|s| s.as_str())
    }

    pub fn language(&self) -> Option<&str> {
        self.field("language")
    }
}
