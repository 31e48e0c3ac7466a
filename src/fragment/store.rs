//! In-memory fragment store maintained by the tag indexer.
//!
//! All access goes through the fragment's `RwLock`: readers get a
//! [`FragmentRead`] view holding the read guard, the indexer gets a
//! [`FragmentWriter`] holding the write guard. Dropping either releases the
//! lock, including on early returns and panics.

use crate::error::{IndexError, Result};
use crate::fragment::{FragmentBinding, FragmentRead, FragmentType, IndexFragment};
use crate::types::*;
use lasso::{Spur, ThreadedRodeo};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A binding as kept in the store, names interned.
#[derive(Debug, Clone)]
pub(crate) struct StoredBinding {
    pub(crate) name: Spur,
    pub(crate) owner: Vec<Spur>,
    pub(crate) class: KindClass,
    pub(crate) kind: TagKind,
    pub(crate) linkage: Linkage,
    pub(crate) ty: Option<FragmentType>,
    pub(crate) names: Vec<BindingName>,
}

#[derive(Default)]
pub(crate) struct FragmentData {
    /// String interner for binding and scope names. Append-only: names of
    /// removed bindings stay interned until `clear_all`, which every full
    /// reindex performs.
    pub(crate) interner: ThreadedRodeo,
    pub(crate) bindings: HashMap<BindingKey, StoredBinding>,
    /// Simple name -> bindings with that name
    by_name: HashMap<Spur, Vec<BindingKey>>,
    /// Owner qualified name -> bindings in that scope
    by_owner: HashMap<Vec<Spur>, Vec<BindingKey>>,
    /// File -> bindings with at least one name in that file
    by_file: HashMap<PathBuf, HashSet<BindingKey>>,
    pub(crate) next_key: u32,
}

impl FragmentData {
    pub(crate) fn intern(&self, s: &str) -> Spur {
        self.interner.get_or_intern(s)
    }

    pub(crate) fn resolve(&self, s: Spur) -> &str {
        self.interner.resolve(&s)
    }

    /// Interned form of an owner path, `None` if some segment was never
    /// stored (in which case nothing can live in that scope).
    fn lookup_owner(&self, owner: &[String]) -> Option<Vec<Spur>> {
        owner.iter().map(|s| self.interner.get(s.as_str())).collect()
    }

    fn to_binding(
        &self,
        id: FragmentId,
        format: FragmentFormat,
        key: BindingKey,
        stored: &StoredBinding,
    ) -> FragmentBinding {
        FragmentBinding {
            fragment: id,
            format,
            key,
            name: self.resolve(stored.name).to_string(),
            owner: stored
                .owner
                .iter()
                .map(|s| self.resolve(*s).to_string())
                .collect(),
            class: stored.class,
            kind: stored.kind,
            linkage: stored.linkage,
            ty: stored.ty.clone(),
            names: stored.names.clone(),
        }
    }

    pub(crate) fn insert_with_key(&mut self, key: BindingKey, stored: StoredBinding) {
        self.by_name.entry(stored.name).or_default().push(key);
        self.by_owner
            .entry(stored.owner.clone())
            .or_default()
            .push(key);
        for name in &stored.names {
            self.by_file.entry(name.file.clone()).or_default().insert(key);
        }
        self.next_key = self.next_key.max(key.0 + 1);
        self.bindings.insert(key, stored);
    }

    fn insert(&mut self, stored: StoredBinding) -> BindingKey {
        let key = BindingKey(self.next_key);
        self.insert_with_key(key, stored);
        key
    }

    fn remove(&mut self, key: BindingKey) {
        let Some(stored) = self.bindings.remove(&key) else {
            return;
        };
        if let Some(keys) = self.by_name.get_mut(&stored.name) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_name.remove(&stored.name);
            }
        }
        if let Some(keys) = self.by_owner.get_mut(&stored.owner) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_owner.remove(&stored.owner);
            }
        }
    }

    /// Remove every name recorded for a file, dropping bindings that are
    /// left without names. Returns the number of names removed. Interned
    /// strings are kept.
    fn clear_path(&mut self, path: &Path) -> usize {
        let Some(keys) = self.by_file.remove(path) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            let orphaned = match self.bindings.get_mut(&key) {
                Some(stored) => {
                    let before = stored.names.len();
                    stored.names.retain(|n| n.file.as_path() != path);
                    removed += before - stored.names.len();
                    stored.names.is_empty()
                }
                None => false,
            };
            if orphaned {
                self.remove(key);
            }
        }
        removed
    }
}

// ============================================================================
// TagFragment
// ============================================================================

/// Lock-guarded binding store for one fragment.
pub struct TagFragment {
    id: FragmentId,
    format: FragmentFormat,
    data: RwLock<FragmentData>,
}

impl TagFragment {
    /// Create an empty writable fragment.
    pub fn new(id: FragmentId) -> Self {
        Self::with_format(id, FragmentFormat::Tags)
    }

    pub fn with_format(id: FragmentId, format: FragmentFormat) -> Self {
        Self::from_data(id, format, FragmentData::default())
    }

    pub(crate) fn from_data(id: FragmentId, format: FragmentFormat, data: FragmentData) -> Self {
        Self {
            id,
            format,
            data: RwLock::new(data),
        }
    }

    /// Acquire the write lock.
    ///
    /// Blocks while readers or another writer hold the lock. Must not be
    /// called from a thread that holds a read view of this fragment.
    pub fn write(&self) -> Result<FragmentWriter<'_>> {
        if self.format == FragmentFormat::Snapshot {
            return Err(IndexError::ReadOnlyFragment(self.id));
        }
        Ok(FragmentWriter {
            id: self.id,
            format: self.format,
            data: self.data.write(),
        })
    }

    pub fn binding_count(&self) -> usize {
        self.data.read().bindings.len()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.data.read().by_file.contains_key(path)
    }

    /// Stored files at or below `path`, sorted.
    pub fn paths_under(&self, path: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .data
            .read()
            .by_file
            .keys()
            .filter(|file| file.starts_with(path))
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Run `f` with the raw data under the read lock.
    pub(crate) fn with_data<T>(&self, f: impl FnOnce(&FragmentData) -> T) -> T {
        f(&self.data.read())
    }
}

impl IndexFragment for TagFragment {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn format(&self) -> FragmentFormat {
        self.format
    }

    fn read(&self) -> Box<dyn FragmentRead + '_> {
        Box::new(TagFragmentReader {
            id: self.id,
            format: self.format,
            data: self.data.read(),
        })
    }
}

struct TagFragmentReader<'a> {
    id: FragmentId,
    format: FragmentFormat,
    data: RwLockReadGuard<'a, FragmentData>,
}

impl TagFragmentReader<'_> {
    fn collect(&self, keys: Option<&Vec<BindingKey>>) -> Vec<FragmentBinding> {
        keys.map(|keys| {
            keys.iter()
                .filter_map(|key| self.binding(*key))
                .collect()
        })
        .unwrap_or_default()
    }
}

impl FragmentRead for TagFragmentReader<'_> {
    fn id(&self) -> FragmentId {
        self.id
    }

    fn format(&self) -> FragmentFormat {
        self.format
    }

    fn binding(&self, key: BindingKey) -> Option<FragmentBinding> {
        self.data
            .bindings
            .get(&key)
            .map(|stored| self.data.to_binding(self.id, self.format, key, stored))
    }

    fn find_bindings(&self, name: &str) -> Result<Vec<FragmentBinding>> {
        let Some(name) = self.data.interner.get(name) else {
            return Ok(Vec::new());
        };
        Ok(self.collect(self.data.by_name.get(&name)))
    }

    fn find_members(&self, owner: &[String]) -> Result<Vec<FragmentBinding>> {
        let Some(owner) = self.data.lookup_owner(owner) else {
            return Ok(Vec::new());
        };
        Ok(self.collect(self.data.by_owner.get(&owner)))
    }

    fn name_candidates(&self) -> Vec<String> {
        self.data
            .by_name
            .keys()
            .map(|s| self.data.resolve(*s).to_string())
            .collect()
    }

    fn contains_path(&self, path: &Path) -> bool {
        self.data.by_file.contains_key(path)
    }

    fn binding_count(&self) -> usize {
        self.data.bindings.len()
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Attributes of a binding to create.
#[derive(Debug, Clone)]
pub struct NewBinding {
    pub name: String,
    pub owner: Vec<String>,
    pub kind: TagKind,
    pub linkage: Linkage,
    pub ty: Option<FragmentType>,
}

/// Write access to a fragment. The write lock is held until drop.
pub struct FragmentWriter<'a> {
    id: FragmentId,
    format: FragmentFormat,
    data: RwLockWriteGuard<'a, FragmentData>,
}

impl FragmentWriter<'_> {
    pub fn id(&self) -> FragmentId {
        self.id
    }

    /// Find a binding in the given scope with the given name whose class
    /// matches.
    pub fn find_binding(
        &self,
        owner: &[String],
        name: &str,
        class: KindClass,
        linkage: Linkage,
    ) -> Option<BindingKey> {
        let name = self.data.interner.get(name)?;
        let owner = self.data.lookup_owner(owner)?;
        self.data.by_name.get(&name)?.iter().copied().find(|key| {
            self.data.bindings.get(key).is_some_and(|stored| {
                stored.owner == owner && stored.class == class && stored.linkage == linkage
            })
        })
    }

    /// Create a binding together with its first name.
    pub fn add_binding(&mut self, binding: NewBinding, name: BindingName) -> BindingKey {
        let stored = StoredBinding {
            name: self.data.intern(&binding.name),
            owner: binding.owner.iter().map(|s| self.data.intern(s)).collect(),
            class: binding.kind.class(),
            kind: binding.kind,
            linkage: binding.linkage,
            ty: binding.ty,
            names: vec![name],
        };
        self.data.insert(stored)
    }

    /// Record another occurrence of an existing binding.
    ///
    /// A definition record also updates the binding's kind, so a prototype
    /// followed by its definition reads back as a function.
    pub fn add_name(&mut self, key: BindingKey, kind: TagKind, name: BindingName) -> Result<()> {
        let data = &mut *self.data;
        let stored = data
            .bindings
            .get_mut(&key)
            .ok_or_else(|| IndexError::Storage(format!("no binding {:?} in {}", key, self.id)))?;
        if kind.is_definition() {
            stored.kind = kind;
        }
        if !stored.names.contains(&name) {
            data.by_file.entry(name.file.clone()).or_default().insert(key);
            stored.names.push(name);
        }
        Ok(())
    }

    /// Replace the stored type of a binding.
    pub fn set_type(&mut self, key: BindingKey, ty: FragmentType) -> Result<()> {
        let stored = self
            .data
            .bindings
            .get_mut(&key)
            .ok_or_else(|| IndexError::Storage(format!("no binding {:?} in {}", key, self.id)))?;
        stored.ty = Some(ty);
        Ok(())
    }

    pub fn binding(&self, key: BindingKey) -> Option<FragmentBinding> {
        self.data
            .bindings
            .get(&key)
            .map(|stored| self.data.to_binding(self.id, self.format, key, stored))
    }

    /// Drop all data stored for a file.
    pub fn clear_path(&mut self, path: &Path) -> usize {
        self.data.clear_path(path)
    }

    /// Drop all fragment contents, interned names included.
    pub fn clear_all(&mut self) {
        *self.data = FragmentData::default();
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.data.by_file.contains_key(path)
    }

    pub fn binding_count(&self) -> usize {
        self.data.bindings.len()
    }
}
