//! Snapshot persistence for tag fragments.

use crate::error::Result;
use crate::fragment::store::{FragmentData, StoredBinding, TagFragment};
use crate::fragment::{FragmentType, IndexFragment};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Snapshot format version, bumped on incompatible changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotBinding {
    key: BindingKey,
    name: String,
    owner: Vec<String>,
    class: KindClass,
    kind: TagKind,
    linkage: Linkage,
    ty: Option<FragmentType>,
    names: Vec<BindingName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FragmentSnapshot {
    version: u32,
    tool_version: String,
    next_key: u32,
    bindings: Vec<SnapshotBinding>,
}

/// Persist a fragment's contents.
pub fn save_snapshot(fragment: &TagFragment, path: &Path) -> Result<()> {
    let snapshot = fragment.with_data(|data| {
        let mut bindings: Vec<SnapshotBinding> = data
            .bindings
            .iter()
            .map(|(key, stored)| SnapshotBinding {
                key: *key,
                name: data.resolve(stored.name).to_string(),
                owner: stored
                    .owner
                    .iter()
                    .map(|s| data.resolve(*s).to_string())
                    .collect(),
                class: stored.class,
                kind: stored.kind,
                linkage: stored.linkage,
                ty: stored.ty.clone(),
                names: stored.names.clone(),
            })
            .collect();
        bindings.sort_by_key(|b| b.key);
        FragmentSnapshot {
            version: SNAPSHOT_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            next_key: data.next_key,
            bindings,
        }
    });

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = bincode::serialize(&snapshot)?;
    fs::write(path, data)?;
    tracing::debug!(
        "Saved {} bindings of {} to {}",
        snapshot.bindings.len(),
        fragment.id(),
        path.display()
    );
    Ok(())
}

/// Load a fragment from a snapshot. Loading as [`FragmentFormat::Snapshot`]
/// yields a read-only fragment, e.g. for a prebuilt dependency index.
pub fn load_snapshot(path: &Path, id: FragmentId, format: FragmentFormat) -> Result<TagFragment> {
    let data = fs::read(path)?;
    let snapshot: FragmentSnapshot = bincode::deserialize(&data)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(crate::error::IndexError::Storage(format!(
            "snapshot {} has version {}, expected {}",
            path.display(),
            snapshot.version,
            SNAPSHOT_VERSION
        )));
    }

    let mut fragment_data = FragmentData::default();
    for binding in snapshot.bindings {
        let stored = StoredBinding {
            name: fragment_data.intern(&binding.name),
            owner: binding
                .owner
                .iter()
                .map(|s| fragment_data.intern(s))
                .collect(),
            class: binding.class,
            kind: binding.kind,
            linkage: binding.linkage,
            ty: binding.ty,
            names: binding.names,
        };
        fragment_data.insert_with_key(binding.key, stored);
    }
    fragment_data.next_key = fragment_data.next_key.max(snapshot.next_key);

    Ok(TagFragment::from_data(id, format, fragment_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{FragmentRead, NewBinding};
    use std::path::PathBuf;

    #[test]
    fn snapshot_preserves_bindings_and_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("deps").join("fragment.bin");

        let fragment = TagFragment::new(FragmentId(1));
        let key = fragment.write().expect("writable").add_binding(
            NewBinding {
                name: "next".to_string(),
                owner: vec!["node".to_string()],
                kind: TagKind::Member,
                linkage: Linkage::C,
                ty: Some(FragmentType::Pointer(Box::new(FragmentType::Named {
                    keyword: crate::fragment::TypeKeyword::Struct,
                    name: vec!["node".to_string()],
                }))),
            },
            BindingName {
                file: PathBuf::from("list.h"),
                line: 4,
                is_definition: true,
            },
        );
        save_snapshot(&fragment, &path).expect("save");

        let loaded = load_snapshot(&path, FragmentId(5), FragmentFormat::Snapshot).expect("load");
        assert_eq!(loaded.id(), FragmentId(5));
        assert!(loaded.write().is_err());

        let view = loaded.read();
        let binding = view.binding(key).expect("same key");
        assert_eq!(binding.name, "next");
        assert_eq!(binding.owner, vec!["node".to_string()]);
        assert_eq!(binding.fragment, FragmentId(5));
        assert_eq!(binding.format, FragmentFormat::Snapshot);
        assert!(matches!(binding.ty, Some(FragmentType::Pointer(_))));
        assert!(view.contains_path(Path::new("list.h")));
    }

    #[test]
    fn reloaded_writable_fragment_keeps_allocating_fresh_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("fragment.bin");

        let fragment = TagFragment::new(FragmentId(1));
        let first = fragment.write().expect("writable").add_binding(
            NewBinding {
                name: "a".to_string(),
                owner: Vec::new(),
                kind: TagKind::Variable,
                linkage: Linkage::C,
                ty: None,
            },
            BindingName {
                file: PathBuf::from("a.c"),
                line: 0,
                is_definition: true,
            },
        );
        save_snapshot(&fragment, &path).expect("save");

        let loaded = load_snapshot(&path, FragmentId(1), FragmentFormat::Tags).expect("load");
        let second = loaded.write().expect("writable").add_binding(
            NewBinding {
                name: "b".to_string(),
                owner: Vec::new(),
                kind: TagKind::Variable,
                linkage: Linkage::C,
                ty: None,
            },
            BindingName {
                file: PathBuf::from("b.c"),
                line: 0,
                is_definition: true,
            },
        );
        assert_ne!(first, second);
        assert_eq!(loaded.binding_count(), 2);
    }
}
