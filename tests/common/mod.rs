//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A stand-in for ctags: writes one function record per target to the
/// file given with `-f`. For a directory target the record is placed in
/// `<target>/<name>.c`, for a file target in the file itself; the symbol
/// is `sym_<name>` where `<name>` is the target's base name without
/// extension.
#[cfg(unix)]
pub const FAKE_TAG_TOOL: &str = r#"#!/bin/sh
out=""
target=""
while [ $# -gt 0 ]; do
  case "$1" in
    -f) out="$2"; shift ;;
    -*) ;;
    *) target="$1" ;;
  esac
  shift
done
name=$(basename "$target" | sed 's/\..*//')
if [ -f "$target" ]; then file="$target"; else file="$target/$name.c"; fi
printf '!_TAG_FILE_FORMAT\t2\t/extended format/\n' > "$out"
printf 'sym_%s\t%s\t1;"\tkind:function\tlanguage:C\n' "$name" "$file" >> "$out"
"#;

/// Write an executable script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    let mut permissions = fs::metadata(&path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod");
    path
}

#[cfg(unix)]
pub fn fake_tag_tool(dir: &Path) -> PathBuf {
    write_script(dir, "fake-ctags", FAKE_TAG_TOOL)
}

/// Create `count` source roots under `dir`, each holding one C file.
pub fn source_roots(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let root = dir.join(format!("root{}", i));
            fs::create_dir_all(&root).expect("mkdir");
            fs::write(root.join(format!("root{}.c", i)), "int f(void) { return 0; }\n")
                .expect("write source");
            root
        })
        .collect()
}
