use crate::error::Result;
use crate::types::FragmentId;
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_DIR: &str = ".tagindex";
pub const CONFIG_FILE: &str = "config.json";
pub const SNAPSHOT_FILE: &str = "fragment.bin";

pub fn cache_dir(project: &Path) -> PathBuf {
    project.join(CACHE_DIR)
}

pub fn ensure_cache_dir(project: &Path) -> Result<PathBuf> {
    let dir = cache_dir(project);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn config_path(project: &Path) -> PathBuf {
    cache_dir(project).join(CONFIG_FILE)
}

pub fn snapshot_path(project: &Path) -> PathBuf {
    cache_dir(project).join(SNAPSHOT_FILE)
}

/// Internal tag file location; one file per fragment so that two indexer
/// instances never share an output file.
pub fn tag_file_path(project: &Path, fragment: FragmentId) -> PathBuf {
    cache_dir(project).join(format!("tags-{}", fragment.0))
}
