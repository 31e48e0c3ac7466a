//! Persisted tag indexer preferences.
//!
//! Preferences are read once when a fragment is attached. Changing them
//! takes effect on the next attach.

use crate::cache::{config_path, ensure_cache_dir, tag_file_path};
use crate::error::Result;
use crate::types::FragmentId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable looked up on `PATH` when no explicit command is configured.
pub const DEFAULT_TOOL: &str = "ctags";

/// Tag tool preferences for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndexerConfig {
    /// Use the tag tool found on the system path
    #[serde(default = "default_true")]
    pub use_tool_on_path: bool,

    /// Explicit tag tool executable, used when `use_tool_on_path` is off
    #[serde(default)]
    pub tool_command: Option<PathBuf>,

    /// Keep the tag file in the cache directory
    #[serde(default = "default_true")]
    pub use_internal_tag_file: bool,

    /// External tag file location, used when `use_internal_tag_file` is off
    #[serde(default)]
    pub tag_file: Option<PathBuf>,

    /// Kill the tag tool after this many seconds. `None` waits forever.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for TagIndexerConfig {
    fn default() -> Self {
        Self {
            use_tool_on_path: true,
            tool_command: None,
            use_internal_tag_file: true,
            tag_file: None,
            tool_timeout_secs: None,
        }
    }
}

impl TagIndexerConfig {
    /// Load preferences for a project, falling back to defaults when none
    /// were saved.
    pub fn load(project: &Path) -> Result<Self> {
        let path = config_path(project);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, project: &Path) -> Result<()> {
        ensure_cache_dir(project)?;
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(config_path(project), data)?;
        Ok(())
    }

    /// The executable to launch.
    pub fn resolve_command(&self) -> PathBuf {
        match (&self.tool_command, self.use_tool_on_path) {
            (Some(command), false) => command.clone(),
            _ => PathBuf::from(DEFAULT_TOOL),
        }
    }

    /// Where the tag tool writes its output for the given fragment.
    pub fn resolve_tag_file(&self, project: &Path, fragment: FragmentId) -> PathBuf {
        match (&self.tag_file, self.use_internal_tag_file) {
            (Some(path), false) => path.clone(),
            _ => tag_file_path(project, fragment),
        }
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}
