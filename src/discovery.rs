//! Translation unit discovery.
//!
//! Decides which files the indexer treats as C/C++ translation units and
//! walks source roots for them, respecting .gitignore rules.

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Matches C/C++ sources and headers, minus excluded directories.
#[derive(Debug, Clone)]
pub struct UnitFilter {
    units: GlobSet,
    excludes: GlobSet,
}

impl UnitFilter {
    /// C/C++ extensions with the default excludes.
    pub fn new() -> Result<Self> {
        Self::with_patterns(default_unit_patterns(), default_exclude_patterns())
    }

    pub fn with_patterns<'a>(
        units: impl IntoIterator<Item = &'a str>,
        excludes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        Ok(Self {
            units: build_globset(units)?,
            excludes: build_globset(excludes)?,
        })
    }

    /// Whether `path` names a translation unit. Works on paths that no
    /// longer exist.
    pub fn is_unit(&self, path: &Path) -> bool {
        self.units.is_match(path) && !self.excludes.is_match(path)
    }

    /// All translation units under `root`.
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .build();

        walker
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .map(|e| e.into_path())
            .filter(|path| self.is_unit(path))
            .collect()
    }
}

fn default_unit_patterns() -> Vec<&'static str> {
    vec![
        "**/*.c", "**/*.h", "**/*.cc", "**/*.cpp", "**/*.cxx", "**/*.c++", "**/*.hh", "**/*.hpp",
        "**/*.hxx", "**/*.h++", "**/*.inl",
    ]
}

fn default_exclude_patterns() -> Vec<&'static str> {
    vec![
        "**/.git/**",
        "**/.tagindex/**",
        "**/build/**",
        "**/out/**",
        "**/CMakeFiles/**",
    ]
}

fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
