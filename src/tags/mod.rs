//! Tag tool invocation and tag file ingestion.
//!
//! The tool is run as a subprocess that writes a tag file; only that file
//! is read back. Records are materialized one at a time, each under its
//! own write lock, so a failing run keeps what it already stored and
//! readers are never blocked for a whole file.

pub mod materialize;
pub mod parser;

pub use materialize::{CMaterializer, CppMaterializer, Materialized, Materializer, materializer_for};
pub use parser::{parse_signature, parse_tag_line, parse_type_text, parse_typeref};

use crate::config::TagIndexerConfig;
use crate::error::{IndexError, Result};
use crate::fragment::{IndexFragment, TagFragment};
use crate::types::FragmentId;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Interval between checks on a running tool when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Counters for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Records parsed from the tag file
    pub records: usize,
    pub created: usize,
    pub reused: usize,
    /// Records outside the requested file
    pub skipped: usize,
}

impl RunStats {
    pub fn absorb(&mut self, other: RunStats) {
        self.records += other.records;
        self.created += other.created;
        self.reused += other.reused;
        self.skipped += other.skipped;
    }
}

/// Runs the tag tool over a source root or file and stores the result.
#[derive(Debug, Clone)]
pub struct TagRunner {
    command: PathBuf,
    tag_file: PathBuf,
    timeout: Option<Duration>,
}

impl TagRunner {
    pub fn new(command: impl Into<PathBuf>, tag_file: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            tag_file: tag_file.into(),
            timeout: None,
        }
    }

    /// Runner for one fragment of a project, as configured.
    pub fn from_config(config: &TagIndexerConfig, project: &Path, fragment: FragmentId) -> Self {
        Self::new(
            config.resolve_command(),
            config.resolve_tag_file(project, fragment),
        )
        .with_timeout(config.tool_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn tag_file(&self) -> &Path {
        &self.tag_file
    }

    /// Fixed tool arguments followed by the target.
    pub fn arguments(&self, target: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--excmd=number",
            "--format=2",
            "--sort=no",
            "--fields=aiKlmnsSzt",
            "--c-kinds=+px",
            "--c++-kinds=+px",
            "-R",
            "-f",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(self.tag_file.clone().into_os_string());
        args.push(target.as_os_str().to_os_string());
        args
    }

    /// Extract `target` (a source root, or a single file) into the fragment.
    ///
    /// For a single file only records located in that file are stored.
    pub fn run(&self, fragment: &TagFragment, target: &Path) -> Result<RunStats> {
        let target = absolute(target)?;
        if let Err(err) = self.invoke(&target) {
            tracing::warn!("Tag extraction of {} aborted: {}", target.display(), err);
            return Err(err);
        }

        let only_file = target.is_file().then_some(target.as_path());
        let stats = index_tag_file(fragment, &self.tag_file, only_file)?;
        tracing::info!(
            "Indexed {} into {}: {} records, {} new bindings, {} updated",
            target.display(),
            fragment.id(),
            stats.records,
            stats.created,
            stats.reused
        );
        Ok(stats)
    }

    /// Launch the tool and wait for it. A stale tag file is removed first
    /// so a tool that writes nothing yields no records.
    pub fn invoke(&self, target: &Path) -> Result<()> {
        if let Some(parent) = self.tag_file.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::remove_file(&self.tag_file) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            "Running {} on {}",
            self.command.display(),
            target.display()
        );
        let mut child = Command::new(&self.command)
            .args(self.arguments(target))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => match wait_with_deadline(&mut child, limit)? {
                Some(status) => status,
                None => {
                    return Err(IndexError::ToolTimeout {
                        command: self.command.display().to_string(),
                        secs: limit.as_secs(),
                    });
                }
            },
        };

        if !status.success() {
            return Err(IndexError::TagTool {
                command: self.command.display().to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Poll the child until it exits or the deadline passes; on timeout the
/// child is killed and reaped and `None` is returned.
fn wait_with_deadline(
    child: &mut std::process::Child,
    limit: Duration,
) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            if let Err(err) = child.kill() {
                tracing::warn!("Failed to kill tag tool: {}", err);
            }
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Ingest an existing tag file.
pub fn index_tag_file(fragment: &TagFragment, path: &Path, only_file: Option<&Path>) -> Result<RunStats> {
    let file = File::open(path)?;
    index_tags(fragment, BufReader::new(file), only_file)
}

/// Ingest tag lines from a reader. Stops at the first read or storage
/// error; records stored before it stay.
pub fn index_tags<R: BufRead>(fragment: &TagFragment, reader: R, only_file: Option<&Path>) -> Result<RunStats> {
    let mut stats = RunStats::default();
    for line in reader.lines() {
        let line = line?;
        let Some(record) = parse_tag_line(&line) else {
            continue;
        };
        stats.records += 1;
        if only_file.is_some_and(|file| record.file != file) {
            stats.skipped += 1;
            continue;
        }

        let mut writer = fragment.write()?;
        match materializer_for(&record).materialize(&mut writer, &record) {
            Ok(Materialized::Created(_)) => stats.created += 1,
            Ok(Materialized::Reused(_)) => stats.reused += 1,
            Err(err) => {
                tracing::warn!(
                    "Failed to store `{}` from {}: {}",
                    record.element_name,
                    record.file.display(),
                    err
                );
                return Err(err);
            }
        }
    }
    Ok(stats)
}
