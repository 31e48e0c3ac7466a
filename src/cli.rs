//! tagindex - CLI for the cross-fragment symbol index
//!
//! # Usage
//!
//! ```bash
//! # Index a project's source roots (defaults to the project directory)
//! tagindex --project /path/to/project index --root src --root include
//!
//! # Look a symbol up in the project plus dependency snapshots
//! tagindex --project /path/to/project lookup open --with /deps/libc/.tagindex/fragment.bin
//!
//! # Keep the index current while editing
//! tagindex --project /path/to/project watch
//!
//! # Use a specific ctags binary with a 60s limit
//! tagindex config --tool /opt/ctags/bin/ctags --timeout 60
//! ```
//!
//! `--json` switches every command to machine-readable output. Errors go to
//! stderr, results to stdout. Exit codes: 0 = success, 1 = error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tagindex::cache::snapshot_path;
use tagindex::watcher::DEFAULT_DEBOUNCE_MS;
use tagindex::{
    CancelFlag, CompositeIndex, FragmentFormat, FragmentId, IncrementalIndexer, IndexFragment,
    ReindexOutcome, TagFragment, TagIndexerConfig, TagRunner, UnitFilter, WorkspaceWatcher,
    load_snapshot, save_snapshot,
};

/// Fragment holding the project's own sources; dependency snapshots are
/// numbered from 1.
const PROJECT_FRAGMENT: FragmentId = FragmentId(0);

#[derive(Parser)]
#[command(name = "tagindex")]
#[command(version)]
#[command(about = "Cross-fragment symbol index for C and C++ sources")]
#[command(long_about = r#"
tagindex indexes C/C++ sources with ctags and answers symbol lookups
across the project and any number of dependency snapshots, merging
equivalent symbols into one result.

Use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory; the index lives in its .tagindex directory
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the project index from scratch
    Index {
        /// Source roots, relative to the project (default: the project itself)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,
    },

    /// Find bindings by name across the project and dependency snapshots
    Lookup {
        /// Simple name to look up
        name: String,

        /// Dependency snapshot to include (repeatable)
        #[arg(long = "with")]
        snapshots: Vec<PathBuf>,
    },

    /// Index, then follow source changes until interrupted
    Watch {
        /// Source roots, relative to the project (default: the project itself)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,
    },

    /// Show or update tag tool preferences
    Config {
        /// Tag tool executable instead of `ctags` on PATH
        #[arg(long)]
        tool: Option<PathBuf>,

        /// External tag file instead of the per-fragment internal one
        #[arg(long)]
        tag_file: Option<PathBuf>,

        /// Kill the tag tool after this many seconds (0 disables)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only to stderr to keep stdout clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let project = cli.project.canonicalize().unwrap_or_else(|_| cli.project.clone());

    match run_command(&cli, &project).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({
                    "error": format!("{:#}", e)
                });
                eprintln!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

async fn run_command(cli: &Cli, project: &Path) -> Result<Output> {
    match &cli.command {
        Commands::Index { roots } => {
            let roots = resolve_roots(project, roots)?;
            let (indexer, fragment) = start_indexer(project)?;
            let outcome = reindex(&indexer, &roots).await?;
            indexer.shutdown().await;

            let snapshot = snapshot_path(project);
            save_snapshot(&fragment, &snapshot).context("Failed to save index")?;

            let (records, failed_roots) = match outcome {
                ReindexOutcome::Completed { failed, stats, .. } => (stats.records, failed),
                ReindexOutcome::Cancelled { .. } => (0, 0),
            };
            Ok(Output::Index {
                roots: roots.iter().map(|r| r.display().to_string()).collect(),
                bindings: fragment.binding_count(),
                records,
                failed_roots,
                snapshot: snapshot.display().to_string(),
            })
        }

        Commands::Lookup { name, snapshots } => {
            let index = CompositeIndex::new();
            let own = snapshot_path(project);
            let fragment = load_snapshot(&own, PROJECT_FRAGMENT, FragmentFormat::Tags)
                .with_context(|| format!("No index at {}; run `tagindex index` first", own.display()))?;
            index.attach(Arc::new(fragment));
            for (i, path) in snapshots.iter().enumerate() {
                let id = FragmentId(i as u32 + 1);
                let fragment = load_snapshot(path, id, FragmentFormat::Snapshot)
                    .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
                index.attach(Arc::new(fragment));
            }

            let results = index.query(|factory| {
                factory.find_bindings(name).map(|found| {
                    found
                        .iter()
                        .map(|binding| LookupResult {
                            name: binding.qualified_name().join("::"),
                            kind: binding.kind().as_str().to_string(),
                            linkage: binding.linkage().as_str().to_string(),
                            ty: binding.ty().map(|t| t.to_string()),
                            fragments: binding
                                .equivalents()
                                .iter()
                                .map(|e| e.fragment.to_string())
                                .collect(),
                            locations: binding
                                .names()
                                .into_iter()
                                .map(|n| LocationResult {
                                    file: n.file.display().to_string(),
                                    line: n.line + 1,
                                    definition: n.is_definition,
                                })
                                .collect(),
                        })
                        .collect::<Vec<_>>()
                })
            })?;

            Ok(Output::Lookup {
                query: name.clone(),
                fragments: index.fragment_count(),
                results,
            })
        }

        Commands::Watch { roots } => {
            let roots = resolve_roots(project, roots)?;
            let (indexer, fragment) = start_indexer(project)?;
            reindex(&indexer, &roots).await?;
            tracing::info!("Initial index: {} bindings", fragment.binding_count());

            let watcher = WorkspaceWatcher::new(
                roots.clone(),
                UnitFilter::new()?,
                Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            )?;
            let stop = CancelFlag::new();
            {
                let stop = stop.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        stop.cancel();
                    }
                });
            }

            let mut units_updated = 0;
            while !stop.is_cancelled() {
                let batch = tokio::task::block_in_place(|| {
                    watcher.next_deltas(Duration::from_millis(250), &*fragment)
                });
                for delta in batch.into_iter().flatten() {
                    let report = indexer.submit_delta(fragment.id(), delta)?.wait().await?;
                    units_updated += report.applied;
                }
            }
            indexer.shutdown().await;
            save_snapshot(&fragment, &snapshot_path(project)).context("Failed to save index")?;

            Ok(Output::Watch {
                roots: roots.iter().map(|r| r.display().to_string()).collect(),
                units_updated,
                bindings: fragment.binding_count(),
            })
        }

        Commands::Config {
            tool,
            tag_file,
            timeout,
        } => {
            let mut config = TagIndexerConfig::load(project).context("Failed to load preferences")?;
            let changed = tool.is_some() || tag_file.is_some() || timeout.is_some();
            if let Some(tool) = tool {
                config.use_tool_on_path = false;
                config.tool_command = Some(tool.clone());
            }
            if let Some(tag_file) = tag_file {
                config.use_internal_tag_file = false;
                config.tag_file = Some(tag_file.clone());
            }
            if let Some(secs) = timeout {
                config.tool_timeout_secs = (*secs > 0).then_some(*secs);
            }
            if changed {
                config.save(project).context("Failed to save preferences")?;
            }

            Ok(Output::Config {
                command: config.resolve_command().display().to_string(),
                tag_file: config
                    .resolve_tag_file(project, PROJECT_FRAGMENT)
                    .display()
                    .to_string(),
                timeout_secs: config.tool_timeout_secs,
                saved: changed,
            })
        }
    }
}

fn resolve_roots(project: &Path, roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        return Ok(vec![project.to_path_buf()]);
    }
    roots
        .iter()
        .map(|root| {
            let path = project.join(root);
            path.canonicalize()
                .with_context(|| format!("Source root {} not found", path.display()))
        })
        .collect()
}

/// Fresh project fragment with a background worker, configured from the
/// project's saved preferences.
fn start_indexer(project: &Path) -> Result<(IncrementalIndexer, Arc<TagFragment>)> {
    let config = TagIndexerConfig::load(project).context("Failed to load preferences")?;
    let fragment = Arc::new(TagFragment::new(PROJECT_FRAGMENT));
    let indexer = IncrementalIndexer::new(UnitFilter::new()?);
    indexer.register(
        fragment.clone(),
        TagRunner::from_config(&config, project, PROJECT_FRAGMENT),
    );
    Ok((indexer, fragment))
}

async fn reindex(indexer: &IncrementalIndexer, roots: &[PathBuf]) -> Result<ReindexOutcome> {
    let handle = indexer.reindex(PROJECT_FRAGMENT, roots.to_vec())?;
    Ok(handle.job.wait().await?)
}

#[derive(serde::Serialize)]
#[serde(tag = "type")]
enum Output {
    Index {
        roots: Vec<String>,
        bindings: usize,
        records: usize,
        failed_roots: usize,
        snapshot: String,
    },
    Lookup {
        query: String,
        fragments: usize,
        results: Vec<LookupResult>,
    },
    Watch {
        roots: Vec<String>,
        units_updated: usize,
        bindings: usize,
    },
    Config {
        command: String,
        tag_file: String,
        timeout_secs: Option<u64>,
        saved: bool,
    },
}

#[derive(serde::Serialize)]
struct LookupResult {
    name: String,
    kind: String,
    linkage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ty: Option<String>,
    fragments: Vec<String>,
    locations: Vec<LocationResult>,
}

#[derive(serde::Serialize)]
struct LocationResult {
    file: String,
    /// One-based, 0 when unknown
    line: i64,
    definition: bool,
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Index {
            roots,
            bindings,
            records,
            failed_roots,
            snapshot,
        } => {
            println!("Indexed {} roots: {} records, {} bindings", roots.len(), records, bindings);
            if *failed_roots > 0 {
                println!("{} roots failed (see log)", failed_roots);
            }
            println!("Snapshot: {}", snapshot);
        }
        Output::Lookup {
            query,
            fragments,
            results,
        } => {
            println!("Lookup: \"{}\" across {} fragments", query, fragments);
            println!("Found {} bindings:", results.len());
            for r in results {
                match &r.ty {
                    Some(ty) => println!("  {} ({}, {}): {}", r.name, r.kind, r.linkage, ty),
                    None => println!("  {} ({}, {})", r.name, r.kind, r.linkage),
                }
                for loc in &r.locations {
                    let role = if loc.definition { "definition" } else { "declaration" };
                    println!("    {}:{} {}", loc.file, loc.line, role);
                }
            }
        }
        Output::Watch {
            roots,
            units_updated,
            bindings,
        } => {
            println!(
                "Watched {} roots: {} units updated, {} bindings",
                roots.len(),
                units_updated,
                bindings
            );
        }
        Output::Config {
            command,
            tag_file,
            timeout_secs,
            saved,
        } => {
            println!("Tag tool: {}", command);
            println!("Tag file: {}", tag_file);
            match timeout_secs {
                Some(secs) => println!("Timeout:  {}s", secs),
                None => println!("Timeout:  none"),
            }
            if *saved {
                println!("Preferences saved");
            }
        }
    }
}
