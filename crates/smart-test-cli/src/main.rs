//! smart-test — affected-test selection for Python projects.
//!
//! Thin CLI over `smart_test_core`: staleness checks, affected-set queries,
//! graph regeneration, and fingerprint snapshots.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use smart_test_core::query::staleness::staleness;
use smart_test_core::{workflow, CacheStore, ProjectLayout, SmartTestResult};

#[derive(Parser, Debug)]
#[command(name = "smart-test", version, about)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".", global = true)]
    repo_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether the dependency graph is stale (exit 0 fresh, 1 stale)
    Stale {
        /// Print the first detected staleness reason
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print affected modules and tests for the current change set
    Affected {
        /// Git base reference to diff against (default: auto-detected branch)
        #[arg(long)]
        base: Option<String>,
        /// Diff staged changes only
        #[arg(long)]
        staged: bool,
        /// Union in coverage-derived tests when a coverage map exists
        #[arg(long)]
        coverage: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Regenerate the dependency graph unconditionally
    Generate,
    /// Record the current fingerprint snapshot (after a full test run)
    Snapshot,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let layout = match ProjectLayout::discover(&cli.repo_root) {
        Ok(layout) => layout,
        Err(e) => {
            error!("failed to discover project layout: {e}");
            return ExitCode::from(2);
        }
    };
    let mut store = CacheStore::new(&layout);

    match run(&cli.command, &layout, &mut store) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

fn run(
    command: &Command,
    layout: &ProjectLayout,
    store: &mut CacheStore,
) -> SmartTestResult<ExitCode> {
    match command {
        Command::Stale { verbose } => match staleness(layout, store) {
            Some(reason) => {
                if *verbose {
                    println!("stale: {reason}");
                }
                Ok(ExitCode::from(1))
            }
            None => {
                if *verbose {
                    println!("graph is up to date");
                }
                Ok(ExitCode::SUCCESS)
            }
        },

        Command::Affected {
            base,
            staged,
            coverage,
            json,
        } => {
            let base = base.as_deref().unwrap_or(&layout.default_branch);
            let result = workflow::affected(layout, store, base, *staged, *coverage)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                info!(
                    modules = result.affected_modules.len(),
                    tests = result.tests.len(),
                    "affected set resolved"
                );
                for test in &result.tests {
                    println!("{test}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Generate => {
            let stats = workflow::regenerate(layout, store)?;
            info!(
                files = stats.files_seen,
                hits = stats.cache_hits,
                misses = stats.cache_misses,
                "dependency graph regenerated"
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::Snapshot => {
            workflow::record_snapshot(layout, store)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
