//! Top-level workflows tying the engine together.
//!
//! The CLI (or a runner integration) constructs one [`ProjectLayout`] and one
//! [`CacheStore`] and drives these entry points. The fingerprint snapshot is
//! written only by [`record_snapshot`] — callers invoke it after a full,
//! unfiltered test run succeeds, never after a partial one, so un-rerun
//! changes are never masked.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::info;

use crate::config::ProjectLayout;
use crate::errors::SmartTestResult;
use crate::indexer::pipeline::{scan_and_build_graph, BuildStats};
use crate::indexer::test_map::{apply_test_map, map_tests_to_modules};
use crate::models::AffectedSet;
use crate::query::affected::{resolve_affected, resolve_affected_with_coverage};
use crate::query::staleness::is_graph_stale;
use crate::store::cache::CacheStore;
use crate::store::fingerprints::current_snapshot;
use crate::store::remote::{backend_from_env, publish_ast_cache, seed_ast_cache};
use crate::vcs::changed_files_from_git;

/// Rebuild the dependency graph and test mapping and persist them.
///
/// Does not touch the fingerprint snapshot. The remote cache, when
/// configured, pre-seeds the AST parse cache first and receives the updated
/// cache afterwards; its absence or failure only costs speed.
pub fn regenerate(layout: &ProjectLayout, store: &mut CacheStore) -> SmartTestResult<BuildStats> {
    layout.ensure_data_dir()?;

    let backend = backend_from_env();
    if let Some(backend) = &backend {
        seed_ast_cache(store, backend.as_ref());
    }

    let (mut graph, stats) = scan_and_build_graph(layout, store, None, true)?;

    let universe: BTreeSet<String> = graph.modules.keys().cloned().collect();
    let mapping = map_tests_to_modules(layout, &universe);
    apply_test_map(&mut graph, mapping);

    store.set_graph(graph);
    store.save_all(false)?;

    if let Some(backend) = &backend {
        publish_ast_cache(store, backend.as_ref());
    }

    info!("dependency graph and AST cache saved");
    Ok(stats)
}

/// Answer "which tests run now" for changes since `base` (or the staged set).
///
/// A stale graph is rebuilt first; the query itself is read-only against the
/// persisted graph.
pub fn affected(
    layout: &ProjectLayout,
    store: &mut CacheStore,
    base: &str,
    staged: bool,
    with_coverage: bool,
) -> SmartTestResult<AffectedSet> {
    if is_graph_stale(layout, store) {
        info!("dependency graph is stale, regenerating");
        regenerate(layout, store)?;
    }

    let changed: Vec<PathBuf> = changed_files_from_git(layout, store, base, staged);
    info!(count = changed.len(), "changed files");

    let graph = store.graph().clone();
    let result = if with_coverage {
        let coverage = store.coverage().clone();
        resolve_affected_with_coverage(&graph, &changed, layout, &coverage)
    } else {
        resolve_affected(&graph, &changed, layout)
    };
    Ok(result)
}

/// Persist the current fingerprint snapshot as the new baseline.
pub fn record_snapshot(layout: &ProjectLayout, store: &mut CacheStore) -> SmartTestResult<()> {
    layout.ensure_data_dir()?;
    info!("updating file hash snapshot");
    store.set_file_hashes(current_snapshot(layout));
    store.save_all(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
