//! Dependency graph construction.
//!
//! A full first pass over the source tree establishes the module-name
//! universe (import resolution needs the complete universe before any single
//! file can be resolved), then each file is parsed or served from the AST
//! parse cache, and finally the `imported_by` relation is rebuilt by a full
//! inversion pass.
//!
//! Parallel parsing is disabled: process overhead benchmarks slower than the
//! parse itself at typical project sizes. Incremental caching is what keeps
//! rebuild cost proportional to the number of changed files.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::config::ProjectLayout;
use crate::errors::SmartTestResult;
use crate::indexer::filesystem::{iter_py_files, module_name_of, repo_relative};
use crate::indexer::imports::{extract_import_candidates, resolve_candidates, ImportExtraction};
use crate::models::{AstCacheEntry, DependencyGraph, Module};
use crate::store::cache::CacheStore;
use crate::store::fingerprints::compute_file_hash;

/// Counters from one graph build.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildStats {
    pub files_seen: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub syntax_errors: usize,
}

/// Build the dependency graph for the project's source tree.
///
/// `changed_files` (repo-relative paths) enables incremental mode: files
/// outside the set may be served from the AST parse cache. `use_cache =
/// false` forces a full re-parse and leaves the cache untouched.
///
/// A file that cannot be read or parsed contributes zero imports and never
/// aborts the build; an empty source tree yields an empty graph.
pub fn scan_and_build_graph(
    layout: &ProjectLayout,
    store: &mut CacheStore,
    changed_files: Option<&HashSet<PathBuf>>,
    use_cache: bool,
) -> SmartTestResult<(DependencyGraph, BuildStats)> {
    info!(src_root = %layout.src_root.display(), "scanning modules");

    let files = iter_py_files(&layout.src_root);
    let mut stats = BuildStats {
        files_seen: files.len(),
        ..Default::default()
    };

    // First pass: the complete module universe.
    let mut universe: BTreeSet<String> = BTreeSet::new();
    for file in &files {
        match module_name_of(file, &layout.src_root) {
            Ok(name) => {
                universe.insert(name);
            }
            Err(e) => warn!(file = %file.display(), "skipping file outside source root: {e}"),
        }
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    // Second pass: per-file imports, cached where possible.
    let mut graph = DependencyGraph::default();
    for file in &files {
        let mod_name = match module_name_of(file, &layout.src_root) {
            Ok(name) => name,
            Err(_) => continue,
        };
        let rel_path = repo_relative(file, &layout.repo_root);

        let current_hash = match compute_file_hash(file) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %rel_path, "failed to hash file, treating as import-free: {e}");
                graph.modules.insert(mod_name, empty_module(&rel_path));
                continue;
            }
        };

        let unchanged = changed_files
            .map(|set| !set.contains(&PathBuf::from(&rel_path)))
            .unwrap_or(true);
        if use_cache && unchanged {
            if let Some(entry) = store.ast_cache().get(&rel_path) {
                if entry.hash == current_hash && entry.module_name == mod_name {
                    graph.modules.insert(
                        mod_name,
                        Module {
                            imports: entry.imports.clone(),
                            file: rel_path,
                            ..Default::default()
                        },
                    );
                    stats.cache_hits += 1;
                    continue;
                }
            }
        }
        stats.cache_misses += 1;

        let source = match std::fs::read_to_string(file) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %rel_path, "failed to read file, treating as import-free: {e}");
                graph.modules.insert(mod_name, empty_module(&rel_path));
                continue;
            }
        };

        let imports = match extract_import_candidates(&source, &mod_name)? {
            ImportExtraction::Imports(candidates) => resolve_candidates(&candidates, &universe),
            ImportExtraction::SyntaxError { line, column } => {
                warn!(path = %rel_path, "syntax error at {line}:{column}, treating as import-free");
                stats.syntax_errors += 1;
                graph.modules.insert(mod_name, empty_module(&rel_path));
                continue;
            }
        };

        if use_cache {
            store.update_ast_entry(
                &rel_path,
                AstCacheEntry {
                    hash: current_hash,
                    module_name: mod_name.clone(),
                    imports: imports.clone(),
                    timestamp,
                },
            );
        }

        graph.modules.insert(
            mod_name,
            Module {
                imports,
                file: rel_path,
                ..Default::default()
            },
        );
    }

    invert_imports(&mut graph);

    let attempts = stats.cache_hits + stats.cache_misses;
    if attempts > 0 {
        let hit_rate = stats.cache_hits as f64 / attempts as f64 * 100.0;
        info!(
            hits = stats.cache_hits,
            misses = stats.cache_misses,
            "AST cache: {hit_rate:.1}% hit rate"
        );
    }
    debug!(modules = graph.modules.len(), "graph build complete");

    Ok((graph, stats))
}

fn empty_module(rel_path: &str) -> Module {
    Module {
        imports: Vec::new(),
        file: rel_path.to_string(),
        ..Default::default()
    }
}

/// Rebuild `imported_by` across the whole graph from the `imports` relation.
/// Runs after all imports are known; partial inversion is never valid.
fn invert_imports(graph: &mut DependencyGraph) {
    for module in graph.modules.values_mut() {
        module.imported_by.clear();
    }
    let edges: Vec<(String, String)> = graph
        .modules
        .iter()
        .flat_map(|(name, module)| {
            module
                .imports
                .iter()
                .map(move |dep| (dep.clone(), name.clone()))
        })
        .collect();
    for (target, source) in edges {
        if let Some(module) = graph.modules.get_mut(&target) {
            module.imported_by.push(source);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
    }

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, ProjectLayout) {
        let tmp = tempfile::tempdir().unwrap();
        for (rel, contents) in files {
            write(tmp.path(), rel, contents);
        }
        let layout = ProjectLayout {
            repo_root: tmp.path().to_path_buf(),
            src_root: tmp.path().join("src"),
            test_root: tmp.path().join("tests"),
            packages: vec!["pkg".to_string()],
            default_branch: "main".to_string(),
        };
        (tmp, layout)
    }

    fn chain_project() -> (tempfile::TempDir, ProjectLayout) {
        project(&[
            ("src/pkg/__init__.py", ""),
            ("src/pkg/a.py", "X = 1\n"),
            ("src/pkg/b.py", "from pkg.a import X\n"),
            ("src/pkg/c.py", "import pkg.b\n"),
        ])
    }

    #[test]
    fn test_build_chain_graph() {
        let (_tmp, layout) = chain_project();
        let mut store = CacheStore::new(&layout);
        let (graph, stats) = scan_and_build_graph(&layout, &mut store, None, true).unwrap();

        assert_eq!(stats.files_seen, 4);
        assert_eq!(graph.modules["pkg.b"].imports, vec!["pkg.a"]);
        assert_eq!(graph.modules["pkg.c"].imports, vec!["pkg.b"]);
        assert_eq!(graph.modules["pkg.a"].imported_by, vec!["pkg.b"]);
        assert_eq!(graph.modules["pkg.b"].imported_by, vec!["pkg.c"]);
        assert!(graph.modules["pkg.c"].imported_by.is_empty());
        assert_eq!(graph.modules["pkg.a"].file, "src/pkg/a.py");
    }

    #[test]
    fn test_inversion_invariant_holds() {
        let (_tmp, layout) = chain_project();
        let mut store = CacheStore::new(&layout);
        let (graph, _) = scan_and_build_graph(&layout, &mut store, None, true).unwrap();

        for (name, module) in &graph.modules {
            for dep in &module.imports {
                if let Some(target) = graph.modules.get(dep) {
                    assert!(
                        target.imported_by.contains(name),
                        "{name} imports {dep} but is missing from its imported_by"
                    );
                }
            }
            for importer in &module.imported_by {
                assert!(graph.modules[importer].imports.contains(name));
            }
        }
    }

    #[test]
    fn test_empty_tree_yields_empty_graph() {
        let (_tmp, layout) = project(&[]);
        let mut store = CacheStore::new(&layout);
        let (graph, stats) = scan_and_build_graph(&layout, &mut store, None, true).unwrap();
        assert!(graph.is_empty());
        assert_eq!(stats.files_seen, 0);
    }

    #[test]
    fn test_syntax_error_contributes_no_imports() {
        let (_tmp, layout) = project(&[
            ("src/pkg/__init__.py", ""),
            ("src/pkg/good.py", "from pkg.broken import oops\n"),
            ("src/pkg/broken.py", "def oops(:\n    pass\n"),
        ]);
        let mut store = CacheStore::new(&layout);
        let (graph, stats) = scan_and_build_graph(&layout, &mut store, None, true).unwrap();

        assert_eq!(stats.syntax_errors, 1);
        assert!(graph.modules["pkg.broken"].imports.is_empty());
        // The rest of the build is unaffected.
        assert_eq!(graph.modules["pkg.good"].imports, vec!["pkg.broken"]);
    }

    #[test]
    fn test_incremental_build_reuses_cache() {
        let (tmp, layout) = chain_project();
        let mut store = CacheStore::new(&layout);
        let (_, first) = scan_and_build_graph(&layout, &mut store, None, true).unwrap();
        assert_eq!(first.cache_hits, 0);
        assert_eq!(first.cache_misses, 4);

        write(tmp.path(), "src/pkg/c.py", "import pkg.a\n");
        let changed: HashSet<PathBuf> = [PathBuf::from("src/pkg/c.py")].into_iter().collect();
        let (graph, second) =
            scan_and_build_graph(&layout, &mut store, Some(&changed), true).unwrap();

        assert_eq!(second.cache_hits, 3);
        assert_eq!(second.cache_misses, 1);
        assert_eq!(graph.modules["pkg.c"].imports, vec!["pkg.a"]);
        // Inversion reflects the new edge set.
        assert_eq!(graph.modules["pkg.a"].imported_by, vec!["pkg.b", "pkg.c"]);
        assert!(graph.modules["pkg.b"].imported_by.is_empty());
    }

    #[test]
    fn test_cache_hit_matches_full_reparse() {
        let (_tmp, layout) = chain_project();

        let mut cached_store = CacheStore::new(&layout);
        scan_and_build_graph(&layout, &mut cached_store, None, true).unwrap();
        let changed = HashSet::new();
        let (from_cache, stats) =
            scan_and_build_graph(&layout, &mut cached_store, Some(&changed), true).unwrap();
        assert_eq!(stats.cache_hits, 4);

        let mut cold_store = CacheStore::new(&layout);
        let (from_parse, _) =
            scan_and_build_graph(&layout, &mut cold_store, None, false).unwrap();

        assert_eq!(from_cache, from_parse);
    }

    #[test]
    fn test_stale_module_name_misses_cache() {
        let (_tmp, layout) = chain_project();
        let mut store = CacheStore::new(&layout);
        scan_and_build_graph(&layout, &mut store, None, true).unwrap();

        // Same content hash, different recorded module name: the entry must
        // not be reused (a file moved without content change).
        let mut entry = store.ast_cache().get("src/pkg/a.py").unwrap().clone();
        entry.module_name = "pkg.moved".to_string();
        entry.imports = vec!["pkg.bogus".to_string()];
        store.update_ast_entry("src/pkg/a.py", entry);

        let changed = HashSet::new();
        let (graph, stats) =
            scan_and_build_graph(&layout, &mut store, Some(&changed), true).unwrap();
        assert_eq!(stats.cache_misses, 1);
        assert!(graph.modules["pkg.a"].imports.is_empty());
    }

    #[test]
    fn test_no_cache_mode_leaves_cache_untouched() {
        let (_tmp, layout) = chain_project();
        let mut store = CacheStore::new(&layout);
        scan_and_build_graph(&layout, &mut store, None, false).unwrap();
        assert!(store.ast_cache().is_empty());
    }
}
