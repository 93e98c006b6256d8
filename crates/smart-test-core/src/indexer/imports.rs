//! Static import extraction and resolution for Python sources.
//!
//! Extraction walks the tree-sitter CST for `import` / `from ... import`
//! statements anywhere in the file (module level or nested). Resolution
//! restricts the extracted candidates to the project's module universe.

use std::collections::BTreeSet;

use tree_sitter::Node;

use crate::errors::{SmartTestError, SmartTestResult};

/// Result of extracting import candidates from one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportExtraction {
    /// Candidate module names, pre-resolution. Deduplicated by the set.
    Imports(BTreeSet<String>),
    /// The file does not parse. Position of the first error, 1-based line.
    SyntaxError { line: usize, column: usize },
}

/// Parse `source` and collect its import candidates.
///
/// A file containing a syntax error contributes no imports; the caller logs
/// the position and moves on. Only parser construction itself is an error.
pub fn extract_import_candidates(
    source: &str,
    current_module: &str,
) -> SmartTestResult<ImportExtraction> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SmartTestError::Parse(format!("failed to load Python grammar: {e}")))?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| SmartTestError::Parse("parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let point = first_error_position(root);
        return Ok(ImportExtraction::SyntaxError {
            line: point.row + 1,
            column: point.column,
        });
    }

    let mut candidates = BTreeSet::new();
    collect_imports(root, source, current_module, &mut candidates);
    Ok(ImportExtraction::Imports(candidates))
}

/// Resolve a relative import: drop the last `level` components of the current
/// module's dotted name, then append the target submodule if present.
///
/// Returns `None` when `level` exceeds the component count — no module can be
/// inferred for such an import.
pub fn resolve_relative(
    current_module: &str,
    level: usize,
    submodule: Option<&str>,
) -> Option<String> {
    let parts: Vec<&str> = if current_module.is_empty() {
        Vec::new()
    } else {
        current_module.split('.').collect()
    };
    if parts.len() < level {
        return None;
    }

    let base = parts[..parts.len() - level].join(".");
    match submodule {
        Some(m) if base.is_empty() => Some(m.to_string()),
        Some(m) => Some(format!("{base}.{m}")),
        None => Some(base),
    }
}

/// Filter candidates against the module universe: exact match first, then
/// longest-prefix match (`pkg.mod.Symbol` resolves to `pkg.mod` when only the
/// latter is a module). Unmatched candidates are external and dropped.
/// Output is deduplicated and sorted.
pub fn resolve_candidates(
    candidates: &BTreeSet<String>,
    universe: &BTreeSet<String>,
) -> Vec<String> {
    let mut resolved: BTreeSet<String> = BTreeSet::new();
    for candidate in candidates {
        if universe.contains(candidate) {
            resolved.insert(candidate.clone());
            continue;
        }
        let parts: Vec<&str> = candidate.split('.').collect();
        for i in (1..=parts.len()).rev() {
            let prefix = parts[..i].join(".");
            if universe.contains(&prefix) {
                resolved.insert(prefix);
                break;
            }
        }
    }
    resolved.into_iter().collect()
}

fn first_error_position(node: Node) -> tree_sitter::Point {
    if node.is_error() || node.is_missing() {
        return node.start_position();
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            return first_error_position(child);
        }
    }
    node.start_position()
}

fn collect_imports(node: Node, source: &str, current_module: &str, out: &mut BTreeSet<String>) {
    match node.kind() {
        "import_statement" => visit_import(node, source, out),
        "import_from_statement" => visit_import_from(node, source, current_module, out),
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, current_module, out);
    }
}

/// `import a.b.c` / `import a.b as x`: each dotted name is a candidate,
/// recorded verbatim.
fn visit_import(node: Node, source: &str, out: &mut BTreeSet<String>) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let dotted = match name.kind() {
            "dotted_name" => Some(name),
            "aliased_import" => name.child_by_field_name("name"),
            _ => None,
        };
        if let Some(dotted) = dotted {
            if let Ok(text) = dotted.utf8_text(source.as_bytes()) {
                out.insert(text.to_string());
            }
        }
    }
}

/// `from X import ...`: the module part `X` is the candidate. For relative
/// imports the dot level is resolved against the current module's name; an
/// unresolvable or empty result is silently dropped.
fn visit_import_from(node: Node, source: &str, current_module: &str, out: &mut BTreeSet<String>) {
    let module_name = match node.child_by_field_name("module_name") {
        Some(n) => n,
        None => return,
    };

    match module_name.kind() {
        "dotted_name" => {
            if let Ok(text) = module_name.utf8_text(source.as_bytes()) {
                out.insert(text.to_string());
            }
        }
        "relative_import" => {
            let mut level = 0usize;
            let mut submodule = None;
            let mut cursor = module_name.walk();
            for child in module_name.children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => {
                        if let Ok(text) = child.utf8_text(source.as_bytes()) {
                            level += text.chars().filter(|&c| c == '.').count();
                        }
                    }
                    "dotted_name" => {
                        submodule = child.utf8_text(source.as_bytes()).ok();
                    }
                    _ => {}
                }
            }
            if let Some(resolved) = resolve_relative(current_module, level, submodule) {
                if !resolved.is_empty() {
                    out.insert(resolved);
                }
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str, current_module: &str) -> BTreeSet<String> {
        match extract_import_candidates(source, current_module).unwrap() {
            ImportExtraction::Imports(set) => set,
            ImportExtraction::SyntaxError { line, column } => {
                panic!("unexpected syntax error at {line}:{column}")
            }
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // -- Relative resolution --------------------------------------------------

    #[test]
    fn test_resolve_relative_with_submodule() {
        assert_eq!(
            resolve_relative("pkg.sub.mod", 1, Some("x")),
            Some("pkg.sub.x".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_without_submodule() {
        assert_eq!(
            resolve_relative("pkg.sub.mod", 1, None),
            Some("pkg.sub".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_level_two() {
        assert_eq!(
            resolve_relative("pkg.sub.mod", 2, Some("other")),
            Some("pkg.other".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_level_exceeds_depth() {
        assert_eq!(resolve_relative("pkg", 2, Some("x")), None);
        assert_eq!(resolve_relative("", 1, None), None);
    }

    #[test]
    fn test_resolve_relative_base_empty_with_submodule() {
        assert_eq!(resolve_relative("pkg", 1, Some("x")), Some("x".to_string()));
    }

    // -- Extraction -----------------------------------------------------------

    #[test]
    fn test_extract_absolute_imports() {
        let src = "import os\nimport pkg.sub\nfrom pkg.mod import Symbol\n";
        assert_eq!(extract(src, "pkg.caller"), set(&["os", "pkg.sub", "pkg.mod"]));
    }

    #[test]
    fn test_extract_aliased_import() {
        let src = "import pkg.util as u\n";
        assert_eq!(extract(src, "pkg.caller"), set(&["pkg.util"]));
    }

    #[test]
    fn test_extract_relative_imports() {
        let src = "from . import sibling\nfrom .helpers import thing\nfrom ..core import base\n";
        assert_eq!(
            extract(src, "pkg.sub.mod"),
            set(&["pkg.sub", "pkg.sub.helpers", "pkg.core"])
        );
    }

    #[test]
    fn test_extract_relative_too_deep_is_dropped() {
        let src = "from ...far import thing\n";
        assert_eq!(extract(src, "pkg.mod"), BTreeSet::new());
    }

    #[test]
    fn test_extract_nested_imports() {
        let src = "\
def lazy():
    import pkg.heavy
    from pkg import light
";
        assert_eq!(extract(src, "pkg.caller"), set(&["pkg.heavy", "pkg"]));
    }

    #[test]
    fn test_extract_deduplicates() {
        let src = "import pkg.mod\nimport pkg.mod\nfrom pkg import mod\n";
        assert_eq!(extract(src, "caller"), set(&["pkg.mod", "pkg"]));
    }

    #[test]
    fn test_extract_syntax_error_reports_position() {
        let outcome = extract_import_candidates("def broken(:\n    pass\n", "m").unwrap();
        match outcome {
            ImportExtraction::SyntaxError { line, .. } => assert!(line >= 1),
            ImportExtraction::Imports(_) => panic!("expected syntax error"),
        }
    }

    // -- Candidate resolution -------------------------------------------------

    #[test]
    fn test_resolve_candidates_exact_and_prefix() {
        let universe = set(&["pkg", "pkg.mod", "pkg.sub"]);
        let candidates = set(&["pkg.mod", "pkg.mod.Symbol", "pkg.sub.helper", "os", "sys.path"]);
        assert_eq!(
            resolve_candidates(&candidates, &universe),
            vec!["pkg.mod".to_string(), "pkg.sub".to_string()]
        );
    }

    #[test]
    fn test_resolve_candidates_sorted_and_deduplicated() {
        let universe = set(&["a", "b"]);
        let candidates = set(&["b", "a", "a.x", "b.y.z"]);
        assert_eq!(
            resolve_candidates(&candidates, &universe),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_resolve_candidates_externals_dropped() {
        let universe = set(&["pkg"]);
        let candidates = set(&["os", "json", "collections.abc"]);
        assert!(resolve_candidates(&candidates, &universe).is_empty());
    }
}
