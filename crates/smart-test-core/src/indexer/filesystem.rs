//! Filesystem scanning and module-name derivation.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::{SmartTestError, SmartTestResult};

/// Recursively collect every `*.py` file under `root`, sorted by path for
/// deterministic traversal. A missing root yields the empty list.
pub fn iter_py_files(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map(|e| e == "py").unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Convert a source file path to its dotted module name.
///
/// `src/pkg/sub.py` -> `pkg.sub`; `src/pkg/__init__.py` -> `pkg`; an
/// `__init__.py` directly at the source root maps to the empty string.
pub fn module_name_of(file_path: &Path, src_root: &Path) -> SmartTestResult<String> {
    let rel = file_path.strip_prefix(src_root).map_err(|_| {
        SmartTestError::Index(format!(
            "{} is not under source root {}",
            file_path.display(),
            src_root.display()
        ))
    })?;

    let mut parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => Some(os.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    if let Some(last) = parts.last_mut() {
        if last == "__init__.py" {
            parts.pop();
        } else {
            *last = last.strip_suffix(".py").unwrap_or(last).to_string();
        }
    }

    Ok(parts.join("."))
}

/// Infer a module name purely from a repo-relative path, without touching the
/// file system. Used for deleted files, where content can no longer be read.
///
/// `src_prefix` is the source root relative to the repo root ("" for a flat
/// layout). Returns `None` when the path is not under the source root or is
/// not a Python file.
pub fn module_name_from_repo_path(rel_path: &str, src_prefix: &str) -> Option<String> {
    let normalized = rel_path.replace('\\', "/");
    if !normalized.ends_with(".py") {
        return None;
    }

    let under_src = if src_prefix.is_empty() {
        normalized.as_str()
    } else {
        normalized
            .strip_prefix(src_prefix)?
            .strip_prefix('/')
            .unwrap_or("")
    };
    if under_src.is_empty() {
        return None;
    }

    let mut parts: Vec<&str> = under_src.split('/').collect();
    let last = parts.last()?;
    if *last == "__init__.py" {
        parts.pop();
    } else {
        let stem = last.strip_suffix(".py")?;
        *parts.last_mut()? = stem;
    }

    Some(parts.join("."))
}

/// Repo-relative, forward-slash normalized rendering of `path`.
pub fn repo_relative(path: &Path, repo_root: &Path) -> String {
    path.strip_prefix(repo_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_simple() {
        let name = module_name_of(Path::new("src/pkg/sub.py"), Path::new("src")).unwrap();
        assert_eq!(name, "pkg.sub");
    }

    #[test]
    fn test_module_name_init_collapses() {
        let name = module_name_of(Path::new("src/pkg/__init__.py"), Path::new("src")).unwrap();
        assert_eq!(name, "pkg");
    }

    #[test]
    fn test_module_name_root_init_is_empty() {
        let name = module_name_of(Path::new("src/__init__.py"), Path::new("src")).unwrap();
        assert_eq!(name, "");
    }

    #[test]
    fn test_module_name_outside_root_errors() {
        assert!(module_name_of(Path::new("other/x.py"), Path::new("src")).is_err());
    }

    #[test]
    fn test_module_name_is_deterministic() {
        let a = module_name_of(Path::new("src/a/b/c.py"), Path::new("src")).unwrap();
        let b = module_name_of(Path::new("src/a/b/c.py"), Path::new("src")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "a.b.c");
    }

    #[test]
    fn test_deleted_path_inference() {
        assert_eq!(
            module_name_from_repo_path("src/pkg/mod.py", "src"),
            Some("pkg.mod".to_string())
        );
        assert_eq!(
            module_name_from_repo_path("src/pkg/__init__.py", "src"),
            Some("pkg".to_string())
        );
        assert_eq!(module_name_from_repo_path("src/pkg/data.txt", "src"), None);
        assert_eq!(module_name_from_repo_path("docs/pkg/mod.py", "src"), None);
    }

    #[test]
    fn test_deleted_path_inference_flat_layout() {
        assert_eq!(
            module_name_from_repo_path("pkg/mod.py", ""),
            Some("pkg.mod".to_string())
        );
    }

    #[test]
    fn test_iter_py_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["b.py", "a.py", "sub/c.py", "sub/skip.txt"] {
            let path = tmp.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "").unwrap();
        }
        let files = iter_py_files(tmp.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| repo_relative(p, tmp.path()))
            .collect();
        assert_eq!(names, vec!["a.py", "b.py", "sub/c.py"]);
    }

    #[test]
    fn test_iter_py_files_missing_root() {
        assert!(iter_py_files(Path::new("/nonexistent/never")).is_empty());
    }
}
