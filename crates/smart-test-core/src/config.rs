//! Project layout discovery and configuration.
//!
//! Reads optional settings from the analyzed project's `pyproject.toml`
//! table `[tool.smart-test]` and fills the gaps by scanning the repository:
//!
//! ```toml
//! [tool.smart-test]
//! src_dir = "src"              # source directory (default: auto-detected)
//! packages = ["my_package"]    # package names (default: auto-discovered)
//! test_dir = "tests"           # test directory (default: "tests")
//! default_branch = "main"      # git base branch (default: auto-detected)
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::errors::{SmartTestError, SmartTestResult};

/// Directory under the repo root holding all persisted state.
pub const DATA_DIR_NAME: &str = ".smart_test";

const DATA_DIR_GITIGNORE: &str = "\
# Generated files - do not commit
dependency_graph.json
file_hashes.json
ast_parse_cache.json
test_outcomes.json
coverage_map.json
logs/
";

/// Raw `[tool.smart-test]` table. All keys optional.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    src_dir: Option<String>,
    packages: Option<Vec<String>>,
    test_dir: Option<String>,
    default_branch: Option<String>,
}

/// Resolved project layout passed by reference to every component.
#[derive(Clone, Debug)]
pub struct ProjectLayout {
    pub repo_root: PathBuf,
    /// Absolute source root containing the top-level packages.
    pub src_root: PathBuf,
    /// Absolute test root.
    pub test_root: PathBuf,
    /// Discovered top-level package names, sorted.
    pub packages: Vec<String>,
    /// Git base branch used for `diff` when no `--base` is given.
    pub default_branch: String,
}

impl ProjectLayout {
    /// Discover the layout of the repository at `repo_root`.
    pub fn discover(repo_root: &Path) -> SmartTestResult<Self> {
        let repo_root = repo_root
            .canonicalize()
            .map_err(|e| SmartTestError::Config(format!("bad repo root: {e}")))?;
        let config = load_config(&repo_root)?;

        let src_root = match &config.src_dir {
            Some(dir) => repo_root.join(dir),
            None => {
                let src = repo_root.join("src");
                if src.is_dir() {
                    src
                } else {
                    // Flat layout: packages live in the repo root.
                    repo_root.clone()
                }
            }
        };

        let packages = match &config.packages {
            Some(pkgs) => pkgs.clone(),
            None => discover_packages(&src_root),
        };

        let test_root = repo_root.join(config.test_dir.as_deref().unwrap_or("tests"));

        let default_branch = match &config.default_branch {
            Some(branch) => branch.clone(),
            None => discover_default_branch(&repo_root),
        };

        Ok(ProjectLayout {
            repo_root,
            src_root,
            test_root,
            packages,
            default_branch,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.repo_root.join(DATA_DIR_NAME)
    }

    pub fn graph_file(&self) -> PathBuf {
        self.data_dir().join("dependency_graph.json")
    }

    pub fn hashes_file(&self) -> PathBuf {
        self.data_dir().join("file_hashes.json")
    }

    pub fn ast_cache_file(&self) -> PathBuf {
        self.data_dir().join("ast_parse_cache.json")
    }

    pub fn outcomes_file(&self) -> PathBuf {
        self.data_dir().join("test_outcomes.json")
    }

    pub fn coverage_file(&self) -> PathBuf {
        self.data_dir().join("coverage_map.json")
    }

    /// Create the data directory if needed and seed its `.gitignore`.
    pub fn ensure_data_dir(&self) -> SmartTestResult<()> {
        let dir = self.data_dir();
        std::fs::create_dir_all(&dir)?;
        let gitignore = dir.join(".gitignore");
        if !gitignore.exists() {
            std::fs::write(&gitignore, DATA_DIR_GITIGNORE)?;
        }
        Ok(())
    }

    /// Source root relative to the repo root, forward-slash normalized.
    /// Empty string for a flat layout.
    pub fn src_prefix(&self) -> String {
        rel_prefix(&self.src_root, &self.repo_root)
    }

    /// Test root relative to the repo root, forward-slash normalized.
    pub fn test_prefix(&self) -> String {
        rel_prefix(&self.test_root, &self.repo_root)
    }
}

fn rel_prefix(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn load_config(repo_root: &Path) -> SmartTestResult<RawConfig> {
    let pyproject = repo_root.join("pyproject.toml");
    if !pyproject.exists() {
        return Ok(RawConfig::default());
    }
    let contents = std::fs::read_to_string(&pyproject)?;
    let value: toml::Value = toml::from_str(&contents)?;
    let table = value
        .get("tool")
        .and_then(|t| t.get("smart-test"))
        .cloned();
    match table {
        Some(t) => Ok(t.try_into()?),
        None => Ok(RawConfig::default()),
    }
}

/// Discover top-level packages: directories under the source root holding an
/// `__init__.py`, skipping hidden and underscore-prefixed names.
fn discover_packages(src_root: &Path) -> Vec<String> {
    let mut packages = Vec::new();
    let entries = match std::fs::read_dir(src_root) {
        Ok(e) => e,
        Err(_) => return packages,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_dir()
            && path.join("__init__.py").exists()
            && !name.starts_with('.')
            && !name.starts_with('_')
        {
            packages.push(name);
        }
    }
    packages.sort();
    packages
}

/// Auto-detect the git default branch, falling back to "main".
fn discover_default_branch(repo_root: &Path) -> String {
    let output = Command::new("git")
        .args(["symbolic-ref", "refs/remotes/origin/HEAD"])
        .current_dir(repo_root)
        .output();
    if let Ok(out) = output {
        if out.status.success() {
            let stdout = String::from_utf8_lossy(&out.stdout);
            if let Some(branch) = stdout.trim().rsplit('/').next() {
                if !branch.is_empty() {
                    return branch.to_string();
                }
            }
        }
    }

    for branch in ["main", "master", "develop"] {
        let verified = Command::new("git")
            .args(["rev-parse", "--verify", branch])
            .current_dir(repo_root)
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        if verified {
            return branch.to_string();
        }
    }

    "main".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
