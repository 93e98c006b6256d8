//! Remote cache seam for sharing the AST parse cache across machines.
//!
//! One interface, four operations; the concrete backend is chosen from the
//! configured URL's scheme at construction time, and everything downstream
//! depends only on the trait. A missing or failing backend never affects
//! correctness, only speed.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::models::AstParseCache;
use crate::store::cache::CacheStore;

/// Cache key under which the AST parse cache is shared.
pub const AST_CACHE_KEY: &str = "ast_parse_cache";

/// Environment variables consulted for the remote cache URL, in order.
pub const REMOTE_CACHE_ENV_VARS: &[&str] = &["SMART_TEST_REMOTE_CACHE", "REMOTE_CACHE_URL"];

pub trait RemoteCache {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: &serde_json::Value) -> bool;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> bool;
}

/// Network file share backend (NFS, SMB, or any mounted directory).
pub struct FileShareBackend {
    base_path: PathBuf,
}

impl FileShareBackend {
    pub fn new(base_path: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(base_path)?;
        Ok(FileShareBackend {
            base_path: base_path.to_path_buf(),
        })
    }

    /// Keys are hashed into file names to sidestep path-character issues.
    fn key_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.base_path.join(format!("{:x}.json", hasher.finalize()))
    }
}

impl RemoteCache for FileShareBackend {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.key_path(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), "failed to read from file share: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> bool {
        let path = self.key_path(key);
        match serde_json::to_string(value).map(|s| std::fs::write(&path, s)) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(path = %path.display(), "failed to write to file share: {e}");
                false
            }
            Err(e) => {
                error!("failed to serialize cache value: {e}");
                false
            }
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }

    fn delete(&self, key: &str) -> bool {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path).is_ok()
        } else {
            true
        }
    }
}

/// Build a backend from a cache URL. Scheme selects the variant:
/// `file:///path` (or a bare path) gives the file share backend; network
/// schemes (`http`, `https`, `redis`, `s3`) are recognized but not built
/// into this binary and report unavailable.
pub fn create_backend(url: &str) -> Option<Box<dyn RemoteCache>> {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("", url),
    };

    match scheme {
        "" | "file" => match FileShareBackend::new(Path::new(rest)) {
            Ok(backend) => Some(Box::new(backend)),
            Err(e) => {
                error!(url, "failed to open file share backend: {e}");
                None
            }
        },
        "http" | "https" | "redis" | "s3" => {
            warn!(url, "remote cache scheme '{scheme}' is not available in this build");
            None
        }
        _ => {
            error!(url, "unsupported remote cache scheme: {scheme}");
            None
        }
    }
}

/// Backend configured via the environment, if any.
pub fn backend_from_env() -> Option<Box<dyn RemoteCache>> {
    let url = REMOTE_CACHE_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))?;
    let backend = create_backend(&url);
    if backend.is_some() {
        info!(url = %url, "using remote cache");
    }
    backend
}

/// Pre-seed the local AST parse cache from the remote. Local entries win.
pub fn seed_ast_cache(store: &mut CacheStore, backend: &dyn RemoteCache) {
    let Some(value) = backend.get(AST_CACHE_KEY) else {
        return;
    };
    let remote: AstParseCache = match serde_json::from_value(value) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("malformed remote AST cache ignored: {e}");
            return;
        }
    };

    let mut merged = store.ast_cache().clone();
    let mut added = 0usize;
    for (path, entry) in remote {
        if !merged.contains_key(&path) {
            merged.insert(path, entry);
            added += 1;
        }
    }
    if added > 0 {
        info!(added, "loaded entries from remote cache");
        store.set_ast_cache(merged);
    }
}

/// Publish the local AST parse cache to the remote.
pub fn publish_ast_cache(store: &mut CacheStore, backend: &dyn RemoteCache) {
    let cache = store.ast_cache();
    if cache.is_empty() {
        return;
    }
    match serde_json::to_value(cache) {
        Ok(value) => {
            if !backend.set(AST_CACHE_KEY, &value) {
                warn!("failed to sync AST cache to remote backend");
            }
        }
        Err(e) => warn!("failed to serialize AST cache for remote sync: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_share_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileShareBackend::new(tmp.path()).unwrap();

        assert!(!backend.exists("k"));
        assert!(backend.get("k").is_none());

        let value = json!({"entries": [1, 2, 3]});
        assert!(backend.set("k", &value));
        assert!(backend.exists("k"));
        assert_eq!(backend.get("k").unwrap(), value);

        assert!(backend.delete("k"));
        assert!(!backend.exists("k"));
    }

    #[test]
    fn test_delete_missing_key_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileShareBackend::new(tmp.path()).unwrap();
        assert!(backend.delete("never-set"));
    }

    #[test]
    fn test_create_backend_schemes() {
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("file://{}", tmp.path().join("share").display());
        assert!(create_backend(&url).is_some());
        assert!(create_backend("https://cache.example.com").is_none());
        assert!(create_backend("redis://localhost:6379/0").is_none());
        assert!(create_backend("gopher://weird").is_none());
    }
}
