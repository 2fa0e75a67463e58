// SPDX-License-Identifier: Apache-2.0

//! Local possession-token cache.
//!
//! A small slug → token map persisted as a JSON file, the client-side
//! convenience that lets an author edit without re-entering the token. Losing
//! it is not safety-critical (the author can still present the token from
//! elsewhere), so every failure of the backing file degrades to a no-op with
//! a warning instead of an error.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::warn;

/// File-backed token cache with degrade-to-no-op semantics.
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Remember the token for a slug. No-op if the file cannot be written.
    pub fn save(&self, slug: &str, token: &str) {
        let mut tokens = self.load();
        tokens.insert(slug.to_string(), token.to_string());
        self.store(&tokens);
    }

    /// Token for a slug, if cached.
    pub fn get(&self, slug: &str) -> Option<String> {
        self.load().get(slug).cloned()
    }

    /// Everything currently cached.
    pub fn get_all(&self) -> HashMap<String, String> {
        self.load()
    }

    /// Forget the token for a slug. No-op if the file cannot be written.
    pub fn remove(&self, slug: &str) {
        let mut tokens = self.load();
        if tokens.remove(slug).is_some() {
            self.store(&tokens);
        }
    }

    /// Whether a non-empty token is cached for this slug.
    pub fn has(&self, slug: &str) -> bool {
        self.load().get(slug).is_some_and(|t| !t.is_empty())
    }

    fn load(&self) -> HashMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token cache unreadable");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token cache corrupt, starting empty");
                HashMap::new()
            }
        }
    }

    fn store(&self, tokens: &HashMap<String, String>) {
        let serialized = match serde_json::to_string(tokens) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "token cache serialization failed");
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %e, "token cache not persisted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_get_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = TokenCache::new(dir.path().join("tokens.json"));

        assert_eq!(cache.get("eine-reise-x"), None);
        cache.save("eine-reise-x", &"a".repeat(40));
        assert_eq!(cache.get("eine-reise-x"), Some("a".repeat(40)));
        assert!(cache.has("eine-reise-x"));

        cache.save("zweite-reise-y", &"b".repeat(40));
        assert_eq!(cache.get_all().len(), 2);

        cache.remove("eine-reise-x");
        assert_eq!(cache.get("eine-reise-x"), None);
        assert!(!cache.has("eine-reise-x"));
        assert_eq!(cache.get_all().len(), 1);
    }

    #[test]
    fn survives_a_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");

        TokenCache::new(&path).save("bleibt", "c1".repeat(20).as_str());
        assert_eq!(TokenCache::new(&path).get("bleibt"), Some("c1".repeat(20)));
    }

    #[test]
    fn unwritable_backing_store_degrades_to_noop() {
        let cache = TokenCache::new("/nonexistent-dir/sub/tokens.json");
        cache.save("slug", "token");
        cache.remove("slug");
        assert_eq!(cache.get("slug"), None);
        assert!(cache.get_all().is_empty());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = TokenCache::new(&path);
        assert_eq!(cache.get("slug"), None);
        // Writes still go through and replace the corrupt file.
        cache.save("slug", "token");
        assert_eq!(cache.get("slug"), Some("token".to_string()));
    }
}
