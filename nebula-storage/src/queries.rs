//! Query Catalog (C2) — a read-through cache of named, parameterized SQL
//! statements addressed by slash-path keys (`"entities/create"`,
//! `"enums/statuses"`, ...).
//!
//! Grounded on the source's `QueryLoader`: a `.sql` file per query name,
//! nested directories read via the slash in the key, contents cached after
//! first read. The Rust rework swaps the Python dict for a `DashMap` so
//! concurrent readers across tokio tasks don't serialize on a lock, and
//! loads lazily rather than slurping the whole tree at startup — a query a
//! given deployment never calls never hits the filesystem.

use dashmap::DashMap;
use nebula_core::StoreError;
use std::path::PathBuf;
use std::sync::Arc;

pub struct QueryCatalog {
    root: PathBuf,
    cache: DashMap<String, Arc<str>>,
}

impl QueryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: DashMap::new(),
        }
    }

    /// Return the cached SQL text for `name`, reading it from
    /// `<root>/<name>.sql` on first access.
    pub fn get(&self, name: &str) -> Result<Arc<str>, StoreError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(cached.clone());
        }

        let path = self.root.join(format!("{name}.sql"));
        let text = std::fs::read_to_string(&path).map_err(|e| StoreError::QueryFailed {
            reason: format!("query file not found: {} ({e})", path.display()),
        })?;
        let text: Arc<str> = Arc::from(text);
        self.cache.insert(name.to_string(), text.clone());
        Ok(text)
    }

    /// Evict every cached entry, forcing the next `get` to re-read from
    /// disk. Used by the admin reload path alongside the enum registry swap
    /// when query text is redeployed without a process restart.
    pub fn invalidate_all(&self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_query(dir: &tempfile::TempDir, name: &str, sql: &str) {
        let path = dir.path().join(format!("{name}.sql"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(sql.as_bytes()).unwrap();
    }

    #[test]
    fn reads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        write_query(&dir, "entities/create", "INSERT INTO entities ...");
        let catalog = QueryCatalog::new(dir.path());

        let first = catalog.get("entities/create").unwrap();
        assert_eq!(&*first, "INSERT INTO entities ...");
        assert_eq!(catalog.cached_len(), 1);

        // Remove the file; the cached copy should still resolve.
        std::fs::remove_file(dir.path().join("entities/create.sql")).unwrap();
        let second = catalog.get("entities/create").unwrap();
        assert_eq!(&*second, "INSERT INTO entities ...");
    }

    #[test]
    fn missing_query_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = QueryCatalog::new(dir.path());
        assert!(catalog.get("entities/nonexistent").is_err());
    }

    #[test]
    fn invalidate_all_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        write_query(&dir, "enums/statuses", "SELECT id, name FROM statuses");
        let catalog = QueryCatalog::new(dir.path());
        catalog.get("enums/statuses").unwrap();
        assert_eq!(catalog.cached_len(), 1);
        catalog.invalidate_all();
        assert_eq!(catalog.cached_len(), 0);
    }
}
