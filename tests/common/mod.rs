//! Test helpers for catalog integration tests.
//!
//! Provides a catalog on an in-memory database and a temporary assets root.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use folio::{Catalog, Database, FolderNode, PhysicalStore};

/// Catalog plus the temporary directory backing its assets root.
pub struct TestCatalog {
    pub catalog: Catalog,
    _dir: TempDir,
}

impl TestCatalog {
    /// Create an empty catalog.
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let store = PhysicalStore::new(dir.path().join("assets"), ".cache").unwrap();
        Self {
            catalog: Catalog::new(db, store),
            _dir: dir,
        }
    }

    /// Absolute path of a root-relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.catalog.store().root().join(relative)
    }

    /// Create a directory (and parents) directly on disk.
    pub fn mkdir(&self, relative: &str) {
        fs::create_dir_all(self.path(relative)).unwrap();
    }

    /// Write a file directly on disk.
    pub fn write(&self, relative: &str, content: &[u8]) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Ensure the node for an on-disk directory, creating the directory first.
    pub async fn node(&self, relative: &str) -> Arc<FolderNode> {
        self.mkdir(relative);
        let folder = self.catalog.store().folder_at(relative).unwrap();
        self.catalog.ensure_node(&folder).await.unwrap()
    }

    /// Current `(l, r, level)` of the folder at `relative`, read from the database.
    pub async fn coords(&self, relative: &str) -> (i64, i64, i64) {
        let mut conn = self.catalog.database().pool().acquire().await.unwrap();
        let row = folio::FolderRepository::get_by_path(&mut conn, relative)
            .await
            .unwrap()
            .unwrap();
        (row.l, row.r, row.level)
    }

    /// Number of rows in a table.
    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.catalog.database().pool())
            .await
            .unwrap()
    }

    /// File names inside the derived cache of a folder.
    pub fn cache_entries(&self, relative: &str) -> Vec<String> {
        let dir = self.path(relative).join(".cache");
        let mut names: Vec<String> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}
