//! Synchronization layer for folio.
//!
//! The [`Catalog`] ties the persisted folder tree and file records to the
//! physical entries below the assets root. Every mutating operation runs
//! the physical action first and only then touches the database:
//!
//! ```text
//! rename/move/delete ──► PhysicalStore ──ok──► FolderRepository / FileRepository
//!                             │                       │
//!                           error                   error
//!                             ▼                       ▼
//!                   clean failure, nothing     FolioError::Inconsistent
//!                   persisted changed          (re-sync repairs it)
//! ```
//!
//! The catalog owns the identity caches for [`FolderNode`] and
//! [`FileRecord`] handles, so a lookup always returns the single live
//! handle for an entity.

mod files;
mod folders;
mod maintenance;

pub use maintenance::SyncReport;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use tracing::{error, warn};

use crate::config::Config;
use crate::db::Database;
use crate::file::{FileRecord, FileRow, FolderNode, FolderRepository, FolderRow};
use crate::identity::{lock, IdentityCache};
use crate::storage::PhysicalStore;
use crate::{FolioError, Result};

/// Catalog of folders and files, kept in step with the filesystem.
///
/// Structural edits of the folder tree (insert, delete, move) and record
/// creation are serialized through one async mutex and run their SQL in a
/// single transaction.
pub struct Catalog {
    db: Database,
    store: PhysicalStore,
    folders: Mutex<IdentityCache<FolderNode>>,
    files: Mutex<IdentityCache<FileRecord>>,
    structure: tokio::sync::Mutex<()>,
}

impl Catalog {
    /// Create a catalog over an opened database and physical store.
    pub fn new(db: Database, store: PhysicalStore) -> Self {
        Self {
            db,
            store,
            folders: Mutex::new(IdentityCache::new()),
            files: Mutex::new(IdentityCache::new()),
            structure: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the database and the assets root named by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database.path).await?;
        let store = PhysicalStore::from_config(&config.assets)?;
        Ok(Self::new(db, store))
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The physical store.
    pub fn store(&self) -> &PhysicalStore {
        &self.store
    }

    /// Number of cached folder and file handles.
    pub fn cached_handles(&self) -> (usize, usize) {
        (lock(&self.folders).len(), lock(&self.files).len())
    }

    async fn conn(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.db.pool().acquire().await?)
    }

    /// Cache a folder row, refreshing the live handle if one exists.
    fn cache_node(&self, row: FolderRow) -> Arc<FolderNode> {
        let mut folders = lock(&self.folders);
        if let Some(node) = folders.get_by_id(row.id) {
            node.replace_row(row);
            return node;
        }
        let path = row.path.clone();
        let id = row.id;
        folders.insert(path, Some(id), Arc::new(FolderNode::from_row(row)))
    }

    /// Cache a file row stored in the folder at `folder_path`.
    fn cache_file(&self, row: FileRow, folder_path: &str) -> Arc<FileRecord> {
        let mut files = lock(&self.files);
        if let Some(record) = files.get_by_id(row.id) {
            record.replace_row(row);
            return record;
        }
        let key = file_key(folder_path, row.physical_name());
        let id = row.id;
        files.insert(key, Some(id), Arc::new(FileRecord::from_row(row)))
    }

    /// Re-read the coordinates of every cached folder handle.
    ///
    /// Runs after each committed structural edit. A failure leaves stale
    /// coordinates in memory only; queries always re-read them.
    async fn refresh_cached_nodes(&self) {
        let handles = lock(&self.folders).handles();
        if handles.is_empty() {
            return;
        }

        let coords = match self.all_coordinates().await {
            Ok(coords) => coords,
            Err(e) => {
                warn!(error = %e, "failed to refresh cached folder coordinates");
                return;
            }
        };
        for node in handles {
            if let Some(c) = coords.get(&node.id()) {
                node.set_nested_set(*c);
            }
        }
    }

    async fn all_coordinates(&self) -> Result<HashMap<i64, crate::file::NestedSet>> {
        let mut conn = self.conn().await?;
        Ok(FolderRepository::all_coordinates(&mut conn)
            .await?
            .into_iter()
            .collect())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (folders, files) = self.cached_handles();
        f.debug_struct("Catalog")
            .field("root", &self.store.root())
            .field("cached_folders", &folders)
            .field("cached_files", &files)
            .finish()
    }
}

/// Identity key of a file record: owning folder path plus physical name.
pub(crate) fn file_key(folder_path: &str, physical_name: &str) -> String {
    format!("{folder_path}{physical_name}")
}

/// Normalize a caller-supplied folder path to `a/b/` form.
pub(crate) fn normalize_folder_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Report a metadata failure that followed a successful physical action.
fn metadata_failed(operation: &str, err: FolioError) -> FolioError {
    error!(operation, error = %err, "metadata update failed after physical change");
    FolioError::inconsistent(operation, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_key() {
        assert_eq!(file_key("docs/img/", "a.png"), "docs/img/a.png");
    }

    #[test]
    fn test_normalize_folder_path() {
        assert_eq!(normalize_folder_path("docs"), "docs/");
        assert_eq!(normalize_folder_path("/docs/img/"), "docs/img/");
        assert_eq!(normalize_folder_path("docs/img"), "docs/img/");
        assert_eq!(normalize_folder_path("/"), "");
    }

    #[test]
    fn test_metadata_failed_is_inconsistency() {
        let err = metadata_failed("rename file", FolioError::Database("locked".into()));
        assert!(err.is_inconsistency());
        assert!(err.to_string().contains("rename file"));
    }
}
