//! folio - hierarchical folder and file catalog
//!
//! Keeps a nested-set folder tree and per-file metadata in SQLite in step
//! with the directories and files below an assets root, including the
//! derived artifacts (thumbnails and the like) stored next to them.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod identity;
pub mod logging;
pub mod storage;

pub use catalog::{Catalog, SyncReport};
pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{FolioError, Result};
pub use file::{
    Access, Attributes, EntityRef, FileMetadata, FileRecord, FileRepository, FileRow, FolderNode,
    FolderRepository, FolderRow, NestedSet, NewFile, NewFolder,
};
pub use identity::{CacheKey, IdentityCache};
pub use storage::{CacheStats, DerivedCache, PhysicalFile, PhysicalFolder, PhysicalStore};
