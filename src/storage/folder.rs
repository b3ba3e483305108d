//! Physical folder handles.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::derived::DerivedCache;
use crate::Result;

/// A directory that exists on disk.
///
/// Handles are obtained through [`PhysicalStore`](super::PhysicalStore),
/// which keeps one instance per canonical path. A handle never changes its
/// path: rename and move produce a new handle and evict the old one.
#[derive(Debug)]
pub struct PhysicalFolder {
    path: PathBuf,
    key: String,
    cache_dir_name: String,
    cache: OnceLock<DerivedCache>,
}

impl PhysicalFolder {
    pub(crate) fn new(path: PathBuf, cache_dir_name: &str) -> Self {
        let key = folder_key(&path);
        Self {
            path,
            key,
            cache_dir_name: cache_dir_name.to_string(),
            cache: OnceLock::new(),
        }
    }

    /// Canonical absolute path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute path as a string with a trailing separator.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Last path component.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Whether the directory still exists.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// The derived-artifact cache of this folder.
    pub fn derived_cache(&self) -> &DerivedCache {
        self.cache
            .get_or_init(|| DerivedCache::new(self.path.join(&self.cache_dir_name)))
    }

    /// Whether `name` is the reserved derived-artifact directory name.
    pub fn is_cache_dir_name(&self, name: &str) -> bool {
        name == self.cache_dir_name
    }

    /// Paths of subdirectories, excluding the derived-artifact directory.
    pub fn subfolder_paths(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.file_name().to_str() == Some(self.cache_dir_name.as_str()) {
                continue;
            }
            dirs.push(entry.path());
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Names of regular files directly inside this folder.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Identity key of a directory: its path with a trailing separator.
pub(crate) fn folder_key(path: &Path) -> String {
    let mut key = path.to_string_lossy().into_owned();
    if !key.ends_with(std::path::MAIN_SEPARATOR) {
        key.push(std::path::MAIN_SEPARATOR);
    }
    key
}
