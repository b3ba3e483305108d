//! Derived-artifact cache.
//!
//! Every physical folder may carry a hidden subdirectory holding files
//! generated from the folder's files (thumbnails, size variants). An
//! artifact belongs to an original file when its name starts with the
//! original's exact name:
//!
//! ```text
//! photos/
//! ├── .cache/
//! │   ├── beach.jpg@200x200.png
//! │   └── beach.jpg@800x600.png
//! └── beach.jpg
//! ```
//!
//! Matching is a literal prefix test, so `img1.png` also claims artifacts
//! of `img10.png`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{FolioError, Result};

/// Count and total size of the artifacts derived from one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of artifacts.
    pub count: usize,
    /// Combined size in bytes.
    pub total_size: u64,
}

/// Handle on a folder's derived-artifact directory.
///
/// The directory is only created when the first artifact is stored.
#[derive(Debug, Clone)]
pub struct DerivedCache {
    dir: PathBuf,
}

impl DerivedCache {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the cache directory exists.
    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    /// Every artifact whose name starts with `original_name`, sorted by name.
    pub fn list_for(&self, original_name: &str) -> Result<Vec<PathBuf>> {
        if original_name.is_empty() {
            return Ok(Vec::new());
        }

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name
                .to_str()
                .is_some_and(|name| name.starts_with(original_name))
            {
                matches.push(entry.path());
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Rename every artifact of `old_name` so it belongs to `new_name`.
    ///
    /// The part of each artifact name after the `old_name` prefix (size tag,
    /// extension) is preserved. Returns the number of renamed artifacts.
    pub fn rename_for(&self, old_name: &str, new_name: &str) -> Result<usize> {
        let mut renamed = 0;
        for path in self.list_for(old_name)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let target = self.dir.join(format!("{new_name}{}", &name[old_name.len()..]));
            if fs::symlink_metadata(&target).is_ok() {
                warn!(artifact = %path.display(), target = %target.display(), "derived artifact target exists, skipping");
                continue;
            }
            fs::rename(&path, &target).map_err(|e| FolioError::from_io(e, path.display()))?;
            renamed += 1;
        }
        if renamed > 0 {
            debug!(dir = %self.dir.display(), old_name, new_name, renamed, "renamed derived artifacts");
        }
        Ok(renamed)
    }

    /// Delete every artifact of `original_name`. Returns the number removed.
    pub fn delete_for(&self, original_name: &str) -> Result<usize> {
        let mut deleted = 0;
        for path in self.list_for(original_name)? {
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(FolioError::from_io(e, path.display())),
            }
        }
        if deleted > 0 {
            debug!(dir = %self.dir.display(), original_name, deleted, "deleted derived artifacts");
        }
        Ok(deleted)
    }

    /// Count and total size of the artifacts of `original_name`.
    pub fn stats(&self, original_name: &str) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.list_for(original_name)? {
            stats.count += 1;
            stats.total_size += fs::metadata(&path)?.len();
        }
        Ok(stats)
    }

    /// Store an artifact named `original_name` followed by `suffix`.
    pub fn store(&self, original_name: &str, suffix: &str, content: &[u8]) -> Result<PathBuf> {
        if original_name.is_empty() || suffix.contains(['/', '\\']) {
            return Err(FolioError::Validation(format!(
                "invalid artifact name '{original_name}{suffix}'"
            )));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{original_name}{suffix}"));
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Remove the whole cache directory. Returns the number of artifacts dropped.
    pub fn purge(&self) -> Result<usize> {
        let count = match fs::read_dir(&self.dir) {
            Ok(entries) => entries.count(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        fs::remove_dir_all(&self.dir)?;
        Ok(count)
    }
}
