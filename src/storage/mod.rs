//! Physical entry layer for folio.
//!
//! This module wraps real filesystem entries below the assets root:
//! - [`PhysicalFolder`] and [`PhysicalFile`] handles, one per canonical path
//! - rename, move, delete and listing of those entries
//! - the per-folder [`DerivedCache`] of generated artifacts
//!
//! ```text
//! {assets_root}/
//! ├── docs/
//! │   ├── .cache/                 derived artifacts, never listed
//! │   │   └── report.pdf.thumb.png
//! │   └── report.pdf
//! └── photos/
//! ```

mod derived;
mod file;
mod folder;

pub use derived::{CacheStats, DerivedCache};
pub use file::{guess_mime_type, PhysicalFile, DEFAULT_MIME_TYPE};
pub use folder::PhysicalFolder;

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::config::AssetsConfig;
use crate::identity::{lock, CacheKey, IdentityCache};
use crate::{FolioError, Result};

use folder::folder_key;

/// Check that `name` is a single plain path component.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(FolioError::Validation(format!("invalid name '{name}'")));
    }
    Ok(())
}

/// Owner of every physical handle below one assets root.
///
/// Keeps one identity cache for folders and one for files, keyed by
/// canonical absolute path.
#[derive(Debug)]
pub struct PhysicalStore {
    root: PathBuf,
    cache_dir: String,
    folders: Mutex<IdentityCache<PhysicalFolder>>,
    files: Mutex<IdentityCache<PhysicalFile>>,
}

impl PhysicalStore {
    /// Create a store for `root`, creating the directory if needed.
    ///
    /// `cache_dir` names the hidden derived-artifact directory inside every
    /// folder.
    pub fn new(root: impl Into<PathBuf>, cache_dir: impl Into<String>) -> Result<Self> {
        let root = root.into();
        let cache_dir = cache_dir.into();
        validate_name(&cache_dir)?;

        fs::create_dir_all(&root)?;
        let root = fs::canonicalize(&root)?;
        debug!(root = %root.display(), "opened assets root");

        Ok(Self {
            root,
            cache_dir,
            folders: Mutex::new(IdentityCache::new()),
            files: Mutex::new(IdentityCache::new()),
        })
    }

    /// Create a store from the assets configuration.
    pub fn from_config(config: &AssetsConfig) -> Result<Self> {
        Self::new(&config.root, config.cache_dir.clone())
    }

    /// Canonical assets root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the derived-artifact directory.
    pub fn cache_dir_name(&self) -> &str {
        &self.cache_dir
    }

    /// Handle for the assets root itself.
    pub fn root_folder(&self) -> Result<Arc<PhysicalFolder>> {
        let root = self.root.clone();
        self.folder(root)
    }

    /// Handle for the directory at `path`.
    ///
    /// Relative paths are resolved against the assets root. The directory
    /// must exist, lie inside the root and not inside a derived cache.
    pub fn folder(&self, path: impl AsRef<Path>) -> Result<Arc<PhysicalFolder>> {
        let canonical = self.canonicalize(path.as_ref())?;
        if !canonical.is_dir() {
            return Err(FolioError::PathNotFound(format!(
                "{} is not a directory",
                canonical.display()
            )));
        }
        self.check_inside(&canonical)?;

        let key = folder_key(&canonical);
        let mut folders = lock(&self.folders);
        if let Some(handle) = folders.get_by_path(&key) {
            return Ok(handle);
        }
        let handle = Arc::new(PhysicalFolder::new(canonical, &self.cache_dir));
        Ok(folders.insert(key, None, handle))
    }

    /// Handle for the directory at a root-relative path such as `docs/img/`.
    pub fn folder_at(&self, relative: &str) -> Result<Arc<PhysicalFolder>> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FolioError::Validation(format!(
                "invalid relative path '{}'",
                relative.display()
            )));
        }
        self.folder(self.root.join(relative))
    }

    /// Path of `folder` relative to the assets root, with a trailing `/`.
    ///
    /// The root itself maps to the empty string.
    pub fn relative_path(&self, folder: &PhysicalFolder) -> Result<String> {
        let relative = folder.path().strip_prefix(&self.root).map_err(|_| {
            FolioError::Validation(format!(
                "{} is outside the assets root",
                folder.path().display()
            ))
        })?;

        let mut out = String::new();
        for component in relative.components() {
            let segment = component.as_os_str().to_str().ok_or_else(|| {
                FolioError::Validation(format!("non UTF-8 path {}", folder.path().display()))
            })?;
            out.push_str(segment);
            out.push('/');
        }
        Ok(out)
    }

    /// Whether `folder` is the assets root.
    pub fn is_root(&self, folder: &PhysicalFolder) -> bool {
        folder.path() == self.root
    }

    /// The directory containing `folder`, or `None` for the assets root.
    pub fn parent_of(&self, folder: &PhysicalFolder) -> Result<Option<Arc<PhysicalFolder>>> {
        if self.is_root(folder) {
            return Ok(None);
        }
        match folder.path().parent() {
            Some(parent) => self.folder(parent).map(Some),
            None => Ok(None),
        }
    }

    /// Handle for the regular file at `path`.
    pub fn file(&self, path: impl AsRef<Path>) -> Result<Arc<PhysicalFile>> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FolioError::Validation(format!("invalid file path {}", path.display())))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => self.root.clone(),
        };
        let folder = self.folder(parent)?;
        self.file_in(&folder, name)
    }

    /// Handle for the regular file `name` inside `folder`.
    pub fn file_in(&self, folder: &Arc<PhysicalFolder>, name: &str) -> Result<Arc<PhysicalFile>> {
        validate_name(name)?;
        let path = folder.path().join(name);
        if !path.is_file() {
            return Err(FolioError::PathNotFound(path.display().to_string()));
        }

        let key = path.to_string_lossy().into_owned();
        let mut files = lock(&self.files);
        if let Some(handle) = files.get_by_path(&key) {
            return Ok(handle);
        }
        let handle = Arc::new(PhysicalFile::new(Arc::clone(folder), name));
        Ok(files.insert(key, None, handle))
    }

    /// Subdirectories of `folder`, excluding its derived cache.
    pub fn subfolders(&self, folder: &PhysicalFolder) -> Result<Vec<Arc<PhysicalFolder>>> {
        folder
            .subfolder_paths()?
            .into_iter()
            .map(|path| self.folder(path))
            .collect()
    }

    /// Regular files directly inside `folder`.
    pub fn files_in(&self, folder: &Arc<PhysicalFolder>) -> Result<Vec<Arc<PhysicalFile>>> {
        folder
            .file_names()?
            .iter()
            .map(|name| self.file_in(folder, name))
            .collect()
    }

    /// Create the directory `name` inside `parent`.
    pub fn create_folder(&self, parent: &PhysicalFolder, name: &str) -> Result<Arc<PhysicalFolder>> {
        self.validate_folder_name(name)?;
        let path = parent.path().join(name);
        fs::create_dir(&path).map_err(|e| FolioError::from_io(e, path.display()))?;
        debug!(path = %path.display(), "created folder");
        self.folder(path)
    }

    /// Rename `folder` within its parent directory.
    pub fn rename_folder(
        &self,
        folder: &PhysicalFolder,
        new_name: &str,
    ) -> Result<Arc<PhysicalFolder>> {
        self.validate_folder_name(new_name)?;
        let parent = self.movable_parent(folder)?;
        let target = parent.join(new_name);
        if target == folder.path() {
            return self.folder(target);
        }
        self.relocate_folder(folder, target)
    }

    /// Move `folder` (with its contents) into `destination`.
    pub fn move_folder(
        &self,
        folder: &PhysicalFolder,
        destination: &PhysicalFolder,
    ) -> Result<Arc<PhysicalFolder>> {
        self.movable_parent(folder)?;
        if destination.path().starts_with(folder.path()) {
            return Err(FolioError::Validation(format!(
                "cannot move {} into itself",
                folder.path().display()
            )));
        }
        let name = folder.name().ok_or_else(|| {
            FolioError::Validation(format!("unnamed folder {}", folder.path().display()))
        })?;
        let target = destination.path().join(name);
        if target == folder.path() {
            return self.folder(target);
        }
        self.relocate_folder(folder, target)
    }

    /// Recursively delete `folder` from disk.
    pub fn delete_folder(&self, folder: &PhysicalFolder) -> Result<()> {
        self.movable_parent(folder)?;
        fs::remove_dir_all(folder.path())
            .map_err(|e| FolioError::from_io(e, folder.path().display()))?;
        debug!(path = %folder.path().display(), "deleted folder");

        lock(&self.files).evict_prefix(folder.key());
        lock(&self.folders).evict_prefix(folder.key());
        Ok(())
    }

    /// Create a new file `name` in `folder` holding `content`.
    pub fn write_file(
        &self,
        folder: &Arc<PhysicalFolder>,
        name: &str,
        content: &[u8],
    ) -> Result<Arc<PhysicalFile>> {
        validate_name(name)?;
        let path = folder.path().join(name);
        create_new_with(&path, |file| {
            file.write_all(content)?;
            file.sync_all()
        })?;
        self.file_in(folder, name)
    }

    /// Rename `file` within its folder.
    ///
    /// Derived artifacts follow the new name.
    pub fn rename_file(&self, file: &PhysicalFile, new_name: &str) -> Result<Arc<PhysicalFile>> {
        validate_name(new_name)?;
        let folder = Arc::clone(file.folder());
        if new_name == file.name() {
            return self.file_in(&folder, new_name);
        }

        let source = file.path();
        let target = folder.path().join(new_name);
        ensure_vacant(&target)?;
        fs::rename(&source, &target).map_err(|e| FolioError::from_io(e, source.display()))?;
        debug!(from = %source.display(), to = %target.display(), "renamed file");

        if let Err(e) = folder.derived_cache().rename_for(file.name(), new_name) {
            warn!(file = %target.display(), error = %e, "failed to rename derived artifacts");
        }

        Ok(self.rekey_file(file, Arc::new(PhysicalFile::new(folder, new_name))))
    }

    /// Move `file` into `destination`, keeping its name.
    ///
    /// Derived artifacts are not carried over; those at the old location are
    /// deleted.
    pub fn move_file(
        &self,
        file: &PhysicalFile,
        destination: &Arc<PhysicalFolder>,
    ) -> Result<Arc<PhysicalFile>> {
        if destination.path() == file.folder().path() {
            return self.file_in(destination, file.name());
        }

        let source = file.path();
        let target = destination.path().join(file.name());
        ensure_vacant(&target)?;
        fs::rename(&source, &target).map_err(|e| FolioError::from_io(e, source.display()))?;
        debug!(from = %source.display(), to = %target.display(), "moved file");

        if let Err(e) = file.folder().derived_cache().delete_for(file.name()) {
            warn!(file = %source.display(), error = %e, "failed to delete derived artifacts");
        }

        Ok(self.rekey_file(
            file,
            Arc::new(PhysicalFile::new(Arc::clone(destination), file.name())),
        ))
    }

    /// Unlink `file` and delete its derived artifacts.
    pub fn delete_file(&self, file: &PhysicalFile) -> Result<()> {
        let path = file.path();
        fs::remove_file(&path).map_err(|e| FolioError::from_io(e, path.display()))?;
        debug!(path = %path.display(), "deleted file");

        if let Err(e) = file.folder().derived_cache().delete_for(file.name()) {
            warn!(file = %path.display(), error = %e, "failed to delete derived artifacts");
        }

        lock(&self.files).evict(CacheKey::Path(&file.key()));
        Ok(())
    }

    fn rekey_file(&self, old: &PhysicalFile, new: Arc<PhysicalFile>) -> Arc<PhysicalFile> {
        let mut files = lock(&self.files);
        let new = files.insert(new.key(), None, new);
        files.evict(CacheKey::Path(&old.key()));
        new
    }

    fn relocate_folder(&self, folder: &PhysicalFolder, target: PathBuf) -> Result<Arc<PhysicalFolder>> {
        ensure_vacant(&target)?;
        fs::rename(folder.path(), &target)
            .map_err(|e| FolioError::from_io(e, folder.path().display()))?;
        debug!(from = %folder.path().display(), to = %target.display(), "relocated folder");

        let relocated = self.folder(&target)?;
        lock(&self.files).evict_prefix(folder.key());
        lock(&self.folders).evict_prefix(folder.key());
        Ok(relocated)
    }

    fn movable_parent(&self, folder: &PhysicalFolder) -> Result<PathBuf> {
        if self.is_root(folder) {
            return Err(FolioError::Validation(
                "the assets root cannot be renamed, moved or deleted".to_string(),
            ));
        }
        folder
            .path()
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| FolioError::Validation(format!("{} has no parent", folder.path().display())))
    }

    fn validate_folder_name(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        if name == self.cache_dir {
            return Err(FolioError::Validation(format!(
                "'{name}' is reserved for derived artifacts"
            )));
        }
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        fs::canonicalize(&path).map_err(|e| FolioError::from_io(e, path.display()))
    }

    fn check_inside(&self, canonical: &Path) -> Result<()> {
        let relative = canonical.strip_prefix(&self.root).map_err(|_| {
            FolioError::Validation(format!("{} is outside the assets root", canonical.display()))
        })?;
        if relative
            .components()
            .any(|c| c.as_os_str() == self.cache_dir.as_str())
        {
            return Err(FolioError::Validation(format!(
                "{} lies inside a derived-artifact cache",
                canonical.display()
            )));
        }
        Ok(())
    }
}

/// Create `path`, which must not exist, and fill it with `fill`. A file
/// left half-written by a failing `fill` is removed again.
fn create_new_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let mut file = fs::File::options()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| FolioError::from_io(e, path.display()))?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!(file = %path.display(), error = %cleanup, "failed to remove partial file");
        }
        return Err(FolioError::from_io(e, path.display()));
    }
    Ok(())
}

fn ensure_vacant(target: &Path) -> Result<()> {
    if fs::symlink_metadata(target).is_ok() {
        return Err(FolioError::AlreadyExists(target.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("upload.bin");

        let result = create_new_with(&path, |file| {
            file.write_all(b"half")?;
            Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_create_new_with_refuses_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("taken.bin");
        fs::write(&path, b"keep").unwrap();

        let result = create_new_with(&path, |file| file.write_all(b"other"));

        assert!(matches!(result, Err(FolioError::AlreadyExists(_))));
        assert_eq!(fs::read(&path).unwrap(), b"keep");
    }

    fn setup_store() -> (TempDir, PhysicalStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = PhysicalStore::new(temp_dir.path().join("assets"), ".cache").unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("assets");
        assert!(!root.exists());

        let store = PhysicalStore::new(&root, ".cache").unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), fs::canonicalize(&root).unwrap());
    }

    #[test]
    fn test_folder_lookup_returns_same_handle() {
        let (_temp_dir, store) = setup_store();
        fs::create_dir(store.root().join("docs")).unwrap();

        let a = store.folder_at("docs/").unwrap();
        let b = store.folder(store.root().join("docs")).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.relative_path(&a).unwrap(), "docs/");
    }

    #[test]
    fn test_folder_not_found() {
        let (_temp_dir, store) = setup_store();
        assert!(matches!(
            store.folder_at("missing/"),
            Err(FolioError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_folder_outside_root_rejected() {
        let (temp_dir, store) = setup_store();
        assert!(matches!(
            store.folder(temp_dir.path()),
            Err(FolioError::Validation(_))
        ));
        assert!(matches!(
            store.folder_at("../"),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn test_cache_dir_is_not_a_folder() {
        let (_temp_dir, store) = setup_store();
        fs::create_dir(store.root().join(".cache")).unwrap();

        assert!(matches!(
            store.folder_at(".cache/"),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn test_root_relative_path_and_parent() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let docs = store.create_folder(&root, "docs").unwrap();

        assert_eq!(store.relative_path(&root).unwrap(), "");
        assert!(store.parent_of(&root).unwrap().is_none());
        assert!(Arc::ptr_eq(&store.parent_of(&docs).unwrap().unwrap(), &root));
    }

    #[test]
    fn test_create_folder_conflict() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        store.create_folder(&root, "docs").unwrap();

        assert!(matches!(
            store.create_folder(&root, "docs"),
            Err(FolioError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.create_folder(&root, ".cache"),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn test_rename_folder_evicts_old_handles() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let docs = store.create_folder(&root, "docs").unwrap();
        let inner = store.create_folder(&docs, "inner").unwrap();

        let renamed = store.rename_folder(&docs, "papers").unwrap();

        assert_eq!(store.relative_path(&renamed).unwrap(), "papers/");
        assert!(!docs.exists());
        assert!(!inner.exists());
        let inner_again = store.folder_at("papers/inner/").unwrap();
        assert!(!Arc::ptr_eq(&inner, &inner_again));
    }

    #[test]
    fn test_rename_folder_conflict() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let a = store.create_folder(&root, "a").unwrap();
        store.create_folder(&root, "b").unwrap();

        assert!(matches!(
            store.rename_folder(&a, "b"),
            Err(FolioError::AlreadyExists(_))
        ));
        assert!(a.exists());
    }

    #[test]
    fn test_move_folder() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let a = store.create_folder(&root, "a").unwrap();
        let b = store.create_folder(&root, "b").unwrap();

        let moved = store.move_folder(&a, &b).unwrap();
        assert_eq!(store.relative_path(&moved).unwrap(), "b/a/");

        assert!(matches!(
            store.move_folder(&b, &moved),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn test_root_is_immovable() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();

        assert!(matches!(
            store.rename_folder(&root, "x"),
            Err(FolioError::Validation(_))
        ));
        assert!(matches!(
            store.delete_folder(&root),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn test_write_and_lookup_file() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();

        let written = store.write_file(&root, "a.txt", b"abc").unwrap();
        let found = store.file(store.root().join("a.txt")).unwrap();

        assert!(Arc::ptr_eq(&written, &found));
        assert_eq!(found.read().unwrap(), b"abc");
        assert!(matches!(
            store.write_file(&root, "a.txt", b"again"),
            Err(FolioError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_rename_file_moves_artifacts() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let file = store.write_file(&root, "report.pdf", b"%PDF").unwrap();
        root.derived_cache()
            .store("report.pdf", ".thumb.png", b"t")
            .unwrap();

        let renamed = store.rename_file(&file, "summary.pdf").unwrap();

        assert_eq!(renamed.name(), "summary.pdf");
        assert!(!file.exists());
        assert!(renamed.exists());
        assert!(root.derived_cache().list_for("report.pdf").unwrap().is_empty());
        assert_eq!(root.derived_cache().list_for("summary.pdf").unwrap().len(), 1);
    }

    #[test]
    fn test_rename_file_conflict_leaves_source() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let a = store.write_file(&root, "a.txt", b"a").unwrap();
        store.write_file(&root, "b.txt", b"b").unwrap();

        assert!(matches!(
            store.rename_file(&a, "b.txt"),
            Err(FolioError::AlreadyExists(_))
        ));
        assert_eq!(a.read().unwrap(), b"a");
    }

    #[test]
    fn test_move_file_drops_artifacts() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let dest = store.create_folder(&root, "dest").unwrap();
        let file = store.write_file(&root, "photo.jpg", b"jpg").unwrap();
        root.derived_cache().store("photo.jpg", "@1", b"1").unwrap();
        root.derived_cache().store("photo.jpg", "@2", b"2").unwrap();

        let moved = store.move_file(&file, &dest).unwrap();

        assert!(moved.exists());
        assert!(Arc::ptr_eq(moved.folder(), &dest));
        assert!(root.derived_cache().list_for("photo.jpg").unwrap().is_empty());
        assert!(dest.derived_cache().list_for("photo.jpg").unwrap().is_empty());
    }

    #[test]
    fn test_delete_file() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        let file = store.write_file(&root, "gone.txt", b"x").unwrap();
        root.derived_cache().store("gone.txt", ".bak", b"x").unwrap();

        store.delete_file(&file).unwrap();

        assert!(!file.exists());
        assert!(root.derived_cache().list_for("gone.txt").unwrap().is_empty());
        assert!(matches!(
            store.delete_file(&file),
            Err(FolioError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_listing() {
        let (_temp_dir, store) = setup_store();
        let root = store.root_folder().unwrap();
        store.create_folder(&root, "b").unwrap();
        store.create_folder(&root, "a").unwrap();
        store.write_file(&root, "x.txt", b"").unwrap();
        root.derived_cache().store("x.txt", "@1", b"").unwrap();

        let names: Vec<_> = store
            .subfolders(&root)
            .unwrap()
            .iter()
            .map(|f| f.name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.files_in(&root).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }
}
