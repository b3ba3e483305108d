//! Physical file handles.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use super::folder::PhysicalFolder;
use crate::{FolioError, Result};

/// MIME type reported when the file name gives no hint.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A regular file on disk, owned by exactly one [`PhysicalFolder`].
#[derive(Debug)]
pub struct PhysicalFile {
    name: String,
    folder: Arc<PhysicalFolder>,
    mime_type: OnceLock<String>,
}

impl PhysicalFile {
    pub(crate) fn new(folder: Arc<PhysicalFolder>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder,
            mime_type: OnceLock::new(),
        }
    }

    /// File name without any directory part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning folder.
    pub fn folder(&self) -> &Arc<PhysicalFolder> {
        &self.folder
    }

    /// Absolute path.
    pub fn path(&self) -> PathBuf {
        self.folder.path().join(&self.name)
    }

    /// Identity key (absolute path as a string).
    pub fn key(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    /// Whether the file still exists.
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// MIME type guessed from the file name, read once.
    pub fn mime_type(&self) -> &str {
        self.mime_type.get_or_init(|| guess_mime_type(&self.name))
    }

    /// Size in bytes.
    pub fn size(&self) -> Result<u64> {
        let path = self.path();
        fs::metadata(&path)
            .map(|m| m.len())
            .map_err(|e| FolioError::from_io(e, path.display()))
    }

    /// Read the whole file.
    pub fn read(&self) -> Result<Vec<u8>> {
        let path = self.path();
        fs::read(&path).map_err(|e| FolioError::from_io(e, path.display()))
    }
}

/// Guess a MIME type from a file name.
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_file(name: &str, content: &[u8]) -> (TempDir, PhysicalFile) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(name), content).unwrap();
        let folder = Arc::new(PhysicalFolder::new(temp_dir.path().to_path_buf(), ".cache"));
        (temp_dir, PhysicalFile::new(folder, name))
    }

    #[test]
    fn test_path_and_size() {
        let (temp_dir, file) = setup_file("notes.txt", b"Hello, World!");

        assert_eq!(file.path(), temp_dir.path().join("notes.txt"));
        assert!(file.exists());
        assert_eq!(file.size().unwrap(), 13);
        assert_eq!(file.read().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_mime_type() {
        let (_temp_dir, file) = setup_file("photo.JPG", b"");
        assert_eq!(file.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_unknown_mime_type() {
        assert_eq!(guess_mime_type("blob.zzzunknown"), DEFAULT_MIME_TYPE);
        assert_eq!(guess_mime_type("no_extension"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_size_of_missing_file() {
        let (temp_dir, file) = setup_file("gone.txt", b"x");
        fs::remove_file(temp_dir.path().join("gone.txt")).unwrap();

        assert!(!file.exists());
        assert!(matches!(file.size(), Err(FolioError::PathNotFound(_))));
    }
}
