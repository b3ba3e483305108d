//! Error types for folio.

use std::io;

use thiserror::Error;

/// Common error type for folio.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// OS-level filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A physical file or directory does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The target of a create, rename or move already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No persisted row for the requested path or id.
    #[error("{0} not found")]
    RecordNotFound(String),

    /// The persisted folder structure is broken or not initialized.
    #[error("structural invariant violated: {0}")]
    StructuralInvariant(String),

    /// An obscured name does not match the physical file.
    #[error("referential mismatch: {0}")]
    ReferentialMismatch(String),

    /// The physical side changed but the metadata update failed.
    ///
    /// Physical and persisted state now disagree until the catalog is
    /// re-synchronized.
    #[error("inconsistent state after {operation}: {reason}")]
    Inconsistent {
        /// Operation that was in progress.
        operation: String,
        /// Underlying metadata failure.
        reason: String,
    },

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FolioError {
    /// Whether this error leaves physical and persisted state out of step.
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, FolioError::Inconsistent { .. })
    }

    /// Classify a filesystem error for the entry at `path`.
    pub(crate) fn from_io(err: io::Error, path: impl std::fmt::Display) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FolioError::PathNotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => FolioError::AlreadyExists(path.to_string()),
            _ => FolioError::Io(err),
        }
    }

    /// Wrap a metadata failure that followed a successful physical action.
    pub(crate) fn inconsistent(operation: impl Into<String>, source: FolioError) -> Self {
        FolioError::Inconsistent {
            operation: operation.into(),
            reason: source.to_string(),
        }
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FolioError {
    fn from(e: sqlx::Error) -> Self {
        FolioError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        FolioError::Database(format!("attribute encoding: {e}"))
    }
}

/// Result type alias for folio operations.
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_display() {
        let err = FolioError::RecordNotFound("folder 'docs/'".to_string());
        assert_eq!(err.to_string(), "folder 'docs/' not found");
    }

    #[test]
    fn test_inconsistent_display() {
        let err = FolioError::inconsistent(
            "rename file",
            FolioError::Database("disk I/O error".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "inconsistent state after rename file: database error: disk I/O error"
        );
        assert!(err.is_inconsistency());
    }

    #[test]
    fn test_clean_failures_are_not_inconsistencies() {
        assert!(!FolioError::AlreadyExists("a.txt".to_string()).is_inconsistency());
        assert!(!FolioError::PathNotFound("a.txt".to_string()).is_inconsistency());
    }

    #[test]
    fn test_io_classification() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            FolioError::from_io(not_found, "/tmp/x"),
            FolioError::PathNotFound(p) if p == "/tmp/x"
        ));

        let exists = io::Error::new(io::ErrorKind::AlreadyExists, "taken");
        assert!(matches!(
            FolioError::from_io(exists, "/tmp/y"),
            FolioError::AlreadyExists(_)
        ));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            FolioError::from_io(denied, "/tmp/z"),
            FolioError::Io(_)
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "broken pipe");
        let err: FolioError = io_err.into();
        assert!(matches!(err, FolioError::Io(_)));
        assert!(err.to_string().contains("broken pipe"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(FolioError::Validation("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
