//! Storage error handling
//!
//! Typed errors for the bookmark store and settings file. I/O failures keep
//! the path and whether it was a read or a write, and the kinds a user can
//! act on carry a suggestion.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{BookmarkId, TagId};

/// Which side of the file an I/O failure happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOp::Read => write!(f, "read"),
            IoOp::Write => write!(f, "write"),
        }
    }
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The data directory or a file in it is not accessible
    #[error("Permission denied: cannot {op} '{path}'")]
    PermissionDenied {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Out of disk space or quota while saving
    #[error("Disk full while saving '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure
    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bookmark or settings file could not be parsed
    #[error("Invalid file '{path}': {details}")]
    InvalidFormat { path: PathBuf, details: String },

    /// Serialization failed
    #[error("Failed to serialize bookmarks: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A tag name is already taken
    #[error("Tag '{0}' already exists")]
    DuplicateTag(String),

    /// Referenced bookmark does not exist
    #[error("Bookmark {0} not found")]
    BookmarkNotFound(BookmarkId),

    /// Referenced tag does not exist
    #[error("Tag {0} not found")]
    TagNotFound(TagId),

    /// Another thread panicked while holding the store lock
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Wrap an I/O error, classifying permission and disk-space failures
    pub fn from_io(op: IoOp, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied { op, path, source }
        } else if op == IoOp::Write && is_disk_full_error(&source) {
            StorageError::DiskFull { path, source }
        } else {
            StorageError::Io { op, path, source }
        }
    }

    /// A hint for the user, if there is an obvious fix
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check the permissions of the data directory (see `pagemark config show`).")
            }
            StorageError::InvalidFormat { .. } => {
                Some("Fix or move the file aside; a fresh one is created on next start.")
            }
            StorageError::DuplicateTag(_) => Some("Pick another name or reuse the existing tag."),
            _ => None,
        }
    }
}

fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Result type for store operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::from_io(IoOp::Read, "/test/path", io_err);

        assert!(matches!(err, StorageError::PermissionDenied { op: IoOp::Read, .. }));
        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().starts_with("Permission denied: cannot read"));
    }

    #[test]
    fn test_disk_full_only_on_write() {
        let full = || io::Error::new(io::ErrorKind::Other, "No space left on device");

        let err = StorageError::from_io(IoOp::Write, "/full/disk", full());
        assert!(matches!(err, StorageError::DiskFull { .. }));
        assert!(err.recovery_suggestion().is_some());

        let err = StorageError::from_io(IoOp::Read, "/full/disk", full());
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_other_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "broken pipe");
        let err = StorageError::from_io(IoOp::Write, "/data/bookmarks.json", io_err);

        assert!(matches!(err, StorageError::Io { op: IoOp::Write, .. }));
        assert!(err.recovery_suggestion().is_none());
        assert!(err.to_string().contains("bookmarks.json"));
    }

    #[test]
    fn test_not_found_display() {
        let err = StorageError::BookmarkNotFound(BookmarkId(12));
        assert_eq!(err.to_string(), "Bookmark 12 not found");
    }
}
