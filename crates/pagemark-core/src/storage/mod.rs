//! Storage layer
//!
//! The view-model only sees the [`BookmarkStore`] trait: change streams, a
//! sorted load, and batch removal of rows. [`LocalStore`] is the bundled
//! implementation, kept in memory and optionally persisted to a JSON file.

pub mod error;
pub mod local;
pub(crate) mod persistence;

pub use error::{StorageError, StorageResult};
pub use local::LocalStore;

use crate::changes::ChangeStream;
use crate::models::{BookmarkData, SortOrder};
use crate::rows::Row;

/// Bookmark and tag storage consumed by the view-model
///
/// Calls may block; the view-model only invokes `load` and `remove_items`
/// from worker threads.
pub trait BookmarkStore: Send + Sync {
    /// Emits whenever bookmarks change
    fn bookmark_changes(&self) -> ChangeStream;

    /// Emits whenever tags change
    fn tag_changes(&self) -> ChangeStream;

    /// All tags (alphabetical) and bookmarks in the requested order
    fn load(&self, sort_order: SortOrder) -> StorageResult<BookmarkData>;

    /// Remove what the given rows stand for
    ///
    /// Tag headers delete the tag. A bookmark row under a tag removes that
    /// tag from the bookmark, deleting the bookmark once it has no tags
    /// left. A bookmark row outside any tag deletes the bookmark. Tags left
    /// without bookmarks by the batch are deleted as well. Other rows are
    /// ignored.
    fn remove_items(&self, rows: &[Row]) -> StorageResult<()>;
}
