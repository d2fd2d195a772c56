//! Local bookmark store
//!
//! Keeps bookmarks and tags in memory behind a lock. When opened with a path
//! every mutation is written back to a JSON file before it becomes visible,
//! so a failed write leaves both the file and the in-memory state untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::persistence::{atomic_write, read_if_exists};
use super::BookmarkStore;
use crate::changes::{broadcast_stream, ChangeEvent, ChangeStream};
use crate::models::{
    sort_tags, Bookmark, BookmarkData, BookmarkId, Location, SortOrder, Tag, TagId,
};
use crate::rows::Row;

const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    bookmarks: Vec<Bookmark>,
}

impl StoreData {
    fn next_tag_id(&self) -> TagId {
        TagId(self.tags.iter().map(|t| t.id.0).max().unwrap_or(0) + 1)
    }

    fn next_bookmark_id(&self) -> BookmarkId {
        BookmarkId(self.bookmarks.iter().map(|b| b.id.0).max().unwrap_or(0) + 1)
    }

    /// Tags carried by at least one bookmark
    fn populated_tags(&self) -> HashSet<TagId> {
        self.bookmarks
            .iter()
            .flat_map(|b| b.tags.iter().copied())
            .collect()
    }

    fn bookmark_mut(&mut self, id: BookmarkId) -> StorageResult<&mut Bookmark> {
        self.bookmarks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StorageError::BookmarkNotFound(id))
    }

    fn ensure_tag(&self, id: TagId) -> StorageResult<()> {
        if self.tags.iter().any(|t| t.id == id) {
            Ok(())
        } else {
            Err(StorageError::TagNotFound(id))
        }
    }
}

/// What a batch of rows asks the store to remove
#[derive(Debug, Default)]
struct Removal {
    tags: HashSet<TagId>,
    bookmarks: HashSet<BookmarkId>,
    untag: Vec<(BookmarkId, TagId)>,
}

impl Removal {
    fn from_rows(rows: &[Row]) -> Self {
        let mut removal = Self::default();
        for row in rows {
            match row {
                Row::TagHeader { tag } => {
                    removal.tags.insert(tag.id);
                }
                Row::Bookmark {
                    bookmark,
                    tag_id: Some(tag),
                } => removal.untag.push((bookmark.id, *tag)),
                Row::Bookmark {
                    bookmark,
                    tag_id: None,
                } => {
                    removal.bookmarks.insert(bookmark.id);
                }
                _ => {}
            }
        }
        removal
    }

    fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.bookmarks.is_empty() && self.untag.is_empty()
    }

    /// Apply the removal, returning tags deleted because the batch left them
    /// without bookmarks
    fn apply(&self, data: &mut StoreData) -> Vec<Tag> {
        let populated_before = data.populated_tags();

        data.tags.retain(|t| !self.tags.contains(&t.id));
        data.bookmarks.retain(|b| !self.bookmarks.contains(&b.id));
        for bookmark in &mut data.bookmarks {
            bookmark.tags.retain(|t| !self.tags.contains(t));
        }

        let mut emptied = HashSet::new();
        for (id, tag) in &self.untag {
            if let Some(bookmark) = data.bookmarks.iter_mut().find(|b| b.id == *id) {
                bookmark.remove_tag(*tag);
                if bookmark.tags.is_empty() {
                    emptied.insert(*id);
                }
            }
        }
        data.bookmarks.retain(|b| !emptied.contains(&b.id));

        let populated_after = data.populated_tags();
        let (pruned, kept): (Vec<Tag>, Vec<Tag>) = std::mem::take(&mut data.tags)
            .into_iter()
            .partition(|t| populated_before.contains(&t.id) && !populated_after.contains(&t.id));
        data.tags = kept;
        pruned
    }
}

/// In-memory bookmark store with optional JSON persistence
pub struct LocalStore {
    data: Mutex<StoreData>,
    path: Option<PathBuf>,
    bookmarks_tx: broadcast::Sender<ChangeEvent>,
    tags_tx: broadcast::Sender<ChangeEvent>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::from_data(StoreData::default(), None)
    }
}

impl LocalStore {
    /// Create an empty store (in-memory only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store persisted at `path`, loading existing data if present
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        let data = match read_if_exists(&path)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| StorageError::InvalidFormat {
                path: path.clone(),
                details: e.to_string(),
            })?,
            None => StoreData::default(),
        };
        Ok(Self::from_data(data, Some(path)))
    }

    fn from_data(data: StoreData, path: Option<PathBuf>) -> Self {
        let (bookmarks_tx, _) = broadcast::channel(CHANGE_CAPACITY);
        let (tags_tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            data: Mutex::new(data),
            path,
            bookmarks_tx,
            tags_tx,
        }
    }

    /// File backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ==================== Tag Operations ====================

    /// Add a tag with a unique name
    pub fn add_tag(&self, name: impl Into<String>) -> StorageResult<Tag> {
        let name = name.into();
        let tag = self.update(|data| {
            if data.tags.iter().any(|t| t.name == name) {
                return Err(StorageError::DuplicateTag(name));
            }
            let tag = Tag::new(data.next_tag_id(), name);
            data.tags.push(tag.clone());
            Ok(tag)
        })?;
        self.notify(&[ChangeEvent::Tags]);
        Ok(tag)
    }

    /// All tags, alphabetical
    pub fn tags(&self) -> StorageResult<Vec<Tag>> {
        let mut tags = self.lock()?.tags.clone();
        sort_tags(&mut tags);
        Ok(tags)
    }

    // ==================== Bookmark Operations ====================

    /// Add a bookmark carrying the given (existing) tags
    pub fn add_bookmark(&self, location: Location, tags: &[TagId]) -> StorageResult<Bookmark> {
        let bookmark = self.update(|data| {
            for tag in tags {
                data.ensure_tag(*tag)?;
            }
            let mut bookmark = Bookmark::new(data.next_bookmark_id(), location);
            tags.iter().for_each(|t| bookmark.add_tag(*t));
            data.bookmarks.push(bookmark.clone());
            Ok(bookmark)
        })?;
        self.notify(&[ChangeEvent::Bookmarks]);
        Ok(bookmark)
    }

    /// Attach an existing tag to an existing bookmark
    pub fn tag_bookmark(&self, bookmark: BookmarkId, tag: TagId) -> StorageResult<()> {
        self.update(|data| {
            data.ensure_tag(tag)?;
            data.bookmark_mut(bookmark)?.add_tag(tag);
            Ok(())
        })?;
        self.notify(&[ChangeEvent::Bookmarks]);
        Ok(())
    }

    /// All bookmarks in insertion order
    pub fn bookmarks(&self) -> StorageResult<Vec<Bookmark>> {
        Ok(self.lock()?.bookmarks.clone())
    }

    /// Get a bookmark by id
    pub fn bookmark(&self, id: BookmarkId) -> StorageResult<Option<Bookmark>> {
        Ok(self.lock()?.bookmarks.iter().find(|b| b.id == id).cloned())
    }

    pub fn bookmark_count(&self) -> StorageResult<usize> {
        Ok(self.lock()?.bookmarks.len())
    }

    // ==================== Internals ====================

    fn lock(&self) -> StorageResult<MutexGuard<'_, StoreData>> {
        self.data.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Apply a mutation to a copy, persist it, then publish it
    fn update<T>(
        &self,
        mutate: impl FnOnce(&mut StoreData) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut data = self.lock()?;
        let mut next = data.clone();
        let result = mutate(&mut next)?;
        self.save(&next)?;
        *data = next;
        Ok(result)
    }

    fn save(&self, data: &StoreData) -> StorageResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(data)?;
        atomic_write(path, &json)
    }

    fn notify(&self, events: &[ChangeEvent]) {
        for event in events {
            let tx = match event {
                ChangeEvent::Tags => &self.tags_tx,
                _ => &self.bookmarks_tx,
            };
            // No subscribers is fine
            let _ = tx.send(*event);
        }
    }
}

impl BookmarkStore for LocalStore {
    fn bookmark_changes(&self) -> ChangeStream {
        broadcast_stream(self.bookmarks_tx.subscribe(), ChangeEvent::Bookmarks)
    }

    fn tag_changes(&self) -> ChangeStream {
        broadcast_stream(self.tags_tx.subscribe(), ChangeEvent::Tags)
    }

    fn load(&self, sort_order: SortOrder) -> StorageResult<BookmarkData> {
        let data = self.lock()?;
        let mut tags = data.tags.clone();
        let mut bookmarks = data.bookmarks.clone();
        drop(data);

        sort_tags(&mut tags);
        sort_order.sort(&mut bookmarks);
        Ok(BookmarkData { tags, bookmarks })
    }

    fn remove_items(&self, rows: &[Row]) -> StorageResult<()> {
        let removal = Removal::from_rows(rows);
        if removal.is_empty() {
            debug!("Nothing removable among {} rows", rows.len());
            return Ok(());
        }

        let pruned = self.update(|data| Ok(removal.apply(data)))?;
        for tag in &pruned {
            debug!(tag = %tag.name, id = %tag.id, "Deleted tag left without bookmarks");
        }
        debug!(
            tags = removal.tags.len(),
            bookmarks = removal.bookmarks.len(),
            untagged = removal.untag.len(),
            "Removed items"
        );
        self.notify(&[ChangeEvent::Bookmarks, ChangeEvent::Tags]);
        Ok(())
    }
}
