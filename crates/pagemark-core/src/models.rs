//! Data models for pagemark
//!
//! Defines the core data structures: Bookmark, Tag, and the identifiers and
//! orderings the store and the row builder agree on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a bookmark, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub i64);

/// Identifier of a tag, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a bookmark points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// A whole page
    Page { page: u32 },
    /// A single verse, together with the page it is printed on
    Verse { page: u32, sura: u32, ayah: u32 },
}

impl Location {
    /// Page the location lives on
    pub fn page(&self) -> u32 {
        match *self {
            Location::Page { page } | Location::Verse { page, .. } => page,
        }
    }
}

/// A saved bookmark
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bookmark {
    /// Unique identifier
    pub id: BookmarkId,
    /// Page or verse the bookmark points to
    pub location: Location,
    /// Tags this bookmark belongs to
    #[serde(default)]
    pub tags: Vec<TagId>,
    /// When this bookmark was created
    pub added_at: DateTime<Utc>,
    /// Verse text, filled in by a hydrator when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Bookmark {
    /// Create a bookmark with the given id and location
    pub fn new(id: BookmarkId, location: Location) -> Self {
        Self {
            id,
            location,
            tags: Vec::new(),
            added_at: Utc::now(),
            text: None,
        }
    }

    /// Whether this bookmark marks a whole page rather than a verse
    pub fn is_page_bookmark(&self) -> bool {
        matches!(self.location, Location::Page { .. })
    }

    /// Whether this bookmark carries the given tag
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }

    /// Add a tag (no-op if already present)
    pub fn add_tag(&mut self, tag: TagId) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Remove a tag
    pub fn remove_tag(&mut self, tag: TagId) {
        self.tags.retain(|t| *t != tag);
    }
}

/// A named tag for grouping bookmarks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier
    pub id: TagId,
    /// Display name
    pub name: String,
}

impl Tag {
    /// Create a tag
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Sort tags alphabetically by name, ties broken by id
pub fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

/// Order in which the store returns bookmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Newest first
    #[default]
    DateAdded,
    /// By page, then sura and ayah
    Location,
}

impl SortOrder {
    /// Sort bookmarks in place according to this order
    pub fn sort(self, bookmarks: &mut [Bookmark]) {
        match self {
            SortOrder::DateAdded => bookmarks.sort_by(|a, b| {
                b.added_at.cmp(&a.added_at).then(b.id.cmp(&a.id))
            }),
            SortOrder::Location => bookmarks.sort_by_key(|b| {
                let (sura, ayah) = match b.location {
                    Location::Page { .. } => (0, 0),
                    Location::Verse { sura, ayah, .. } => (sura, ayah),
                };
                (b.location.page(), sura, ayah, b.id)
            }),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::DateAdded => write!(f, "date-added"),
            SortOrder::Location => write!(f, "location"),
        }
    }
}

/// Inclusive range of valid page numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub const fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    /// Check a raw page value against the range
    pub fn contains(&self, page: i64) -> bool {
        page >= i64::from(self.first) && page <= i64::from(self.last)
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self::new(1, 604)
    }
}

/// Everything the store returns for one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkData {
    pub tags: Vec<Tag>,
    pub bookmarks: Vec<Bookmark>,
}
