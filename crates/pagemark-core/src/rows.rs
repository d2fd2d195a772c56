//! Row builder
//!
//! Turns raw bookmark and tag data into the ordered rows a display sink
//! renders. Everything here is a pure function of its inputs.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    sort_tags, Bookmark, BookmarkData, BookmarkId, PageRange, SortOrder, Tag, TagId,
};
use crate::tag_index::TagIndex;

/// One display-ready entry in the bookmark list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Row {
    /// Header of a tag group
    TagHeader { tag: Tag },
    /// Header of the group of bookmarks without tags
    UntaggedHeader,
    /// Header of the page bookmarks section
    PageBookmarksHeader,
    /// Header of the verse bookmarks section
    VerseBookmarksHeader,
    /// Header of the "continue reading" shortcut
    CurrentPageHeader,
    /// Shortcut to the last read page
    CurrentPage { page: u32 },
    /// A bookmark, with the tag group it is listed under when grouping
    Bookmark {
        bookmark: Bookmark,
        tag_id: Option<TagId>,
    },
}

/// Stable identity of a row, independent of hydrated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    TagHeader(TagId),
    UntaggedHeader,
    PageBookmarksHeader,
    VerseBookmarksHeader,
    CurrentPageHeader,
    CurrentPage(u32),
    Bookmark { id: BookmarkId, tag: Option<TagId> },
}

impl Row {
    pub fn key(&self) -> RowKey {
        match self {
            Row::TagHeader { tag } => RowKey::TagHeader(tag.id),
            Row::UntaggedHeader => RowKey::UntaggedHeader,
            Row::PageBookmarksHeader => RowKey::PageBookmarksHeader,
            Row::VerseBookmarksHeader => RowKey::VerseBookmarksHeader,
            Row::CurrentPageHeader => RowKey::CurrentPageHeader,
            Row::CurrentPage { page } => RowKey::CurrentPage(*page),
            Row::Bookmark { bookmark, tag_id } => RowKey::Bookmark {
                id: bookmark.id,
                tag: *tag_id,
            },
        }
    }

    /// Any header row
    pub fn is_header(&self) -> bool {
        !matches!(self, Row::Bookmark { .. } | Row::CurrentPage { .. })
    }

    /// Header of a bookmark group (a tag or the untagged group)
    pub fn is_bookmark_header(&self) -> bool {
        matches!(self, Row::TagHeader { .. } | Row::UntaggedHeader)
    }

    pub fn is_bookmark(&self) -> bool {
        matches!(self, Row::Bookmark { .. })
    }

    fn bookmark_row(bookmark: &Bookmark, tag_id: Option<TagId>) -> Self {
        Row::Bookmark {
            bookmark: bookmark.clone(),
            tag_id,
        }
    }
}

/// Rows plus the tag lookup the rows refer to
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct View {
    pub rows: Vec<Row>,
    pub tags: BTreeMap<TagId, Tag>,
}

impl View {
    /// Build a view from freshly loaded data
    pub fn build(data: &BookmarkData, request: &ViewRequest) -> Self {
        Self {
            rows: build_rows(&data.tags, &data.bookmarks, request),
            tags: tag_map(&data.tags),
        }
    }

    pub fn keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(Row::key).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inputs that shape a view besides the store contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRequest {
    /// Order the store materialises bookmarks in
    pub sort_order: SortOrder,
    pub group_by_tags: bool,
    /// Raw last-read page preference, `None` when nothing was saved
    pub last_page: Option<i64>,
    pub pages: PageRange,
}

/// Last-read page outside the valid range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid last saved page {page} (valid pages are {first}..={last})")]
pub struct InvalidLastPage {
    pub page: i64,
    pub first: u32,
    pub last: u32,
}

/// Check the last-read page preference against the valid page range
pub fn validate_last_page(
    raw: Option<i64>,
    pages: PageRange,
) -> Result<Option<u32>, InvalidLastPage> {
    match raw {
        None => Ok(None),
        Some(page) if pages.contains(page) => Ok(u32::try_from(page).ok()),
        Some(page) => Err(InvalidLastPage {
            page,
            first: pages.first,
            last: pages.last,
        }),
    }
}

/// Build the ordered row list
///
/// Bookmarks are expected in the order the store materialised them for
/// `request.sort_order`; they are never re-sorted here. Tags are emitted in
/// alphabetical order.
pub fn build_rows(tags: &[Tag], bookmarks: &[Bookmark], request: &ViewRequest) -> Vec<Row> {
    let mut rows = if request.group_by_tags {
        rows_grouped_by_tags(tags, bookmarks)
    } else {
        rows_by_kind(bookmarks)
    };

    let last_page = validate_last_page(request.last_page, request.pages).unwrap_or_else(|e| {
        warn!("Omitting current page shortcut: {}", e);
        None
    });

    if let Some(page) = last_page {
        rows.insert(0, Row::CurrentPageHeader);
        rows.insert(1, Row::CurrentPage { page });
    }

    rows
}

fn rows_grouped_by_tags(tags: &[Tag], bookmarks: &[Bookmark]) -> Vec<Row> {
    let mut tags = tags.to_vec();
    sort_tags(&mut tags);

    let index = TagIndex::build(&tags, bookmarks);
    let mut rows = Vec::with_capacity(tags.len() + bookmarks.len() + 1);

    for tag in tags {
        let tagged = index.tagged(tag.id);
        let tag_id = tag.id;
        rows.push(Row::TagHeader { tag });
        rows.extend(tagged.iter().map(|b| Row::bookmark_row(b, Some(tag_id))));
    }

    let untagged = index.untagged();
    if !untagged.is_empty() {
        rows.push(Row::UntaggedHeader);
        rows.extend(untagged.iter().map(|b| Row::bookmark_row(b, None)));
    }

    rows
}

fn rows_by_kind(bookmarks: &[Bookmark]) -> Vec<Row> {
    let (pages, verses): (Vec<&Bookmark>, Vec<&Bookmark>) =
        bookmarks.iter().partition(|b| b.is_page_bookmark());

    let mut rows = Vec::with_capacity(bookmarks.len() + 2);
    if !pages.is_empty() {
        rows.push(Row::PageBookmarksHeader);
        rows.extend(pages.into_iter().map(|b| Row::bookmark_row(b, None)));
    }
    if !verses.is_empty() {
        rows.push(Row::VerseBookmarksHeader);
        rows.extend(verses.into_iter().map(|b| Row::bookmark_row(b, None)));
    }
    rows
}

/// Tag lookup keyed by id
pub fn tag_map(tags: &[Tag]) -> BTreeMap<TagId, Tag> {
    tags.iter().map(|t| (t.id, t.clone())).collect()
}
