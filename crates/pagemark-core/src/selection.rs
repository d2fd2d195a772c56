//! Selection classification for bulk actions

use serde::Serialize;

use crate::rows::Row;

/// Facts about a multi-row selection that drive which bulk actions apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    /// Exactly one group header and no bookmarks (e.g. rename a tag)
    pub exactly_one_header_no_bookmarks: bool,
    /// At least one header or bookmark (e.g. delete)
    pub any_selection: bool,
    /// Bookmarks only (e.g. tag the selection)
    pub only_bookmarks_no_headers: bool,
}

/// Classify a selection of rows
///
/// Group headers are tag headers and the untagged header; current-page
/// shortcut rows and section headers count as neither header nor bookmark.
pub fn classify_selection(rows: &[Row]) -> SelectionSummary {
    let headers = rows.iter().filter(|r| r.is_bookmark_header()).count();
    let bookmarks = rows.iter().filter(|r| r.is_bookmark()).count();

    SelectionSummary {
        exactly_one_header_no_bookmarks: headers == 1 && bookmarks == 0,
        any_selection: headers + bookmarks > 0,
        only_bookmarks_no_headers: headers == 0 && bookmarks > 0,
    }
}
