//! Verse text hydration
//!
//! Fills in the text of verse bookmarks. Hydration is best-effort: any
//! failure leaves the bookmarks as they were loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::{Bookmark, BookmarkData, Location};
use crate::storage::persistence::read_if_exists;
use crate::storage::StorageError;

/// Errors from a text hydrator
#[derive(Error, Debug)]
pub enum HydrationError {
    /// Verse text source could not be read
    #[error("Verse text unavailable: {0}")]
    Unavailable(#[from] StorageError),

    /// Verse text source is malformed
    #[error("Invalid verse text file '{path}': {details}")]
    InvalidFormat { path: PathBuf, details: String },

    /// Source-specific failure
    #[error("Hydration failed: {0}")]
    Failed(String),
}

/// Looks up verse text for bookmarks
pub trait TextHydrator: Send + Sync {
    /// Return the bookmarks with `text` filled in where known
    fn hydrate(&self, bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, HydrationError>;
}

/// Hydrate loaded data, keeping it un-hydrated on any failure
///
/// A missing hydrator (unavailable from the start) is not retried; a failing
/// one is simply tried again on the next load.
pub fn hydrate_or_keep(hydrator: Option<&dyn TextHydrator>, data: BookmarkData) -> BookmarkData {
    let Some(hydrator) = hydrator else {
        return data;
    };

    match hydrator.hydrate(&data.bookmarks) {
        Ok(bookmarks) => BookmarkData {
            tags: data.tags,
            bookmarks,
        },
        Err(e) => {
            debug!("Falling back to un-hydrated bookmarks: {}", e);
            data
        }
    }
}

/// Verse text loaded from a JSON object of `"sura:ayah": "text"` entries
#[derive(Debug, Default)]
pub struct VerseTextFile {
    verses: HashMap<(u32, u32), String>,
}

impl VerseTextFile {
    /// Load verse text from a file
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn open(path: &Path) -> Result<Option<Self>, HydrationError> {
        let Some(json) = read_if_exists(path)? else {
            return Ok(None);
        };
        Self::parse(&json)
            .map(Some)
            .map_err(|details| HydrationError::InvalidFormat {
                path: path.to_path_buf(),
                details,
            })
    }

    fn parse(json: &str) -> Result<Self, String> {
        let raw: HashMap<String, String> = serde_json::from_str(json).map_err(|e| e.to_string())?;
        let mut verses = HashMap::with_capacity(raw.len());
        for (key, text) in raw {
            verses.insert(parse_verse_key(&key)?, text);
        }
        Ok(Self { verses })
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}

fn parse_verse_key(key: &str) -> Result<(u32, u32), String> {
    let (sura, ayah) = key
        .split_once(':')
        .ok_or_else(|| format!("expected sura:ayah, got '{}'", key))?;
    let sura = sura.trim().parse().map_err(|_| format!("bad sura in '{}'", key))?;
    let ayah = ayah.trim().parse().map_err(|_| format!("bad ayah in '{}'", key))?;
    Ok((sura, ayah))
}

impl TextHydrator for VerseTextFile {
    fn hydrate(&self, bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, HydrationError> {
        Ok(bookmarks
            .iter()
            .map(|bookmark| {
                let mut bookmark = bookmark.clone();
                if let Location::Verse { sura, ayah, .. } = bookmark.location {
                    if let Some(text) = self.verses.get(&(sura, ayah)) {
                        bookmark.text = Some(text.clone());
                    }
                }
                bookmark
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookmarkId, Tag, TagId};
    use tempfile::TempDir;

    struct Broken;

    impl TextHydrator for Broken {
        fn hydrate(&self, _bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, HydrationError> {
            Err(HydrationError::Failed("database closed".to_string()))
        }
    }

    fn data() -> BookmarkData {
        BookmarkData {
            tags: vec![Tag::new(TagId(1), "a")],
            bookmarks: vec![
                Bookmark::new(BookmarkId(1), Location::Page { page: 1 }),
                Bookmark::new(
                    BookmarkId(2),
                    Location::Verse {
                        page: 1,
                        sura: 1,
                        ayah: 1,
                    },
                ),
            ],
        }
    }

    fn verses() -> VerseTextFile {
        VerseTextFile::parse(r#"{"1:1": "In the name of God"}"#).unwrap()
    }

    #[test]
    fn test_hydrates_verse_bookmarks_only() {
        let hydrated = hydrate_or_keep(Some(&verses()), data());
        assert_eq!(hydrated.bookmarks[0].text, None);
        assert_eq!(hydrated.bookmarks[1].text.as_deref(), Some("In the name of God"));
        assert_eq!(hydrated.tags.len(), 1);
    }

    #[test]
    fn test_failure_falls_back() {
        let original = data();
        let result = hydrate_or_keep(Some(&Broken), original.clone());
        assert_eq!(result, original);
    }

    #[test]
    fn test_missing_hydrator_keeps_data() {
        let original = data();
        assert_eq!(hydrate_or_keep(None, original.clone()), original);
    }

    #[test]
    fn test_open_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = VerseTextFile::open(&temp_dir.path().join("verses.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_open_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("verses.json");
        std::fs::write(&path, r#"{"2:255": "Ayat al-Kursi", "1:1": "Bismillah"}"#).unwrap();

        let verses = VerseTextFile::open(&path).unwrap().unwrap();
        assert_eq!(verses.len(), 2);
    }

    #[test]
    fn test_bad_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("verses.json");
        std::fs::write(&path, r#"{"two": "x"}"#).unwrap();

        let err = VerseTextFile::open(&path).unwrap_err();
        assert!(matches!(err, HydrationError::InvalidFormat { .. }));
    }
}
