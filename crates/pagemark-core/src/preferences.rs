//! Persisted user preferences
//!
//! Sort order, grouping mode, the last-read page, and whether names are
//! shown right-to-left. Only last-page changes are published: sort order and
//! grouping are changed through the view-model itself.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::changes::{broadcast_stream, ChangeEvent, ChangeStream};
use crate::models::SortOrder;
use crate::storage::persistence::{atomic_write, read_if_exists};
use crate::storage::{StorageError, StorageResult};

/// Preferences consumed by the view-model
pub trait Preferences: Send + Sync {
    fn sort_order(&self) -> SortOrder;
    fn set_sort_order(&self, order: SortOrder);
    fn group_by_tags(&self) -> bool;
    fn set_group_by_tags(&self, group_by_tags: bool);
    /// Raw last-read page, `None` when no page was saved
    fn last_page(&self) -> Option<i64>;
    /// Whether row text is shaped right-to-left
    fn is_rtl(&self) -> bool;
    /// Emits whenever the last-read page changes
    fn last_page_changes(&self) -> ChangeStream;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SettingsData {
    #[serde(default)]
    sort_order: SortOrder,
    #[serde(default)]
    group_by_tags: bool,
    #[serde(default)]
    last_page: Option<i64>,
    #[serde(default)]
    arabic_names: bool,
}

/// Preferences kept in memory and optionally persisted to a TOML file
pub struct Settings {
    data: Mutex<SettingsData>,
    path: Option<PathBuf>,
    last_page_tx: broadcast::Sender<ChangeEvent>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_data(SettingsData::default(), None)
    }
}

impl Settings {
    /// Create in-memory settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Open settings persisted at `path`, using defaults if it doesn't exist
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        let data = match read_if_exists(&path)? {
            Some(content) => toml::from_str(&content).map_err(|e| StorageError::InvalidFormat {
                path: path.clone(),
                details: e.to_string(),
            })?,
            None => SettingsData::default(),
        };
        Ok(Self::from_data(data, Some(path)))
    }

    fn from_data(data: SettingsData, path: Option<PathBuf>) -> Self {
        let (last_page_tx, _) = broadcast::channel(16);
        Self {
            data: Mutex::new(data),
            path,
            last_page_tx,
        }
    }

    /// Record the last-read page (`None` clears it)
    pub fn set_last_page(&self, page: Option<i64>) -> StorageResult<()> {
        let changed = self.update(|data| {
            let changed = data.last_page != page;
            data.last_page = page;
            changed
        })?;
        if changed {
            let _ = self.last_page_tx.send(ChangeEvent::LastPage);
        }
        Ok(())
    }

    /// Show sura names in Arabic (right-to-left)
    pub fn set_arabic_names(&self, arabic_names: bool) -> StorageResult<()> {
        self.update(|data| data.arabic_names = arabic_names)
    }

    fn lock(&self) -> MutexGuard<'_, SettingsData> {
        // The data is plain values; a panicked writer cannot leave it torn
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update<T>(&self, mutate: impl FnOnce(&mut SettingsData) -> T) -> StorageResult<T> {
        let mut data = self.lock();
        let mut next = data.clone();
        let result = mutate(&mut next);
        if let Some(ref path) = self.path {
            let content = toml::to_string_pretty(&next).map_err(|e| StorageError::InvalidFormat {
                path: path.clone(),
                details: e.to_string(),
            })?;
            atomic_write(path, content.as_bytes())?;
        }
        *data = next;
        Ok(result)
    }

    /// Setter used by the trait methods, which cannot fail
    fn update_or_warn(&self, what: &str, mutate: impl FnOnce(&mut SettingsData)) {
        if let Err(e) = self.update(mutate) {
            warn!("Failed to save {} preference: {}", what, e);
        }
    }
}

impl Preferences for Settings {
    fn sort_order(&self) -> SortOrder {
        self.lock().sort_order
    }

    fn set_sort_order(&self, order: SortOrder) {
        self.update_or_warn("sort order", |data| data.sort_order = order);
    }

    fn group_by_tags(&self) -> bool {
        self.lock().group_by_tags
    }

    fn set_group_by_tags(&self, group_by_tags: bool) {
        self.update_or_warn("grouping", |data| data.group_by_tags = group_by_tags);
    }

    fn last_page(&self) -> Option<i64> {
        self.lock().last_page
    }

    fn is_rtl(&self) -> bool {
        self.lock().arabic_names
    }

    fn last_page_changes(&self) -> ChangeStream {
        broadcast_stream(self.last_page_tx.subscribe(), ChangeEvent::LastPage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.sort_order(), SortOrder::DateAdded);
        assert!(!settings.group_by_tags());
        assert_eq!(settings.last_page(), None);
        assert!(!settings.is_rtl());
    }

    #[test]
    fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");

        {
            let settings = Settings::with_path(path.clone()).unwrap();
            settings.set_sort_order(SortOrder::Location);
            settings.set_group_by_tags(true);
            settings.set_last_page(Some(77)).unwrap();
            settings.set_arabic_names(true).unwrap();
        }

        let settings = Settings::with_path(path).unwrap();
        assert_eq!(settings.sort_order(), SortOrder::Location);
        assert!(settings.group_by_tags());
        assert_eq!(settings.last_page(), Some(77));
        assert!(settings.is_rtl());
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "sort_order = [").unwrap();

        assert!(matches!(
            Settings::with_path(path),
            Err(StorageError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_page_changes() {
        let settings = Settings::new();
        let mut changes = settings.last_page_changes();

        settings.set_last_page(Some(3)).unwrap();
        assert_eq!(changes.next().await, Some(ChangeEvent::LastPage));

        // Same value again is not a change
        settings.set_last_page(Some(3)).unwrap();
        settings.set_last_page(None).unwrap();
        assert_eq!(changes.next().await, Some(ChangeEvent::LastPage));
        assert_eq!(settings.last_page(), None);
    }
}
