//! Pagemark Core Library
//!
//! This crate provides the bookmark list view-model for Pagemark, a reader
//! that keeps page and verse bookmarks organised by tag.
//!
//! # Architecture
//!
//! - **Owner task**: a single tokio task owns all view state (cache, attached
//!   consumer, pending deletion) and is driven through a [`ViewModelHandle`]
//! - **Workers**: store loads, text hydration and row building run on
//!   blocking worker threads and report back to the owner
//! - **Change fan-in**: bookmark, tag and last-page changes are merged into
//!   one invalidation stream
//!
//! # Quick Start
//!
//! ```text
//! let store = Arc::new(LocalStore::with_path(config.bookmarks_path())?);
//! let settings = Arc::new(Settings::with_path(config.settings_path())?);
//! let handle = spawn_view_model(store, None, settings, (&config).into());
//!
//! let (sink, mut views) = ChannelSink::channel();
//! handle.bind(ConsumerId::next(), sink).await?;
//! let first = views.recv().await;
//! ```
//!
//! # Modules
//!
//! - `handle`: Owner task and its handle (main entry point)
//! - `view_model`: View state and its transitions
//! - `rows`: Row builder
//! - `tag_index`: Bookmarks bucketed by tag
//! - `changes`: Change coordinator
//! - `cache`: View cache and attached consumer
//! - `deletion`: Deferred deletion engine and view prediction
//! - `selection`: Bulk-action availability for a selection
//! - `storage`: Bookmark store trait and the local JSON store
//! - `hydrate`: Verse text hydration
//! - `preferences`: Persisted user preferences
//! - `sink`: Display sinks
//! - `config`: Application configuration

pub mod cache;
pub mod changes;
pub mod config;
pub mod deletion;
pub mod error;
pub mod handle;
pub mod hydrate;
pub mod models;
pub mod preferences;
pub mod rows;
pub mod selection;
pub mod sink;
pub mod storage;
pub mod tag_index;
pub mod view_model;

pub use changes::{ChangeCoordinator, ChangeEvent, ChangeStream, Invalidation};
pub use config::Config;
pub use deletion::{predict_view, DeletionEngine, DeletionPhase};
pub use error::ViewModelError;
pub use handle::{spawn_view_model, ViewModelHandle};
pub use hydrate::{HydrationError, TextHydrator, VerseTextFile};
pub use models::{
    Bookmark, BookmarkData, BookmarkId, Location, PageRange, SortOrder, Tag, TagId,
};
pub use preferences::{Preferences, Settings};
pub use rows::{build_rows, validate_last_page, InvalidLastPage, Row, RowKey, View, ViewRequest};
pub use selection::{classify_selection, SelectionSummary};
pub use sink::{ChannelSink, ConsumerId, DisplaySink, SinkEvent, ViewSource};
pub use storage::{BookmarkStore, LocalStore, StorageError, StorageResult};
pub use tag_index::{TagIndex, TagKey};
pub use view_model::{BookmarkViewModel, ViewModelOptions, ViewSettings};
