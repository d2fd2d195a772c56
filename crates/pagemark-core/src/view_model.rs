//! Bookmark view-model
//!
//! [`BookmarkViewModel`] owns every piece of mutable view state: the sort
//! order and grouping mode, the view cache with its attached consumer, and
//! the deferred deletion engine. It is driven by a single owner task (see
//! [`crate::handle`]) and never blocks: store access runs on blocking worker
//! threads whose results come back as [`WorkerEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cache::ViewCache;
use crate::changes::Invalidation;
use crate::config::Config;
use crate::deletion::{predict_view, DeletionEngine, DeletionPhase, DEFAULT_DELETION_DELAY};
use crate::error::ViewModelError;
use crate::hydrate::{hydrate_or_keep, TextHydrator};
use crate::models::{PageRange, SortOrder};
use crate::preferences::Preferences;
use crate::rows::{Row, View, ViewRequest};
use crate::sink::{ConsumerId, DisplaySink, ViewSource};
use crate::storage::BookmarkStore;

/// Tunables for a view-model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModelOptions {
    /// How long a scheduled deletion waits before it is committed
    pub deletion_delay: Duration,
    /// Valid last-read pages
    pub pages: PageRange,
}

impl Default for ViewModelOptions {
    fn default() -> Self {
        Self {
            deletion_delay: DEFAULT_DELETION_DELAY,
            pages: PageRange::default(),
        }
    }
}

impl From<&Config> for ViewModelOptions {
    fn from(config: &Config) -> Self {
        Self {
            deletion_delay: config.deletion_delay(),
            pages: config.page_range(),
        }
    }
}

/// Current sort and grouping settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    pub sort_order: SortOrder,
    pub group_by_tags: bool,
}

impl ViewSettings {
    /// Bookmark rows show their tags inline only when not grouped by them
    pub fn should_show_inline_tags(&self) -> bool {
        !self.group_by_tags
    }
}

/// Results reported back to the owner task
#[derive(Debug)]
pub enum WorkerEvent {
    /// A recomputation started at `epoch` finished
    Loaded {
        epoch: u64,
        result: Result<View, ViewModelError>,
    },
    /// The delay of a scheduled deletion ran out
    DeletionDue { generation: u64 },
    /// A deletion was committed and the view rebuilt
    Committed {
        generation: u64,
        result: Result<View, ViewModelError>,
    },
}

/// Load, hydrate and build a view
///
/// Blocking; run it on a worker thread.
pub fn compute_view(
    store: &dyn BookmarkStore,
    hydrator: Option<&dyn TextHydrator>,
    request: &ViewRequest,
) -> Result<View, ViewModelError> {
    let data = store.load(request.sort_order)?;
    let data = hydrate_or_keep(hydrator, data);
    Ok(View::build(&data, request))
}

/// View state, owned by a single task
pub struct BookmarkViewModel {
    store: Arc<dyn BookmarkStore>,
    hydrator: Option<Arc<dyn TextHydrator>>,
    preferences: Arc<dyn Preferences>,
    pages: PageRange,
    sort_order: SortOrder,
    group_by_tags: bool,
    cache: ViewCache,
    deletion: DeletionEngine,
    /// Bumped by every load and invalidation; only a load from the current
    /// epoch may fill the cache
    epoch: u64,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl BookmarkViewModel {
    /// Create a view-model reporting worker results to `events`
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        hydrator: Option<Arc<dyn TextHydrator>>,
        preferences: Arc<dyn Preferences>,
        options: ViewModelOptions,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let sort_order = preferences.sort_order();
        let group_by_tags = preferences.group_by_tags();
        Self {
            store,
            hydrator,
            preferences,
            pages: options.pages,
            sort_order,
            group_by_tags,
            cache: ViewCache::new(),
            deletion: DeletionEngine::new(options.deletion_delay),
            epoch: 0,
            events,
        }
    }

    pub fn settings(&self) -> ViewSettings {
        ViewSettings {
            sort_order: self.sort_order,
            group_by_tags: self.group_by_tags,
        }
    }

    /// Attach a consumer and send it a view
    pub fn bind(&mut self, consumer: ConsumerId, sink: Box<dyn DisplaySink>) {
        let allow_cache = self.cache.attach(consumer, sink, self.preferences.is_rtl());
        if !allow_cache {
            debug!("Text direction changed, bypassing cached view");
        }
        self.request_view(allow_cache);
    }

    pub fn unbind(&mut self, consumer: ConsumerId) {
        if !self.cache.detach(consumer) {
            debug!("Ignoring unbind from a consumer that is not attached");
        }
    }

    /// Serve the cached view if allowed, otherwise recompute
    pub fn request_view(&mut self, allow_cache: bool) {
        match self.cache.get().cloned() {
            Some(view) if allow_cache => {
                debug!("Sending cached bookmark view");
                self.present(view, ViewSource::Cached);
            }
            _ => {
                debug!("Requesting bookmark view from the store");
                self.spawn_load();
            }
        }
    }

    pub fn on_invalidated(&mut self, invalidation: Invalidation) {
        debug!("Bookmark view invalidated by {:?}", invalidation.cause);
        self.epoch += 1;
        if self.cache.is_attached() {
            self.request_view(false);
        } else {
            self.cache.invalidate();
        }
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) {
        self.sort_order = sort_order;
        self.preferences.set_sort_order(sort_order);
        self.request_view(false);
    }

    /// Flip the grouping mode, returning the new one
    pub fn toggle_group_by_tags(&mut self) -> bool {
        self.group_by_tags = !self.group_by_tags;
        self.preferences.set_group_by_tags(self.group_by_tags);
        info!(
            group_by_tags = self.group_by_tags,
            "Grouping bookmarks by {}",
            if self.group_by_tags { "tag" } else { "kind" }
        );
        self.request_view(false);
        self.group_by_tags
    }

    /// Start (or extend) a deferred deletion and show its prediction
    pub fn schedule_deletion(&mut self, rows: Vec<Row>) {
        debug!(
            "Deleting {} rows in {:?} unless cancelled",
            rows.len(),
            self.deletion.delay()
        );
        let events = self.events.clone();
        self.deletion.schedule(rows).spawn(move |generation| {
            let _ = events.send(WorkerEvent::DeletionDue { generation });
        });

        if let Some(view) = self.cache.get().cloned() {
            self.present(view, ViewSource::Cached);
        }
    }

    /// Drop the pending deletion; returns whether one was pending
    pub fn cancel_deletion(&mut self) -> bool {
        let cancelled = self.deletion.cancel();
        if cancelled {
            if let Some(view) = self.cache.get().cloned() {
                self.present(view, ViewSource::Cached);
            }
        }
        cancelled
    }

    /// The cached view with `rows` removed, `None` before the first view
    pub fn predict_view_after_deletion(&self, rows: &[Row]) -> Option<View> {
        predict_view(self.cache.get().map(Arc::as_ref), rows)
    }

    pub fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Loaded { epoch, .. } if epoch != self.epoch => {
                debug!("Discarding bookmark view from superseded load {}", epoch);
            }
            WorkerEvent::Loaded {
                result: Ok(view), ..
            } => {
                let view = Arc::new(view);
                self.cache.replace(view.clone());
                self.present(view, ViewSource::Fresh);
            }
            WorkerEvent::Loaded { result: Err(e), .. } => {
                error!("Failed to load bookmarks: {}", e);
            }
            WorkerEvent::DeletionDue { generation } => {
                if let Some(rows) = self.deletion.take_due(generation) {
                    self.spawn_commit(generation, rows);
                }
            }
            WorkerEvent::Committed { generation, result } => {
                self.deletion.finish(generation);
                match result {
                    Ok(view) => {
                        let view = Arc::new(view);
                        self.cache.replace(view.clone());
                        self.present(view, ViewSource::Committed);
                    }
                    Err(e) => {
                        error!("Failed to remove bookmarks: {}", e);
                        self.cache.report_failure(&e);
                    }
                }
            }
        }
    }

    pub fn deletion_phase(&self) -> DeletionPhase {
        self.deletion.phase()
    }

    /// Stop pending work before the owner task exits
    pub fn shutdown(&mut self) {
        if self.deletion.cancel() {
            debug!("Dropped pending deletion on shutdown");
        }
    }

    /// Deliver `view`, or its prediction while a deletion is underway
    fn present(&mut self, view: Arc<View>, source: ViewSource) {
        if self.deletion.is_active() {
            let removed = self.deletion.predicted_rows();
            if let Some(predicted) = predict_view(Some(&view), &removed) {
                self.cache.deliver(Arc::new(predicted), ViewSource::Predicted);
            }
        } else {
            self.cache.deliver(view, source);
        }
    }

    fn view_request(&self) -> ViewRequest {
        ViewRequest {
            sort_order: self.sort_order,
            group_by_tags: self.group_by_tags,
            last_page: self.preferences.last_page(),
            pages: self.pages,
        }
    }

    fn spawn_load(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        let store = self.store.clone();
        let hydrator = self.hydrator.clone();
        let request = self.view_request();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                compute_view(store.as_ref(), hydrator.as_deref(), &request)
            })
            .await
            .unwrap_or_else(|e| Err(ViewModelError::Worker(e.to_string())));
            let _ = events.send(WorkerEvent::Loaded { epoch, result });
        });
    }

    fn spawn_commit(&self, generation: u64, rows: Vec<Row>) {
        let store = self.store.clone();
        let hydrator = self.hydrator.clone();
        let request = self.view_request();
        let events = self.events.clone();

        debug!("Committing deletion of {} rows", rows.len());
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                store.remove_items(&rows)?;
                compute_view(store.as_ref(), hydrator.as_deref(), &request)
            })
            .await
            .unwrap_or_else(|e| Err(ViewModelError::Worker(e.to_string())));
            let _ = events.send(WorkerEvent::Committed { generation, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeEvent;
    use crate::models::{Location, TagId};
    use crate::preferences::Settings;
    use crate::rows::RowKey;
    use crate::sink::{ChannelSink, SinkEvent};
    use crate::storage::{LocalStore, StorageError, StorageResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// `LocalStore` whose next load can be held back and whose removals can
    /// be made to fail
    struct ScriptedStore {
        inner: Arc<LocalStore>,
        gate: Mutex<Option<Gate>>,
        failing_removals: AtomicUsize,
    }

    struct Gate {
        read: std::sync::mpsc::Sender<()>,
        release: std::sync::mpsc::Receiver<()>,
    }

    /// Test side of a held load
    struct HeldLoad {
        read: std::sync::mpsc::Receiver<()>,
        release: std::sync::mpsc::Sender<()>,
    }

    impl ScriptedStore {
        fn new(inner: Arc<LocalStore>) -> Self {
            Self {
                inner,
                gate: Mutex::new(None),
                failing_removals: AtomicUsize::new(0),
            }
        }

        /// The next load reads the store, reports it, then waits for release
        fn hold_next_load(&self) -> HeldLoad {
            let (read_tx, read) = std::sync::mpsc::channel();
            let (release, release_rx) = std::sync::mpsc::channel();
            *self.gate.lock().unwrap() = Some(Gate {
                read: read_tx,
                release: release_rx,
            });
            HeldLoad { read, release }
        }

        fn fail_removals(&self, count: usize) {
            self.failing_removals.store(count, Ordering::SeqCst);
        }
    }

    impl BookmarkStore for ScriptedStore {
        fn bookmark_changes(&self) -> crate::changes::ChangeStream {
            self.inner.bookmark_changes()
        }

        fn tag_changes(&self) -> crate::changes::ChangeStream {
            self.inner.tag_changes()
        }

        fn load(&self, sort_order: SortOrder) -> StorageResult<crate::models::BookmarkData> {
            let data = self.inner.load(sort_order)?;
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.read.send(());
                let _ = gate.release.recv();
            }
            Ok(data)
        }

        fn remove_items(&self, rows: &[Row]) -> StorageResult<()> {
            let failing = self.failing_removals.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_removals.store(failing - 1, Ordering::SeqCst);
                return Err(StorageError::Poisoned);
            }
            self.inner.remove_items(rows)
        }
    }

    struct Fixture {
        model: BookmarkViewModel,
        events: mpsc::UnboundedReceiver<WorkerEvent>,
        store: Arc<LocalStore>,
        scripted: Arc<ScriptedStore>,
        settings: Arc<Settings>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(LocalStore::new());
            let tag = store.add_tag("notes").unwrap();
            store
                .add_bookmark(Location::Page { page: 5 }, &[tag.id])
                .unwrap();
            store
                .add_bookmark(
                    Location::Verse {
                        page: 2,
                        sura: 2,
                        ayah: 255,
                    },
                    &[],
                )
                .unwrap();

            let scripted = Arc::new(ScriptedStore::new(store.clone()));
            let settings = Arc::new(Settings::new());
            let (tx, events) = mpsc::unbounded_channel();
            let model = BookmarkViewModel::new(
                scripted.clone(),
                None,
                settings.clone(),
                ViewModelOptions::default(),
                tx,
            );
            Self {
                model,
                events,
                store,
                scripted,
                settings,
            }
        }

        /// Feed the next worker result back into the model
        async fn pump(&mut self) {
            let event = self.events.recv().await.unwrap();
            self.model.handle_worker_event(event);
        }

        fn bind(&mut self) -> (ConsumerId, mpsc::UnboundedReceiver<SinkEvent>) {
            let id = ConsumerId::next();
            let (sink, rx) = ChannelSink::channel();
            self.model.bind(id, Box::new(sink));
            (id, rx)
        }
    }

    fn next_view(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> (Arc<View>, ViewSource) {
        match rx.try_recv().unwrap() {
            SinkEvent::View { view, source } => (view, source),
            other => panic!("expected a view, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_loads_then_reuses_cache() {
        let mut f = Fixture::new();
        let (id, mut rx) = f.bind();
        f.pump().await;

        let (view, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Fresh);
        assert_eq!(view.rows[0], Row::PageBookmarksHeader);

        f.model.unbind(id);
        let (_, mut rx) = f.bind();
        let (cached, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Cached);
        assert!(Arc::ptr_eq(&view, &cached));
    }

    #[tokio::test]
    async fn test_rtl_change_bypasses_cache() {
        let mut f = Fixture::new();
        let (id, _rx) = f.bind();
        f.pump().await;
        f.model.unbind(id);

        f.settings.set_arabic_names(true).unwrap();
        let (_, mut rx) = f.bind();
        assert!(rx.try_recv().is_err());

        f.pump().await;
        assert_eq!(next_view(&mut rx).1, ViewSource::Fresh);
    }

    #[tokio::test]
    async fn test_invalidation_while_detached_drops_cache() {
        let mut f = Fixture::new();
        let (id, _rx) = f.bind();
        f.pump().await;
        f.model.unbind(id);

        f.model.on_invalidated(Invalidation {
            cause: ChangeEvent::Bookmarks,
        });
        assert!(f.model.predict_view_after_deletion(&[]).is_none());

        let (_, mut rx) = f.bind();
        assert!(rx.try_recv().is_err());
        f.pump().await;
        assert_eq!(next_view(&mut rx).1, ViewSource::Fresh);
    }

    #[tokio::test]
    async fn test_toggle_group_by_tags() {
        let mut f = Fixture::new();
        let (_, mut rx) = f.bind();
        f.pump().await;
        next_view(&mut rx);

        assert!(f.model.toggle_group_by_tags());
        assert!(f.settings.group_by_tags());
        assert!(!f.model.settings().should_show_inline_tags());

        f.pump().await;
        let (view, _) = next_view(&mut rx);
        assert_eq!(view.rows[0].key(), RowKey::TagHeader(TagId(1)));
    }

    #[tokio::test]
    async fn test_set_sort_order_persists() {
        let mut f = Fixture::new();
        f.model.set_sort_order(SortOrder::Location);
        assert_eq!(f.settings.sort_order(), SortOrder::Location);
        assert_eq!(f.model.settings().sort_order, SortOrder::Location);
        f.pump().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_predicts_then_commits() {
        let mut f = Fixture::new();
        let (_, mut rx) = f.bind();
        f.pump().await;
        let (view, _) = next_view(&mut rx);

        let verse = view.rows.last().unwrap().clone();
        f.model.schedule_deletion(vec![verse]);

        let (predicted, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Predicted);
        assert!(!predicted.keys().contains(&RowKey::VerseBookmarksHeader));
        assert_eq!(f.store.bookmark_count().unwrap(), 2);

        // Timer, then the commit
        f.pump().await;
        f.pump().await;
        let (committed, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Committed);
        assert_eq!(committed.keys(), predicted.keys());
        assert_eq!(f.store.bookmark_count().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_redelivers_cached_view() {
        let mut f = Fixture::new();
        let (_, mut rx) = f.bind();
        f.pump().await;
        let (view, _) = next_view(&mut rx);

        f.model.schedule_deletion(vec![view.rows[1].clone()]);
        next_view(&mut rx);

        assert!(f.model.cancel_deletion());
        let (restored, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Cached);
        assert!(Arc::ptr_eq(&view, &restored));
        assert!(!f.model.cancel_deletion());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.store.bookmark_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_finishing_after_detached_invalidation_is_not_cached() {
        let mut f = Fixture::new();
        let held = f.scripted.hold_next_load();
        let (id, _rx) = f.bind();
        f.model.unbind(id);

        // The held load has read two bookmarks
        let read = held.read;
        tokio::task::spawn_blocking(move || read.recv())
            .await
            .unwrap()
            .unwrap();
        f.store
            .add_bookmark(Location::Page { page: 9 }, &[])
            .unwrap();
        f.model.on_invalidated(Invalidation {
            cause: ChangeEvent::Bookmarks,
        });

        held.release.send(()).unwrap();
        f.pump().await;
        assert!(f.model.predict_view_after_deletion(&[]).is_none());

        let (_, mut rx) = f.bind();
        assert!(rx.try_recv().is_err());
        f.pump().await;
        let (view, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Fresh);
        let bookmarks = view.rows.iter().filter(|r| r.is_bookmark()).count();
        assert_eq!(bookmarks, 3);
    }

    #[tokio::test]
    async fn test_only_latest_load_is_served() {
        let mut f = Fixture::new();
        let held = f.scripted.hold_next_load();
        let (_, mut rx) = f.bind();

        // Grouping changes while a load is still running
        f.model.toggle_group_by_tags();
        held.release.send(()).unwrap();
        f.pump().await;
        f.pump().await;

        let (view, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Fresh);
        assert_eq!(view.rows[0].key(), RowKey::TagHeader(TagId(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_removal_reports_and_keeps_cache() {
        let mut f = Fixture::new();
        let (_, mut rx) = f.bind();
        f.pump().await;
        let (view, _) = next_view(&mut rx);
        let verse = view.rows.last().unwrap().clone();

        f.scripted.fail_removals(1);
        f.model.schedule_deletion(vec![verse.clone()]);
        assert_eq!(next_view(&mut rx).1, ViewSource::Predicted);

        f.pump().await;
        f.pump().await;
        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::DeletionFailed(_)));
        assert_eq!(f.model.deletion_phase(), DeletionPhase::Idle);
        assert_eq!(f.store.bookmark_count().unwrap(), 2);

        f.model.request_view(true);
        let (cached, source) = next_view(&mut rx);
        assert_eq!(source, ViewSource::Cached);
        assert!(Arc::ptr_eq(&view, &cached));

        // A later deletion goes through
        f.model.schedule_deletion(vec![verse]);
        assert_eq!(next_view(&mut rx).1, ViewSource::Predicted);
        f.pump().await;
        f.pump().await;
        assert_eq!(next_view(&mut rx).1, ViewSource::Committed);
        assert_eq!(f.store.bookmark_count().unwrap(), 1);
    }
}
