//! Owner task
//!
//! The view-model runs on a single tokio task. Everything else talks to it
//! through a cloneable [`ViewModelHandle`]; each call is a command answered
//! once the owner has applied it, so calls from one caller take effect in
//! order.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::changes::{ChangeCoordinator, Invalidation};
use crate::error::ViewModelError;
use crate::hydrate::TextHydrator;
use crate::models::SortOrder;
use crate::preferences::Preferences;
use crate::rows::{Row, View};
use crate::sink::{ConsumerId, DisplaySink};
use crate::storage::BookmarkStore;
use crate::view_model::{BookmarkViewModel, ViewModelOptions, ViewSettings, WorkerEvent};

/// Commands sent to the owner task
enum Command {
    Bind {
        consumer: ConsumerId,
        sink: Box<dyn DisplaySink>,
        reply: oneshot::Sender<()>,
    },
    Unbind {
        consumer: ConsumerId,
        reply: oneshot::Sender<()>,
    },
    RequestView {
        allow_cache: bool,
        reply: oneshot::Sender<()>,
    },
    SetSortOrder {
        sort_order: SortOrder,
        reply: oneshot::Sender<()>,
    },
    ToggleGroupByTags {
        reply: oneshot::Sender<bool>,
    },
    ScheduleDeletion {
        rows: Vec<Row>,
        reply: oneshot::Sender<()>,
    },
    CancelDeletion {
        reply: oneshot::Sender<bool>,
    },
    PredictView {
        rows: Vec<Row>,
        reply: oneshot::Sender<Option<View>>,
    },
    Settings {
        reply: oneshot::Sender<ViewSettings>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running view-model
#[derive(Clone)]
pub struct ViewModelHandle {
    command_tx: mpsc::Sender<Command>,
}

/// Spawn the owner task on the current runtime
///
/// The task listens to the store's bookmark and tag changes and to the
/// last-page preference. It stops on [`ViewModelHandle::shutdown`] or once
/// every handle is dropped.
pub fn spawn_view_model(
    store: Arc<dyn BookmarkStore>,
    hydrator: Option<Arc<dyn TextHydrator>>,
    preferences: Arc<dyn Preferences>,
    options: ViewModelOptions,
) -> ViewModelHandle {
    let coordinator = ChangeCoordinator::new()
        .with_source(store.bookmark_changes())
        .with_source(store.tag_changes())
        .with_source(preferences.last_page_changes());
    debug!(sources = coordinator.source_count(), "Starting view model");
    let invalidations = coordinator.invalidations();

    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let model = BookmarkViewModel::new(store, hydrator, preferences, options, event_tx);

    tokio::spawn(owner_loop(model, command_rx, event_rx, invalidations));

    ViewModelHandle { command_tx }
}

/// Main owner loop
async fn owner_loop(
    mut model: BookmarkViewModel,
    mut command_rx: mpsc::Receiver<Command>,
    mut event_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    mut invalidations: BoxStream<'static, Invalidation>,
) {
    let mut listening = true;

    loop {
        tokio::select! {
            biased;
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown { reply }) => {
                        model.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => handle_command(&mut model, cmd),
                    None => {
                        model.shutdown();
                        break;
                    }
                }
            }
            Some(event) = event_rx.recv() => model.handle_worker_event(event),
            invalidation = invalidations.next(), if listening => {
                match invalidation {
                    Some(invalidation) => model.on_invalidated(invalidation),
                    None => {
                        debug!("All change sources closed");
                        listening = false;
                    }
                }
            }
        }
    }

    debug!("View model stopped");
}

fn handle_command(model: &mut BookmarkViewModel, cmd: Command) {
    match cmd {
        Command::Bind {
            consumer,
            sink,
            reply,
        } => {
            model.bind(consumer, sink);
            let _ = reply.send(());
        }
        Command::Unbind { consumer, reply } => {
            model.unbind(consumer);
            let _ = reply.send(());
        }
        Command::RequestView { allow_cache, reply } => {
            model.request_view(allow_cache);
            let _ = reply.send(());
        }
        Command::SetSortOrder { sort_order, reply } => {
            model.set_sort_order(sort_order);
            let _ = reply.send(());
        }
        Command::ToggleGroupByTags { reply } => {
            let _ = reply.send(model.toggle_group_by_tags());
        }
        Command::ScheduleDeletion { rows, reply } => {
            model.schedule_deletion(rows);
            let _ = reply.send(());
        }
        Command::CancelDeletion { reply } => {
            let _ = reply.send(model.cancel_deletion());
        }
        Command::PredictView { rows, reply } => {
            let _ = reply.send(model.predict_view_after_deletion(&rows));
        }
        Command::Settings { reply } => {
            let _ = reply.send(model.settings());
        }
        // Handled by the loop
        Command::Shutdown { reply } => {
            let _ = reply.send(());
        }
    }
}

impl ViewModelHandle {
    /// Attach `sink` as the consumer; it receives a view right away
    pub async fn bind(
        &self,
        consumer: ConsumerId,
        sink: impl DisplaySink + 'static,
    ) -> Result<(), ViewModelError> {
        let sink = Box::new(sink);
        self.call(|reply| Command::Bind {
            consumer,
            sink,
            reply,
        })
        .await
    }

    /// Detach `consumer` if it is the one attached
    pub async fn unbind(&self, consumer: ConsumerId) -> Result<(), ViewModelError> {
        self.call(|reply| Command::Unbind { consumer, reply }).await
    }

    pub async fn request_view(&self, allow_cache: bool) -> Result<(), ViewModelError> {
        self.call(|reply| Command::RequestView { allow_cache, reply }).await
    }

    pub async fn set_sort_order(&self, sort_order: SortOrder) -> Result<(), ViewModelError> {
        self.call(|reply| Command::SetSortOrder { sort_order, reply }).await
    }

    /// Flip the grouping mode; returns whether bookmarks are now grouped by tag
    pub async fn toggle_group_by_tags(&self) -> Result<bool, ViewModelError> {
        self.call(|reply| Command::ToggleGroupByTags { reply }).await
    }

    /// Delete `rows` after the configured delay, merging with any pending set
    pub async fn schedule_deletion(&self, rows: Vec<Row>) -> Result<(), ViewModelError> {
        self.call(|reply| Command::ScheduleDeletion { rows, reply }).await
    }

    /// Returns whether a pending deletion was cancelled
    pub async fn cancel_deletion(&self) -> Result<bool, ViewModelError> {
        self.call(|reply| Command::CancelDeletion { reply }).await
    }

    pub async fn predict_view_after_deletion(
        &self,
        rows: Vec<Row>,
    ) -> Result<Option<View>, ViewModelError> {
        self.call(|reply| Command::PredictView { rows, reply }).await
    }

    pub async fn settings(&self) -> Result<ViewSettings, ViewModelError> {
        self.call(|reply| Command::Settings { reply }).await
    }

    /// Stop the owner task, dropping any pending deletion
    pub async fn shutdown(&self) -> Result<(), ViewModelError> {
        self.call(|reply| Command::Shutdown { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ViewModelError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(make(reply))
            .await
            .map_err(|_| ViewModelError::Closed)?;
        rx.await.map_err(|_| ViewModelError::Closed)
    }
}
