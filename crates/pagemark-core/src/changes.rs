//! Change coordination
//!
//! Collaborators publish their own change streams (bookmarks, tags, the
//! last-read page). The coordinator fans them into a single invalidation
//! stream regardless of how many sources are registered.

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

/// Which collaborator changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Bookmarks,
    Tags,
    LastPage,
}

/// A boxed stream of change events
pub type ChangeStream = BoxStream<'static, ChangeEvent>;

/// A single "the derived view is stale" tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    /// The change that caused it
    pub cause: ChangeEvent,
}

/// Adapt a broadcast receiver into a change stream
///
/// A lagging receiver still yields one event per lag, since any missed event
/// means the view is stale anyway. The stream ends when every sender is gone.
pub fn broadcast_stream(
    rx: broadcast::Receiver<ChangeEvent>,
    lagged_as: ChangeEvent,
) -> ChangeStream {
    stream::unfold(rx, move |mut rx| async move {
        match rx.recv().await {
            Ok(event) => Some((event, rx)),
            Err(broadcast::error::RecvError::Lagged(_)) => Some((lagged_as, rx)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
    .boxed()
}

/// Fan-in of change sources
#[derive(Default)]
pub struct ChangeCoordinator {
    sources: Vec<ChangeStream>,
}

impl ChangeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register another source
    pub fn with_source(mut self, source: ChangeStream) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// The merged invalidation stream
    ///
    /// Ends once every source has ended.
    pub fn invalidations(self) -> BoxStream<'static, Invalidation> {
        stream::select_all(self.sources)
            .map(|cause| Invalidation { cause })
            .boxed()
    }
}
