//! Display sinks
//!
//! A sink is the consumer attached to the view-model. It receives every
//! view the owner task decides to show, tagged with where it came from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ViewModelError;
use crate::rows::View;

/// Where a delivered view came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    /// Recomputed from the store
    Fresh,
    /// Served from the cache
    Cached,
    /// Cached view with the pending deletion applied
    Predicted,
    /// Rebuilt after a deferred deletion was committed
    Committed,
}

/// Receives views on the owner task
pub trait DisplaySink: Send {
    fn on_new_view(&mut self, view: Arc<View>, source: ViewSource);

    /// A deferred deletion could not be committed
    fn on_deletion_failed(&mut self, _error: &ViewModelError) {}
}

/// Identity of an attached consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Events forwarded by [`ChannelSink`]
#[derive(Debug, Clone)]
pub enum SinkEvent {
    View { view: Arc<View>, source: ViewSource },
    DeletionFailed(String),
}

/// Sink that forwards everything to an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    /// A sink and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DisplaySink for ChannelSink {
    fn on_new_view(&mut self, view: Arc<View>, source: ViewSource) {
        let _ = self.tx.send(SinkEvent::View { view, source });
    }

    fn on_deletion_failed(&mut self, error: &ViewModelError) {
        let _ = self.tx.send(SinkEvent::DeletionFailed(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_ids_unique() {
        assert_ne!(ConsumerId::next(), ConsumerId::next());
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (mut sink, mut rx) = ChannelSink::channel();
        sink.on_new_view(Arc::new(View::default()), ViewSource::Cached);
        sink.on_deletion_failed(&ViewModelError::Closed);

        match rx.try_recv().unwrap() {
            SinkEvent::View { source, .. } => assert_eq!(source, ViewSource::Cached),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::DeletionFailed(_)));
    }
}
