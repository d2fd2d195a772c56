//! View cache
//!
//! Holds the last computed view and the attached consumer. Detaching keeps
//! the cached view so a later attach can reuse it if nothing invalidated it
//! in between.

use std::sync::Arc;

use tracing::debug;

use crate::error::ViewModelError;
use crate::rows::View;
use crate::sink::{ConsumerId, DisplaySink, ViewSource};

struct Consumer {
    id: ConsumerId,
    sink: Box<dyn DisplaySink>,
}

/// Cached view plus the consumer it is served to
#[derive(Default)]
pub struct ViewCache {
    view: Option<Arc<View>>,
    consumer: Option<Consumer>,
    rtl: bool,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached view, if any
    pub fn get(&self) -> Option<&Arc<View>> {
        self.view.as_ref()
    }

    /// Replace the cached view
    pub fn replace(&mut self, view: Arc<View>) {
        self.view = Some(view);
    }

    /// Drop the cached view
    pub fn invalidate(&mut self) {
        if self.view.take().is_some() {
            debug!("Dropped cached bookmark view");
        }
    }

    /// Attach a consumer, replacing any previous one
    ///
    /// Returns whether the cache may be served: row text shaping depends on
    /// the text direction, so a direction change since the last attach
    /// requires a recomputation.
    pub fn attach(&mut self, id: ConsumerId, sink: Box<dyn DisplaySink>, rtl: bool) -> bool {
        self.consumer = Some(Consumer { id, sink });
        let unchanged = self.rtl == rtl;
        self.rtl = rtl;
        unchanged
    }

    /// Detach the consumer if it is the one attached
    pub fn detach(&mut self, id: ConsumerId) -> bool {
        if self.consumer.as_ref().is_some_and(|c| c.id == id) {
            self.consumer = None;
            true
        } else {
            false
        }
    }

    pub fn is_attached(&self) -> bool {
        self.consumer.is_some()
    }

    /// Hand a view to the attached consumer, if any
    pub fn deliver(&mut self, view: Arc<View>, source: ViewSource) -> bool {
        match self.consumer.as_mut() {
            Some(consumer) => {
                consumer.sink.on_new_view(view, source);
                true
            }
            None => false,
        }
    }

    /// Tell the attached consumer a deletion failed
    pub fn report_failure(&mut self, error: &ViewModelError) {
        if let Some(consumer) = self.consumer.as_mut() {
            consumer.sink.on_deletion_failed(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, SinkEvent};

    #[test]
    fn test_empty_cache() {
        let cache = ViewCache::new();
        assert!(cache.get().is_none());
        assert!(!cache.is_attached());
    }

    #[test]
    fn test_replace_and_invalidate() {
        let mut cache = ViewCache::new();
        cache.replace(Arc::new(View::default()));
        assert!(cache.get().is_some());
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_attach_reports_rtl_change() {
        let mut cache = ViewCache::new();
        let id = ConsumerId::next();

        let (sink, _rx) = ChannelSink::channel();
        assert!(cache.attach(id, Box::new(sink), false));

        let (sink, _rx) = ChannelSink::channel();
        assert!(!cache.attach(id, Box::new(sink), true));

        let (sink, _rx) = ChannelSink::channel();
        assert!(cache.attach(id, Box::new(sink), true));
    }

    #[test]
    fn test_detach_keeps_view() {
        let mut cache = ViewCache::new();
        let id = ConsumerId::next();
        let (sink, _rx) = ChannelSink::channel();
        cache.attach(id, Box::new(sink), false);
        cache.replace(Arc::new(View::default()));

        assert!(!cache.detach(ConsumerId::next()));
        assert!(cache.is_attached());

        assert!(cache.detach(id));
        assert!(!cache.is_attached());
        assert!(cache.get().is_some());
    }

    #[test]
    fn test_deliver_only_when_attached() {
        let mut cache = ViewCache::new();
        assert!(!cache.deliver(Arc::new(View::default()), ViewSource::Fresh));

        let (sink, mut rx) = ChannelSink::channel();
        cache.attach(ConsumerId::next(), Box::new(sink), false);
        assert!(cache.deliver(Arc::new(View::default()), ViewSource::Fresh));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SinkEvent::View {
                source: ViewSource::Fresh,
                ..
            }
        ));
    }
}
