//! View-model session for commands that show the bookmark list

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use pagemark_core::{
    spawn_view_model, ChannelSink, Config, ConsumerId, LocalStore, Settings, SinkEvent,
    TextHydrator, VerseTextFile, View, ViewModelHandle, ViewSource,
};

/// A running view-model with a channel sink bound to it
pub struct Session {
    pub handle: ViewModelHandle,
    pub store: Arc<LocalStore>,
    views: UnboundedReceiver<SinkEvent>,
}

impl Session {
    /// Open the store and preferences and bind to a fresh view-model
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(open_store(config)?);
        let settings = Arc::new(open_settings(config)?);

        let handle = spawn_view_model(
            store.clone(),
            open_hydrator(config),
            settings,
            config.into(),
        );

        let (sink, views) = ChannelSink::channel();
        handle
            .bind(ConsumerId::next(), sink)
            .await
            .context("View model stopped")?;

        Ok(Self {
            handle,
            store,
            views,
        })
    }

    /// Wait for the next view delivered to the sink
    pub async fn next_view(&mut self) -> Result<(Arc<View>, ViewSource)> {
        match self.views.recv().await {
            Some(SinkEvent::View { view, source }) => Ok((view, source)),
            Some(SinkEvent::DeletionFailed(e)) => bail!("Deletion failed: {}", e),
            None => Err(anyhow!("View model stopped")),
        }
    }

    /// Wait for a view from `source`, skipping others
    pub async fn view_from(&mut self, source: ViewSource) -> Result<Arc<View>> {
        loop {
            let (view, from) = self.next_view().await?;
            if from == source {
                return Ok(view);
            }
        }
    }

    pub async fn close(self) -> Result<()> {
        self.handle.shutdown().await?;
        Ok(())
    }
}

pub fn open_store(config: &Config) -> Result<LocalStore> {
    let path = config.bookmarks_path();
    LocalStore::with_path(path.clone())
        .with_context(|| format!("Failed to open bookmark store: {:?}", path))
}

pub fn open_settings(config: &Config) -> Result<Settings> {
    let path = config.settings_path();
    Settings::with_path(path.clone())
        .with_context(|| format!("Failed to open settings: {:?}", path))
}

/// Verse text is optional; a missing or broken file means no hydration
fn open_hydrator(config: &Config) -> Option<Arc<dyn TextHydrator>> {
    match VerseTextFile::open(&config.verses_path()) {
        Ok(Some(verses)) => Some(Arc::new(verses)),
        Ok(None) => None,
        Err(e) => {
            warn!("Verse text unavailable: {}", e);
            None
        }
    }
}
