//! Deferred deletion
//!
//! Deleting rows is optimistic: the rows disappear from the display at once
//! through a predicted view, while the actual store removal waits for a
//! delay during which the user can cancel. Scheduling again before the delay
//! runs out merges the new rows into the pending set and restarts the delay.
//!
//! The engine itself only tracks state. Timers run as separate tokio tasks
//! which report expiry back to the owner by generation number, so a timer
//! that fires after it was superseded is simply ignored.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::TagId;
use crate::rows::{Row, RowKey, View};

/// Default delay before a scheduled deletion is committed
pub const DEFAULT_DELETION_DELAY: Duration = Duration::from_millis(4000);

/// Coarse state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPhase {
    Idle,
    /// Waiting for the delay to run out; can still be cancelled
    Pending,
    /// Store removal in progress
    Committing,
}

struct PendingDeletion {
    rows: Vec<Row>,
    generation: u64,
    cancel: CancellationToken,
}

struct Committing {
    rows: Vec<Row>,
    generation: u64,
}

/// Timer for one pending generation
#[derive(Debug, Clone)]
pub struct ScheduledTimer {
    pub generation: u64,
    pub delay: Duration,
    cancel: CancellationToken,
}

impl ScheduledTimer {
    /// Run the timer on the current runtime
    ///
    /// `on_due` is called with the generation once the delay has passed,
    /// unless the timer was cancelled first.
    pub fn spawn<F>(self, on_due: F) -> JoinHandle<()>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Deletion timer {} cancelled", self.generation);
                }
                _ = tokio::time::sleep(self.delay) => on_due(self.generation),
            }
        })
    }
}

/// Pending and committing deletions
pub struct DeletionEngine {
    delay: Duration,
    next_generation: u64,
    pending: Option<PendingDeletion>,
    committing: Vec<Committing>,
}

impl Default for DeletionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DELETION_DELAY)
    }
}

impl DeletionEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_generation: 1,
            pending: None,
            committing: Vec::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn phase(&self) -> DeletionPhase {
        if self.pending.is_some() {
            DeletionPhase::Pending
        } else if !self.committing.is_empty() {
            DeletionPhase::Committing
        } else {
            DeletionPhase::Idle
        }
    }

    /// Whether views should currently be predicted rather than served as-is
    pub fn is_active(&self) -> bool {
        self.phase() != DeletionPhase::Idle
    }

    /// Add rows to the pending set and restart the delay
    ///
    /// The caller must spawn the returned timer; the previous timer, if any,
    /// has already been cancelled.
    pub fn schedule(&mut self, rows: Vec<Row>) -> ScheduledTimer {
        let mut merged = match self.pending.take() {
            Some(previous) => {
                previous.cancel.cancel();
                previous.rows
            }
            None => Vec::new(),
        };

        let mut seen: HashSet<RowKey> = merged.iter().map(Row::key).collect();
        for row in rows {
            if seen.insert(row.key()) {
                merged.push(row);
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let cancel = CancellationToken::new();

        debug!(
            "Scheduled deletion of {} rows (generation {})",
            merged.len(),
            generation
        );

        self.pending = Some(PendingDeletion {
            rows: merged,
            generation,
            cancel: cancel.clone(),
        });

        ScheduledTimer {
            generation,
            delay: self.delay,
            cancel,
        }
    }

    /// Drop the pending set; returns whether anything was pending
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.cancel.cancel();
                debug!("Cancelled deletion generation {}", pending.generation);
                true
            }
            None => {
                if !self.committing.is_empty() {
                    debug!("Deletion already committing, nothing to cancel");
                }
                false
            }
        }
    }

    /// Rows the display should treat as already gone
    pub fn predicted_rows(&self) -> Vec<Row> {
        self.committing
            .iter()
            .flat_map(|c| c.rows.iter())
            .chain(self.pending.iter().flat_map(|p| p.rows.iter()))
            .cloned()
            .collect()
    }

    /// Rows still waiting for the delay
    pub fn pending_rows(&self) -> &[Row] {
        self.pending.as_ref().map_or(&[], |p| p.rows.as_slice())
    }

    /// Move the pending set to committing if `generation` is still current
    pub fn take_due(&mut self, generation: u64) -> Option<Vec<Row>> {
        match self.pending.take() {
            Some(pending) if pending.generation == generation => {
                self.committing.push(Committing {
                    rows: pending.rows.clone(),
                    generation,
                });
                Some(pending.rows)
            }
            other => {
                debug!("Ignoring stale deletion timer {}", generation);
                self.pending = other;
                None
            }
        }
    }

    /// Forget a committing generation once the store call returned
    pub fn finish(&mut self, generation: u64) {
        self.committing.retain(|c| c.generation != generation);
    }
}

/// Predict the view after `remove` is deleted
///
/// Returns `None` without a view to start from. Removed rows are dropped, a
/// section header is dropped when its section loses its last bookmark, and
/// tags whose header was removed or whose bookmarks all went are dropped
/// from the tag map.
pub fn predict_view(view: Option<&View>, remove: &[Row]) -> Option<View> {
    let view = view?;
    let removed: HashSet<RowKey> = remove.iter().map(Row::key).collect();
    let is_removed = |row: &Row| removed.contains(&row.key());

    let mut emptied_headers = HashSet::new();
    let mut section: Option<(RowKey, usize, usize)> = None;
    let close = |section: Option<(RowKey, usize, usize)>, emptied: &mut HashSet<RowKey>| {
        if let Some((header, before, after)) = section {
            if before > 0 && after == 0 {
                emptied.insert(header);
            }
        }
    };

    for row in &view.rows {
        if row.is_header() {
            close(section.take(), &mut emptied_headers);
            section = Some((row.key(), 0, 0));
        } else if row.is_bookmark() {
            if let Some((_, before, after)) = section.as_mut() {
                *before += 1;
                if !is_removed(row) {
                    *after += 1;
                }
            }
        }
    }
    close(section, &mut emptied_headers);

    let rows: Vec<Row> = view
        .rows
        .iter()
        .filter(|row| !is_removed(row) && !emptied_headers.contains(&row.key()))
        .cloned()
        .collect();

    let mut counts: BTreeMap<TagId, (usize, usize)> = BTreeMap::new();
    for row in &view.rows {
        if let Row::Bookmark { bookmark, tag_id } = row {
            let owners = match tag_id {
                Some(tag) => std::slice::from_ref(tag),
                None => bookmark.tags.as_slice(),
            };
            for tag in owners {
                let entry = counts.entry(*tag).or_default();
                entry.0 += 1;
                if !is_removed(row) {
                    entry.1 += 1;
                }
            }
        }
    }

    let tags = view
        .tags
        .iter()
        .filter(|(id, _)| {
            let header = RowKey::TagHeader(**id);
            let emptied = counts
                .get(*id)
                .is_some_and(|(before, after)| *before > 0 && *after == 0);
            !removed.contains(&header) && !emptied_headers.contains(&header) && !emptied
        })
        .map(|(id, tag)| (*id, tag.clone()))
        .collect();

    Some(View { rows, tags })
}
