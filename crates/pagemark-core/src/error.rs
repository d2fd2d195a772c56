//! View-model errors

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the view-model and its handle
#[derive(Error, Debug)]
pub enum ViewModelError {
    /// The store failed to load or remove data
    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    /// A worker task panicked or was aborted
    #[error("Background task failed: {0}")]
    Worker(String),

    /// The owner task has stopped
    #[error("View model is no longer running")]
    Closed,
}
