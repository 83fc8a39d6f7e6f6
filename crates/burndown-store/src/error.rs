//! Error types for the store module.

use burndown_core::{Revision, StoryId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Document not found.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A document with this id already exists.
    #[error("document already exists: {0}")]
    AlreadyExists(StoryId),

    /// The presented revision is stale: another writer updated the document.
    #[error("revision conflict on {id}: presented {presented}, stored {stored}")]
    RevisionConflict {
        id: StoryId,
        presented: Revision,
        stored: Revision,
    },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure injected by a test harness.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
