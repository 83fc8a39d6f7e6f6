//! Error types for the backlog engines.

use burndown_core::{CircleId, NextId, StructuralError};
use burndown_store::StoreError;
use thiserror::Error;

/// Why a pointer change was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The story would end up pointing at itself.
    SelfReference,
    /// Two or more stories already claim the slot.
    MultipleCandidates,
    /// Collision resolution retargeted more times than allowed.
    DepthExceeded,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::SelfReference => f.write_str("self reference"),
            ConflictReason::MultipleCandidates => f.write_str("multiple candidates"),
            ConflictReason::DepthExceeded => f.write_str("collision depth exceeded"),
        }
    }
}

/// Errors that can occur during backlog operations.
#[derive(Debug, Error)]
pub enum BacklogError {
    /// A pointer collision could not be resolved safely. Retry after a delay.
    #[error("conflict at {target}: {reason}")]
    Conflict {
        target: NextId,
        reason: ConflictReason,
    },

    /// A referenced story does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The chain cannot be traversed; the backlog view is unreliable.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// The circle already holds its maximum number of stories.
    #[error("circle {circle} already holds {limit} stories")]
    LimitReached { circle: CircleId, limit: usize },

    /// The service has not finished starting up.
    #[error("not ready: {0}")]
    NotReady(String),

    /// A settings record is missing or malformed.
    #[error("settings error: {0}")]
    Settings(String),
}

impl From<StoreError> for BacklogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => BacklogError::NotFound(what),
            other => BacklogError::Store(other),
        }
    }
}

/// Coarse classification of an error, for whatever surface reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Try again after a short delay.
    Retryable,
    /// The referenced document is gone.
    NotFound,
    /// The chain is damaged and needs the repair path.
    NeedsRepair,
    /// The request itself is not acceptable.
    Rejected,
    /// The service is not accepting requests yet.
    Unavailable,
    /// Anything else.
    Internal,
}

impl BacklogError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            BacklogError::Conflict { .. } => ErrorClass::Retryable,
            BacklogError::Store(StoreError::RevisionConflict { .. }) => ErrorClass::Retryable,
            BacklogError::NotFound(_) => ErrorClass::NotFound,
            BacklogError::Structural(_) => ErrorClass::NeedsRepair,
            BacklogError::LimitReached { .. } | BacklogError::Settings(_) => ErrorClass::Rejected,
            BacklogError::NotReady(_) => ErrorClass::Unavailable,
            BacklogError::Store(_) => ErrorClass::Internal,
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Result type for backlog operations.
pub type Result<T> = std::result::Result<T, BacklogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use burndown_core::{Revision, StoryId};

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: BacklogError = StoreError::NotFound("story abc".into()).into();
        assert!(matches!(err, BacklogError::NotFound(_)));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[test]
    fn test_stale_revision_is_retryable() {
        let id = StoryId::new("s1").unwrap();
        let err: BacklogError = StoreError::RevisionConflict {
            id,
            presented: Revision::first(b"a"),
            stored: Revision::first(b"a").next(b"b"),
        }
        .into();
        assert!(err.is_retryable());

        let err: BacklogError = StoreError::InvalidData("bad row".into()).into();
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_conflict_display() {
        let err = BacklogError::Conflict {
            target: NextId::Last,
            reason: ConflictReason::MultipleCandidates,
        };
        assert_eq!(err.to_string(), "conflict at last: multiple candidates");
        assert_eq!(err.class(), ErrorClass::Retryable);
    }
}
