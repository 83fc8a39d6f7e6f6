//! Error types for the Burndown core.

use thiserror::Error;

use crate::types::{CircleId, NextId, StoryId};

/// Errors raised while parsing or constructing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid story id: {0:?}")]
    InvalidStoryId(String),

    #[error("invalid circle id: {0:?}")]
    InvalidCircleId(String),

    #[error("invalid next pointer: {0:?}")]
    InvalidNextId(String),

    #[error("invalid revision: {0:?}")]
    InvalidRevision(String),

    #[error("invalid visibility: {0:?}")]
    InvalidVisibility(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Structural breaks found while walking a circle's chain.
///
/// These are diagnostics, never repaired automatically. Callers should treat
/// any of them as "the backlog view is unreliable".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("circle {circle} has stories but no first story")]
    NoHead { circle: CircleId },

    #[error("circle has {} first stories", heads.len())]
    MultipleHeads { heads: Vec<StoryId> },

    #[error("circle {circle} has stories but no tail")]
    NoTail { circle: CircleId },

    #[error("cycle detected: story {at} visited twice")]
    Cycle { at: StoryId },

    #[error("story {from} points at missing story {to}")]
    DanglingPointer { from: StoryId, to: StoryId },

    #[error("{} stories point at {target}", predecessors.len())]
    ConvergingPointers {
        target: NextId,
        predecessors: Vec<StoryId>,
    },

    #[error("{} stories are unreachable from the first story", orphans.len())]
    Unreachable { orphans: Vec<StoryId> },

    #[error("story {story} belongs to circle {found}, expected {expected}")]
    MixedCircles {
        story: StoryId,
        expected: CircleId,
        found: CircleId,
    },

    #[error("story id {0} appears more than once")]
    DuplicateId(StoryId),
}
