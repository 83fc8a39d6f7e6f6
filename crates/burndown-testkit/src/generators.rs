//! Proptest generators for property-based testing.
//!
//! Operations are generated as positions rather than ids, since the ids only
//! exist once earlier operations have run. [`ChainOp::resolve`] turns a
//! position into a concrete step against the chain as it stands.

use proptest::prelude::*;

use burndown_core::{NextId, StoryId};

/// A chain operation by position.
///
/// Positions are reduced modulo the chain length (plus one where the sentinel
/// is a valid choice) when resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOp {
    /// Insert before the story at `before`, or on top when `None`.
    Insert { before: Option<usize> },
    /// Move the story at `story` before the story at `before`.
    Move { story: usize, before: usize },
    /// Unlink and remove the story at `story`.
    Detach { story: usize },
}

/// A chain operation with concrete ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Insert(Option<NextId>),
    Move(StoryId, NextId),
    Detach(StoryId),
}

/// The slot before position `pos`, where `order.len()` means the tail.
fn slot(order: &[StoryId], pos: usize) -> NextId {
    let pos = pos % (order.len() + 1);
    order
        .get(pos)
        .map(NextId::from)
        .unwrap_or(NextId::Last)
}

impl ChainOp {
    /// Resolve against the current chain order.
    ///
    /// Returns `None` for operations that make no sense on this chain, such
    /// as moving a story before itself or detaching from an empty circle.
    pub fn resolve(&self, order: &[StoryId]) -> Option<Step> {
        match *self {
            ChainOp::Insert { before: None } => Some(Step::Insert(None)),
            ChainOp::Insert { before: Some(_) } if order.is_empty() => Some(Step::Insert(None)),
            ChainOp::Insert { before: Some(pos) } => Some(Step::Insert(Some(slot(order, pos)))),
            ChainOp::Move { story, before } => {
                if order.is_empty() {
                    return None;
                }
                let x = &order[story % order.len()];
                let target = slot(order, before);
                if target.points_at(x) {
                    return None;
                }
                Some(Step::Move(x.clone(), target))
            }
            ChainOp::Detach { story } => {
                if order.is_empty() {
                    return None;
                }
                Some(Step::Detach(order[story % order.len()].clone()))
            }
        }
    }
}

/// Generate a single chain operation, weighted towards inserts.
pub fn chain_op() -> impl Strategy<Value = ChainOp> {
    prop_oneof![
        3 => any::<Option<usize>>().prop_map(|before| ChainOp::Insert { before }),
        3 => (any::<usize>(), any::<usize>())
            .prop_map(|(story, before)| ChainOp::Move { story, before }),
        1 => any::<usize>().prop_map(|story| ChainOp::Detach { story }),
    ]
}

/// Generate a sequence of up to `max_len` chain operations.
pub fn chain_ops(max_len: usize) -> impl Strategy<Value = Vec<ChainOp>> {
    prop::collection::vec(chain_op(), 1..=max_len)
}

/// Generate a chain length and a permutation describing a stored order.
pub fn shuffled_chain(max_len: usize) -> impl Strategy<Value = (usize, Vec<usize>)> {
    (1..=max_len).prop_flat_map(|len| {
        (
            Just(len),
            Just((0..len).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}
