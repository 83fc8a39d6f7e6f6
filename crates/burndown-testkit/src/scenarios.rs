//! Canned chain layouts, well-formed and broken.
//!
//! Each layout names what the validator must say about it, so the same table
//! drives pure validator tests and store-backed ones.

use burndown_core::{CircleId, Story, StoryBuilder, StructuralError};

use crate::fixtures::{next, sid};

/// One stored story in a layout.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub id: &'static str,
    /// Successor name, or `"last"`.
    pub next: &'static str,
    pub first: bool,
}

const fn node(id: &'static str, next: &'static str, first: bool) -> Node {
    Node { id, next, first }
}

/// The kind of break a layout must be reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    NoHead,
    MultipleHeads,
    Cycle,
    DanglingPointer,
    ConvergingPointers,
    Unreachable,
}

impl BreakKind {
    pub fn matches(&self, err: &StructuralError) -> bool {
        matches!(
            (self, err),
            (BreakKind::NoHead, StructuralError::NoHead { .. })
                | (BreakKind::MultipleHeads, StructuralError::MultipleHeads { .. })
                | (BreakKind::Cycle, StructuralError::Cycle { .. })
                | (BreakKind::DanglingPointer, StructuralError::DanglingPointer { .. })
                | (BreakKind::ConvergingPointers, StructuralError::ConvergingPointers { .. })
                | (BreakKind::Unreachable, StructuralError::Unreachable { .. })
        )
    }
}

/// What walking a layout must produce.
#[derive(Debug, Clone)]
pub enum Expect {
    /// A well-formed chain in this order.
    Order(Vec<&'static str>),
    /// A broken chain.
    Broken(BreakKind),
}

/// A named chain layout.
#[derive(Debug, Clone)]
pub struct Layout {
    pub name: &'static str,
    pub nodes: Vec<Node>,
    pub expect: Expect,
}

impl Layout {
    /// Build the layout's stories in memory, in circle `circle`.
    pub fn stories(&self, circle: &CircleId) -> Vec<Story> {
        self.nodes
            .iter()
            .map(|n| {
                let mut story = StoryBuilder::new(circle.clone())
                    .summary(n.id)
                    .before(next(n.next))
                    .build();
                story.is_first_story = n.first;
                story.into_story(sid(n.id), 0)
            })
            .collect()
    }
}

/// Every canned layout.
pub fn all_layouts() -> Vec<Layout> {
    vec![
        Layout {
            name: "single story",
            nodes: vec![node("a", "last", true)],
            expect: Expect::Order(vec!["a"]),
        },
        Layout {
            name: "three in a row, stored out of order",
            nodes: vec![
                node("c", "last", false),
                node("a", "b", true),
                node("b", "c", false),
            ],
            expect: Expect::Order(vec!["a", "b", "c"]),
        },
        Layout {
            name: "no story flagged as head",
            nodes: vec![node("a", "b", false), node("b", "last", false)],
            expect: Expect::Broken(BreakKind::NoHead),
        },
        Layout {
            name: "two stories flagged as head",
            nodes: vec![node("a", "b", true), node("b", "last", true)],
            expect: Expect::Broken(BreakKind::MultipleHeads),
        },
        Layout {
            name: "tail points back into the chain",
            nodes: vec![
                node("a", "b", true),
                node("b", "c", false),
                node("c", "b", false),
            ],
            expect: Expect::Broken(BreakKind::Cycle),
        },
        Layout {
            name: "pointer at a removed story",
            nodes: vec![node("a", "gone", true), node("b", "last", false)],
            expect: Expect::Broken(BreakKind::DanglingPointer),
        },
        Layout {
            name: "two stories share a successor",
            nodes: vec![
                node("a", "c", true),
                node("b", "c", false),
                node("c", "last", false),
            ],
            expect: Expect::Broken(BreakKind::ConvergingPointers),
        },
        Layout {
            name: "two tails",
            nodes: vec![node("a", "last", true), node("b", "last", false)],
            expect: Expect::Broken(BreakKind::ConvergingPointers),
        },
        Layout {
            name: "detached loop beside the chain",
            nodes: vec![
                node("a", "last", true),
                node("x", "y", false),
                node("y", "x", false),
            ],
            expect: Expect::Broken(BreakKind::Unreachable),
        },
    ]
}

/// Layouts the validator must accept.
pub fn valid_layouts() -> Vec<Layout> {
    all_layouts()
        .into_iter()
        .filter(|l| matches!(l.expect, Expect::Order(_)))
        .collect()
}

/// Layouts the validator must reject.
pub fn broken_layouts() -> Vec<Layout> {
    all_layouts()
        .into_iter()
        .filter(|l| matches!(l.expect, Expect::Broken(_)))
        .collect()
}
