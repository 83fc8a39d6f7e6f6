//! # Burndown Core
//!
//! Pure primitives for the Burndown backlog: stories, chain pointers,
//! revisions, and chain validation.
//!
//! This crate contains no I/O, no storage, no async. A circle's backlog order
//! lives entirely in the `next_id` pointers of its stories; this crate defines
//! those types and knows how to check that they still form one chain.
//!
//! ## Key Types
//!
//! - [`Story`] - A persisted chain node
//! - [`NewStory`] / [`StoryBuilder`] - A story not yet linked into a chain
//! - [`NextId`] - Successor pointer, or the end-of-chain sentinel
//! - [`Revision`] - Per-document optimistic concurrency token
//! - [`Chain`] - Indexed view used for traversal and break detection
//!
//! ## Validation
//!
//! ```rust
//! use burndown_core::{chain, CircleId, StoryBuilder, StoryId};
//!
//! let circle = CircleId::new("team").unwrap();
//! let mut only = StoryBuilder::new(circle)
//!     .summary("first")
//!     .build()
//!     .into_story(StoryId::new("s1").unwrap(), 0);
//! only.is_first_story = true;
//!
//! assert!(!chain::is_broken(&[only]));
//! ```

pub mod chain;
pub mod error;
pub mod revision;
pub mod setting;
pub mod story;
pub mod types;

pub use chain::{is_broken, ordered, walk, Chain};
pub use error::{CoreError, StructuralError};
pub use revision::Revision;
pub use setting::{Setting, Visibility};
pub use story::{now_millis, Archive, Author, Comment, NewStory, Story, StoryBuilder};
pub use types::{CircleId, NextId, StoryId, SENTINEL};
