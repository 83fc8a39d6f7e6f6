//! # Burndown
//!
//! Backlog engines for the Burndown system: an ordered list of stories per
//! circle, kept as a singly-linked chain of `next_id` pointers in a document
//! store that only offers per-document atomicity.
//!
//! ## Overview
//!
//! - **Insertion**: links a new story in, resolving pointer collisions by
//!   retargeting, and keeps the head flag on the right story
//! - **Relocation**: moves a story by relinking its old predecessor, itself,
//!   and its new predecessor
//! - **Removal**: deletes a story; [`Backlog::detach_story`] also closes the gap
//! - **Validation**: walks a circle's chain and reports structural breaks
//!
//! ## Key Concepts
//!
//! - **Circle**: a team workspace; each circle owns one independent chain.
//! - **Sentinel**: the `next_id` of the tail, [`NextId::Last`].
//! - **Collision**: two stories pointing at the same successor.
//! - **Revision**: per-document token; a write carrying a stale one fails.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use burndown::{Backlog, BacklogConfig, CircleId, NextId, StoryBuilder};
//! use burndown::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("burndown.db").unwrap();
//!     let backlog = Backlog::new(store, BacklogConfig::default());
//!     let circle = CircleId::new("team").unwrap();
//!
//!     // The first story starts the chain
//!     let first = backlog
//!         .insert(StoryBuilder::new(circle.clone()).summary("ship it").build())
//!         .await
//!         .unwrap();
//!
//!     // New stories go on top unless told otherwise
//!     let top = backlog
//!         .insert(StoryBuilder::new(circle.clone()).summary("plan it").build())
//!         .await
//!         .unwrap();
//!
//!     // Move the top story to the end
//!     backlog.move_story(&top.id, NextId::Last).await.unwrap();
//!
//!     let ordered = backlog.backlog(&circle).await.unwrap();
//!     assert_eq!(ordered[0].id, first.id);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `burndown::core` - Core types and the chain validator
//! - `burndown::store` - Storage abstraction and SQLite

pub mod backlog;
pub mod config;
pub mod error;
pub mod ready;
pub mod settings;

// Re-export component crates
pub use burndown_core as core;
pub use burndown_store as store;

// Re-export main types for convenience
pub use backlog::{Backlog, NEXT_MEETING_SUMMARY};
pub use config::{BacklogConfig, TailPolicy};
pub use error::{BacklogError, ConflictReason, ErrorClass, Result};
pub use ready::{bootstrap, ready_gate, ReadyGate, ReadySignal, Service};
pub use settings::{Administrators, Audience, Everyone, Internal, SettingsTable, SettingsView};

// Re-export commonly used core types
pub use burndown_core::{
    Archive, CircleId, NewStory, NextId, Revision, Story, StoryBuilder, StoryId, StructuralError,
    Visibility,
};
