//! # Burndown Store
//!
//! Document store abstraction for the Burndown backlog. Provides a trait-based
//! interface for story, archive and settings persistence with SQLite and
//! in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts document storage behind the [`Store`] trait,
//! allowing the backlog engines to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreError`] - What can go wrong, including stale revisions
//!
//! ## Usage
//!
//! ```rust,no_run
//! use burndown_core::{CircleId, StoryBuilder};
//! use burndown_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("burndown.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let circle = CircleId::new("team").unwrap();
//!     let story = StoryBuilder::new(circle).summary("plan sprint").build();
//!     let stored = store.insert_story(&story).await.unwrap();
//!     assert_eq!(stored.revision.generation(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No multi-document transactions**: every call touches one document
//! - **Revision checks**: updates and deletes present the revision they read
//! - **Circle-scoped lookups**: pointer queries never cross circles

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
