//! # Burndown Testkit
//!
//! Testing utilities for the Burndown backlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a store plus a circle, with helpers to lay chains down
//!   directly, corrupt them, and compare snapshots
//! - **Scenarios**: canned chain layouts with the verdict the validator must
//!   reach on each
//! - **Generators**: Proptest strategies for operation sequences
//! - **Fault injection**: a store wrapper that fails writes on demand
//!
//! ## Canned Layouts
//!
//! ```rust
//! use burndown_core::{chain, CircleId};
//! use burndown_testkit::scenarios::{broken_layouts, Expect};
//!
//! let circle = CircleId::new("k").unwrap();
//! for layout in broken_layouts() {
//!     let stories = layout.stories(&circle);
//!     assert!(chain::is_broken(&stories), "{}", layout.name);
//!     assert!(matches!(layout.expect, Expect::Broken(_)));
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use burndown_testkit::generators::chain_ops;
//!
//! proptest! {
//!     #[test]
//!     fn chain_survives(ops in chain_ops(20)) {
//!         // resolve each op against the current order and apply it
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use burndown_testkit::fixtures::TestFixture;
//!
//! # tokio_test_block(async {
//! let fixture = TestFixture::new();
//! fixture.seed(&["a", "b", "c"]).await.unwrap();
//! assert_eq!(fixture.order().await.unwrap(), ["a", "b", "c"]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod scenarios;

pub use faulty::FaultyStore;
pub use fixtures::{changed, names, next, sid, TestFixture};
pub use generators::{chain_op, chain_ops, shuffled_chain, ChainOp, Step};
pub use scenarios::{all_layouts, broken_layouts, valid_layouts, BreakKind, Expect, Layout};
