//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. A fixture owns a store and a
//! circle, and can lay chains down directly in the store, bypassing the
//! engines, so tests can start from any shape, broken ones included.

use std::collections::BTreeMap;
use std::sync::Arc;

use burndown_core::{chain, CircleId, NewStory, NextId, Story, StoryBuilder, StoryId};
use burndown_store::{MemoryStore, Result, Store, StoreError, StoreExt};

use crate::scenarios::Layout;

/// Story id from a short fixture name.
///
/// Panics on names that are not valid ids, such as `"last"`.
pub fn sid(name: &str) -> StoryId {
    StoryId::new(name).expect("fixture story names must be valid story ids")
}

/// Pointer at the named story, or the sentinel for `"last"`.
pub fn next(name: &str) -> NextId {
    if name == burndown_core::SENTINEL {
        NextId::Last
    } else {
        NextId::Story(sid(name))
    }
}

/// Ids of `stories` as plain strings, in the given order.
pub fn names(stories: &[Story]) -> Vec<String> {
    stories.iter().map(|s| s.id.to_string()).collect()
}

/// Names of stories that differ between two snapshots, added or removed ones
/// included.
pub fn changed(before: &BTreeMap<StoryId, Story>, after: &BTreeMap<StoryId, Story>) -> Vec<String> {
    let mut ids: Vec<&StoryId> = before.keys().chain(after.keys()).collect();
    ids.sort();
    ids.dedup();

    ids.into_iter()
        .filter(|id| before.get(*id) != after.get(*id))
        .map(|id| id.to_string())
        .collect()
}

/// A test fixture with a store and one circle.
pub struct TestFixture<S: Store = MemoryStore> {
    pub store: Arc<S>,
    pub circle: CircleId,
}

impl TestFixture<MemoryStore> {
    /// Create a new test fixture over an empty memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> TestFixture<S> {
    /// Create a fixture over `store`, working in circle `"k"`.
    pub fn with_store(store: S) -> Self {
        Self {
            store: Arc::new(store),
            circle: CircleId::new("k").expect("static circle id is valid"),
        }
    }

    /// Work in another circle of the same store.
    pub fn in_circle(&self, circle: CircleId) -> Self {
        Self {
            store: Arc::clone(&self.store),
            circle,
        }
    }

    /// The store, for handing to a `Backlog`.
    pub fn shared(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// A builder for a new story in this circle with the given id.
    pub fn new_story(&self, name: &str) -> StoryBuilder {
        StoryBuilder::new(self.circle.clone())
            .id(sid(name))
            .summary(name)
    }

    /// Lay down the well-formed chain `names[0] -> ... -> last`.
    ///
    /// Returns the stories in chain order.
    pub async fn seed(&self, names: &[&str]) -> Result<Vec<Story>> {
        let mut stories = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let target = names.get(i + 1).map(|n| next(n)).unwrap_or(NextId::Last);
            let story = self.place_one(name, target, i == 0).await?;
            stories.push(story);
        }

        Ok(stories)
    }

    /// Lay down a canned layout, whatever its shape.
    pub async fn place(&self, layout: &Layout) -> Result<Vec<Story>> {
        let mut stories = Vec::with_capacity(layout.nodes.len());
        for node in &layout.nodes {
            stories.push(self.place_one(node.id, next(node.next), node.first).await?);
        }
        Ok(stories)
    }

    async fn place_one(&self, name: &str, target: NextId, first: bool) -> Result<Story> {
        let mut story: NewStory = self.new_story(name).before(target).build();
        story.is_first_story = first;
        self.store.insert_story(&story).await
    }

    /// Get a story by fixture name.
    pub async fn story(&self, name: &str) -> Result<Story> {
        self.store.require_story(&sid(name)).await
    }

    /// Overwrite a story's pointer, bypassing every check.
    pub async fn point(&self, name: &str, target: NextId) -> Result<Story> {
        let mut story = self.story(name).await?;
        story.next_id = target;
        self.store.update_story(&story).await
    }

    /// Set or clear a story's head flag, bypassing every check.
    pub async fn flag_head(&self, name: &str, first: bool) -> Result<Story> {
        let mut story = self.story(name).await?;
        story.is_first_story = first;
        self.store.update_story(&story).await
    }

    /// All stories of the circle, unordered.
    pub async fn stories(&self) -> Result<Vec<Story>> {
        self.store.find_by_circle(&self.circle).await
    }

    /// The circle's story names in chain order.
    ///
    /// A broken chain is reported as `InvalidData`.
    pub async fn order(&self) -> Result<Vec<String>> {
        let stories = self.stories().await?;
        let ordered = chain::walk(&stories)
            .map_err(|e| StoreError::InvalidData(format!("chain is broken: {}", e)))?;
        Ok(ordered.iter().map(|s| s.id.to_string()).collect())
    }

    /// Names of the stories flagged as head.
    pub async fn heads(&self) -> Result<Vec<String>> {
        let mut heads: Vec<String> = self
            .stories()
            .await?
            .iter()
            .filter(|s| s.is_first_story)
            .map(|s| s.id.to_string())
            .collect();
        heads.sort();
        Ok(heads)
    }

    /// Every story of the circle keyed by id, for before/after comparisons.
    pub async fn snapshot(&self) -> Result<BTreeMap<StoryId, Story>> {
        Ok(self
            .stories()
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect())
    }
}
