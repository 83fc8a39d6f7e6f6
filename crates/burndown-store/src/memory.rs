//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! (revision checks, circle-scoped pointer lookups) but keeps everything in
//! memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use burndown_core::{
    now_millis, Archive, CircleId, NewStory, NextId, Revision, Setting, Story, StoryId,
};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Stories indexed by id. Ordered so lookups return a stable order.
    stories: BTreeMap<StoryId, Story>,

    /// Archived stories, in insertion order.
    archives: Vec<Archive>,

    /// Settings by name.
    settings: BTreeMap<String, Setting>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_story(&self, story: &NewStory) -> Result<Story> {
        let mut inner = self.write()?;

        let id = story.id.clone().unwrap_or_else(StoryId::generate);
        if inner.stories.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let stored = story.clone().into_story(id.clone(), now_millis());
        inner.stories.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>> {
        let inner = self.read()?;
        Ok(inner.stories.get(id).cloned())
    }

    async fn update_story(&self, story: &Story) -> Result<Story> {
        let mut inner = self.write()?;

        let stored = inner
            .stories
            .get(&story.id)
            .ok_or_else(|| StoreError::NotFound(format!("story {}", story.id)))?;

        if stored.revision != story.revision {
            return Err(StoreError::RevisionConflict {
                id: story.id.clone(),
                presented: story.revision,
                stored: stored.revision,
            });
        }

        let mut updated = story.clone();
        updated.revision = story.next_revision();
        updated.updated_at = now_millis();
        inner.stories.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }

    async fn delete_story(&self, id: &StoryId, revision: &Revision) -> Result<()> {
        let mut inner = self.write()?;

        let stored = inner
            .stories
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("story {}", id)))?;

        if stored.revision != *revision {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                presented: *revision,
                stored: stored.revision,
            });
        }

        inner.stories.remove(id);
        Ok(())
    }

    async fn find_by_next_id(&self, circle: &CircleId, next: &NextId) -> Result<Vec<Story>> {
        let inner = self.read()?;
        Ok(inner
            .stories
            .values()
            .filter(|s| &s.circle_id == circle && &s.next_id == next)
            .cloned()
            .collect())
    }

    async fn find_by_circle(&self, circle: &CircleId) -> Result<Vec<Story>> {
        let inner = self.read()?;
        Ok(inner
            .stories
            .values()
            .filter(|s| &s.circle_id == circle)
            .cloned()
            .collect())
    }

    async fn first_story(&self, circle: &CircleId) -> Result<Option<Story>> {
        let inner = self.read()?;
        Ok(inner
            .stories
            .values()
            .find(|s| &s.circle_id == circle && s.is_first_story)
            .cloned())
    }

    async fn count_stories(&self, circle: &CircleId) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner
            .stories
            .values()
            .filter(|s| &s.circle_id == circle)
            .count())
    }

    async fn find_next_meeting(&self, circle: &CircleId) -> Result<Option<Story>> {
        let inner = self.read()?;
        Ok(inner
            .stories
            .values()
            .find(|s| &s.circle_id == circle && s.is_next_meeting)
            .cloned())
    }

    async fn insert_archive(&self, archive: &Archive) -> Result<()> {
        let mut inner = self.write()?;
        inner.archives.push(archive.clone());
        Ok(())
    }

    async fn find_archives(&self, circle: &CircleId, limit: usize) -> Result<Vec<Archive>> {
        let inner = self.read()?;
        let mut archives: Vec<Archive> = inner
            .archives
            .iter()
            .filter(|a| &a.circle_id == circle)
            .cloned()
            .collect();
        archives.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        archives.truncate(limit);
        Ok(archives)
    }

    async fn count_archives(&self, circle: &CircleId) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner
            .archives
            .iter()
            .filter(|a| &a.circle_id == circle)
            .count())
    }

    async fn get_settings(&self) -> Result<Vec<Setting>> {
        let inner = self.read()?;
        Ok(inner.settings.values().cloned().collect())
    }

    async fn put_setting(&self, setting: &Setting) -> Result<()> {
        let mut inner = self.write()?;
        inner.settings.insert(setting.name.clone(), setting.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burndown_core::{StoryBuilder, Visibility};

    fn circle(name: &str) -> CircleId {
        CircleId::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let new = StoryBuilder::new(circle("k")).summary("first").build();

        let stored = store.insert_story(&new).await.unwrap();
        assert_eq!(stored.revision.generation(), 1);
        assert!(stored.next_id.is_last());

        let retrieved = store.get_story(&stored.id).await.unwrap().unwrap();
        assert_eq!(retrieved, stored);
    }

    #[tokio::test]
    async fn test_insert_with_taken_id() {
        let store = MemoryStore::new();
        let id = StoryId::new("fixed").unwrap();
        let new = StoryBuilder::new(circle("k")).id(id.clone()).build();

        store.insert_story(&new).await.unwrap();
        let result = store.insert_story(&new).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(existing)) if existing == id));
    }

    #[tokio::test]
    async fn test_stale_revision_rejected() {
        let store = MemoryStore::new();
        let stored = store
            .insert_story(&StoryBuilder::new(circle("k")).build())
            .await
            .unwrap();

        let mut first = stored.clone();
        first.summary = "edited".into();
        let updated = store.update_story(&first).await.unwrap();
        assert_eq!(updated.revision.generation(), 2);

        let mut second = stored.clone();
        second.summary = "edited elsewhere".into();
        let result = store.update_story(&second).await;
        assert!(matches!(result, Err(StoreError::RevisionConflict { .. })));

        let result = store.delete_story(&stored.id, &stored.revision).await;
        assert!(matches!(result, Err(StoreError::RevisionConflict { .. })));
        store.delete_story(&updated.id, &updated.revision).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = MemoryStore::new();
        let stored = store
            .insert_story(&StoryBuilder::new(circle("k")).build())
            .await
            .unwrap();
        store.delete_story(&stored.id, &stored.revision).await.unwrap();

        let result = store.delete_story(&stored.id, &stored.revision).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pointer_lookup_is_circle_scoped() {
        let store = MemoryStore::new();
        store
            .insert_story(&StoryBuilder::new(circle("a")).at_tail().build())
            .await
            .unwrap();
        store
            .insert_story(&StoryBuilder::new(circle("b")).at_tail().build())
            .await
            .unwrap();

        let tails = store
            .find_by_next_id(&circle("a"), &NextId::Last)
            .await
            .unwrap();
        assert_eq!(tails.len(), 1);
        assert_eq!(store.count_stories(&circle("b")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = MemoryStore::new();
        store
            .put_setting(&Setting::new("demo", false, Visibility::Public))
            .await
            .unwrap();
        store
            .put_setting(&Setting::new("demo", true, Visibility::Public))
            .await
            .unwrap();

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].value, serde_json::Value::Bool(true));
    }
}
