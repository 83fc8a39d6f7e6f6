//! A store wrapper that fails on demand.
//!
//! Multi-step operations stop at the first failed write. To exercise that,
//! wrap any store in [`FaultyStore`] and arm it to fail the Nth update or
//! delete from now on.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use burndown_core::{Archive, CircleId, NewStory, NextId, Revision, Setting, Story, StoryId};
use burndown_store::{Result, Store, StoreError};

const DISARMED: usize = usize::MAX;

/// Store wrapper that injects write failures.
pub struct FaultyStore<S> {
    inner: S,
    /// Updates still allowed before failing. `DISARMED` when off.
    updates_left: AtomicUsize,
    /// Deletes still allowed before failing. `DISARMED` when off.
    deletes_left: AtomicUsize,
    updates: AtomicUsize,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            updates_left: AtomicUsize::new(DISARMED),
            deletes_left: AtomicUsize::new(DISARMED),
            updates: AtomicUsize::new(0),
        }
    }

    /// Let `n` more updates through, then fail every update after them.
    pub fn fail_updates_after(&self, n: usize) {
        self.updates_left.store(n, Ordering::SeqCst);
    }

    /// Let `n` more deletes through, then fail every delete after them.
    pub fn fail_deletes_after(&self, n: usize) {
        self.deletes_left.store(n, Ordering::SeqCst);
    }

    /// Stop injecting failures.
    pub fn disarm(&self) {
        self.updates_left.store(DISARMED, Ordering::SeqCst);
        self.deletes_left.store(DISARMED, Ordering::SeqCst);
    }

    /// Number of updates that reached the inner store.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consume one unit of `budget`, or report that it is spent.
    fn take(budget: &AtomicUsize) -> bool {
        budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                DISARMED => Some(DISARMED),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }
}

#[async_trait]
impl<S: Store> Store for FaultyStore<S> {
    async fn insert_story(&self, story: &NewStory) -> Result<Story> {
        self.inner.insert_story(story).await
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>> {
        self.inner.get_story(id).await
    }

    async fn update_story(&self, story: &Story) -> Result<Story> {
        if !Self::take(&self.updates_left) {
            return Err(StoreError::Injected(format!("update of story {}", story.id)));
        }
        let updated = self.inner.update_story(story).await?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete_story(&self, id: &StoryId, revision: &Revision) -> Result<()> {
        if !Self::take(&self.deletes_left) {
            return Err(StoreError::Injected(format!("delete of story {}", id)));
        }
        self.inner.delete_story(id, revision).await
    }

    async fn find_by_next_id(&self, circle: &CircleId, next: &NextId) -> Result<Vec<Story>> {
        self.inner.find_by_next_id(circle, next).await
    }

    async fn find_by_circle(&self, circle: &CircleId) -> Result<Vec<Story>> {
        self.inner.find_by_circle(circle).await
    }

    async fn first_story(&self, circle: &CircleId) -> Result<Option<Story>> {
        self.inner.first_story(circle).await
    }

    async fn count_stories(&self, circle: &CircleId) -> Result<usize> {
        self.inner.count_stories(circle).await
    }

    async fn find_next_meeting(&self, circle: &CircleId) -> Result<Option<Story>> {
        self.inner.find_next_meeting(circle).await
    }

    async fn insert_archive(&self, archive: &Archive) -> Result<()> {
        self.inner.insert_archive(archive).await
    }

    async fn find_archives(&self, circle: &CircleId, limit: usize) -> Result<Vec<Archive>> {
        self.inner.find_archives(circle, limit).await
    }

    async fn count_archives(&self, circle: &CircleId) -> Result<usize> {
        self.inner.count_archives(circle).await
    }

    async fn get_settings(&self) -> Result<Vec<Setting>> {
        self.inner.get_settings().await
    }

    async fn put_setting(&self, setting: &Setting) -> Result<()> {
        self.inner.put_setting(setting).await
    }
}
