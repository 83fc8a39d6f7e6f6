//! Store trait: the abstract interface to the document store.
//!
//! The backlog engines are storage-agnostic. Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use burndown_core::{Archive, CircleId, NewStory, NextId, Revision, Setting, Story, StoryId};

use crate::error::{Result, StoreError};

/// The Store trait: async interface to story, archive and settings documents.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Per-document atomicity only**: each call reads or writes one document
///   atomically. Nothing spans documents.
/// - **Revision checks**: `update_story` and `delete_story` fail with
///   `RevisionConflict` when the presented revision is not the stored one.
/// - **Pointer index**: `find_by_next_id` is the collision and predecessor
///   lookup; it is always scoped to one circle.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Story Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a new story.
    ///
    /// Uses the story's own id when present (failing with `AlreadyExists` if
    /// taken), otherwise generates one. Returns the stored document with its
    /// first revision.
    async fn insert_story(&self, story: &NewStory) -> Result<Story>;

    /// Get a story by id.
    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>>;

    /// Overwrite a story, checking `story.revision` against the stored one.
    ///
    /// Returns the document as stored, with its new revision.
    async fn update_story(&self, story: &Story) -> Result<Story>;

    /// Delete a story, checking the revision.
    ///
    /// Fails with `NotFound` if the document no longer exists.
    async fn delete_story(&self, id: &StoryId, revision: &Revision) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Indexed Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// All stories in `circle` whose `next_id` equals `next`.
    async fn find_by_next_id(&self, circle: &CircleId, next: &NextId) -> Result<Vec<Story>>;

    /// All stories in `circle`, in no particular order.
    async fn find_by_circle(&self, circle: &CircleId) -> Result<Vec<Story>>;

    /// The story flagged `is_first_story` in `circle`, if any.
    ///
    /// If the chain is damaged and several are flagged, returns one of them.
    async fn first_story(&self, circle: &CircleId) -> Result<Option<Story>>;

    /// Number of stories in `circle`.
    async fn count_stories(&self, circle: &CircleId) -> Result<usize>;

    /// The story flagged `is_next_meeting` in `circle`, if any.
    async fn find_next_meeting(&self, circle: &CircleId) -> Result<Option<Story>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Archives
    // ─────────────────────────────────────────────────────────────────────────

    /// Record an archived story.
    async fn insert_archive(&self, archive: &Archive) -> Result<()>;

    /// Most recent archives for `circle`, newest first.
    async fn find_archives(&self, circle: &CircleId, limit: usize) -> Result<Vec<Archive>>;

    /// Number of archives for `circle`.
    async fn count_archives(&self, circle: &CircleId) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────

    /// All saved settings.
    async fn get_settings(&self) -> Result<Vec<Setting>>;

    /// Insert or replace a setting by name.
    async fn put_setting(&self, setting: &Setting) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Get a story by id, failing with `NotFound` when it is absent.
    fn require_story(
        &self,
        id: &StoryId,
    ) -> impl std::future::Future<Output = Result<Story>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn require_story(&self, id: &StoryId) -> Result<Story> {
        self.get_story(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("story {}", id)))
    }
}
