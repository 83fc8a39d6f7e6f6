//! The Backlog: insertion, relocation and removal over a story chain.
//!
//! Every operation here is a sequence of single-document store calls. Nothing
//! is atomic across documents, so each multi-step operation reads everything
//! it needs first, then writes in a fixed order and stops at the first
//! failure. Whatever window that leaves is visible to the chain validator.

use std::sync::Arc;

use tracing::{debug, info, warn};

use burndown_core::{
    chain, now_millis, Archive, CircleId, NewStory, NextId, Story, StoryBuilder, StoryId,
    StructuralError,
};
use burndown_store::{Store, StoreExt};

use crate::config::{BacklogConfig, TailPolicy};
use crate::error::{BacklogError, ConflictReason, Result};

/// Summary given to the story created by [`Backlog::set_next_meeting`].
pub const NEXT_MEETING_SUMMARY: &str = "Next meeting";

fn conflict(target: NextId, reason: ConflictReason) -> BacklogError {
    warn!(slot = %target, %reason, "pointer conflict");
    BacklogError::Conflict { target, reason }
}

/// Reduce a pointer lookup to at most one story.
fn single(mut candidates: Vec<Story>, target: &NextId) -> Result<Option<Story>> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.pop()),
        _ => Err(conflict(target.clone(), ConflictReason::MultipleCandidates)),
    }
}

/// The backlog service for one store.
///
/// # Design Notes
///
/// - **Optimistic, not locked**: inserts re-read the slot they are about to
///   claim immediately before writing, and every update presents the revision
///   it read. A concurrent writer shows up as a `Conflict` or a stale
///   revision, never as silent corruption of a document.
/// - **No internal retries**: errors go straight back to the caller, which
///   decides whether to try again.
/// - **Removal does not relink**: [`Backlog::remove_story`] only deletes. Use
///   [`Backlog::detach_story`] to close the gap as well.
pub struct Backlog<S: Store> {
    store: Arc<S>,
    config: BacklogConfig,
}

impl<S: Store> Backlog<S> {
    /// Create a backlog over `store`.
    pub fn new(store: S, config: BacklogConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Create a backlog over a store that is also used elsewhere.
    pub fn from_shared(store: Arc<S>, config: BacklogConfig) -> Self {
        Self { store, config }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BacklogConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Insertion
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new story and link it into its circle's chain.
    ///
    /// The story lands immediately before `story.next_id`. When another story
    /// already points there, the new story is retargeted to sit before that
    /// competitor instead, and the check repeats. Absent `next_id` means the
    /// top of the backlog. A target that does not exist, or lives in another
    /// circle, is `NotFound` and nothing is written.
    ///
    /// Retargets are bounded by the larger of `max_collision_depth` and the
    /// circle's story count, so a well-formed chain always has room.
    ///
    /// Returns the persisted story with its final `next_id` and head flag.
    pub async fn insert(&self, mut story: NewStory) -> Result<Story> {
        let circle = story.circle_id.clone();
        let count = self.store.count_stories(&circle).await?;

        if let Some(limit) = self.config.story_limit {
            if count >= limit {
                warn!(%circle, limit, "story limit reached");
                return Err(BacklogError::LimitReached { circle, limit });
            }
        }

        if count == 0 {
            story.next_id = Some(NextId::Last);
            story.is_first_story = true;
            let stored = self.store.insert_story(&story).await?;
            info!(%circle, story = %stored.id, "started chain");
            return Ok(stored);
        }

        let target = match story.next_id.take() {
            Some(next) => next,
            None => self
                .store
                .first_story(&circle)
                .await?
                .map(|head| head.as_next())
                .ok_or_else(|| BacklogError::from(StructuralError::NoHead { circle: circle.clone() }))?,
        };

        self.require_in_circle(&circle, &target).await?;
        story.is_first_story = false;

        if target.is_last() && self.config.tail_policy == TailPolicy::AppendAsTail {
            return self.append_to_tail(story).await;
        }

        let bound = self.config.max_collision_depth.max(count);
        let target = self.resolve_slot(&story, target, bound).await?;
        story.next_id = Some(target);

        let stored = self.store.insert_story(&story).await?;
        debug!(story = %stored.id, next = %stored.next_id, "story linked");
        self.claim_head_if_needed(stored).await
    }

    /// Find a free slot at or ahead of `target`.
    ///
    /// A slot is free when no story in the circle points at it yet. At most
    /// `bound` retargets are taken.
    async fn resolve_slot(
        &self,
        story: &NewStory,
        mut target: NextId,
        bound: usize,
    ) -> Result<NextId> {
        let mut retargets = 0;

        loop {
            let candidates = self
                .store
                .find_by_next_id(&story.circle_id, &target)
                .await?;

            let competitor = match single(candidates, &target)? {
                None => return Ok(target),
                Some(competitor) => competitor,
            };

            if story.id.as_ref() == Some(&competitor.id) {
                return Err(conflict(target, ConflictReason::SelfReference));
            }

            if retargets == bound {
                return Err(conflict(target, ConflictReason::DepthExceeded));
            }
            retargets += 1;

            debug!(
                from = %target,
                to = %competitor.id,
                retargets,
                "slot taken, retargeting"
            );
            target = competitor.as_next();
        }
    }

    /// Fail unless `next` is the sentinel or a story of `circle`.
    async fn require_in_circle(&self, circle: &CircleId, next: &NextId) -> Result<()> {
        let Some(id) = next.story_id() else {
            return Ok(());
        };

        let target = self.store.require_story(id).await?;
        if &target.circle_id != circle {
            warn!(
                %circle,
                story = %id,
                other = %target.circle_id,
                "pointer into another circle"
            );
            return Err(BacklogError::NotFound(format!("story {} in circle {}", id, circle)));
        }
        Ok(())
    }

    /// If `stored` now sits before the head, move the head flag onto it.
    async fn claim_head_if_needed(&self, stored: Story) -> Result<Story> {
        let Some(next) = stored.next_id.story_id() else {
            return Ok(stored);
        };

        let mut successor = self.store.require_story(next).await?;
        if successor.circle_id != stored.circle_id {
            return Err(BacklogError::NotFound(format!(
                "story {} in circle {}",
                successor.id, stored.circle_id
            )));
        }
        if !successor.is_first_story {
            return Ok(stored);
        }

        successor.is_first_story = false;
        self.store.update_story(&successor).await?;

        let mut head = stored;
        head.is_first_story = true;
        let head = self.store.update_story(&head).await?;

        info!(circle = %head.circle_id, from = %successor.id, to = %head.id, "head moved");
        Ok(head)
    }

    /// Persist `story` as the new tail and relink the old tail to it.
    async fn append_to_tail(&self, mut story: NewStory) -> Result<Story> {
        let circle = story.circle_id.clone();
        let tails = self.store.find_by_next_id(&circle, &NextId::Last).await?;

        let mut old_tail = single(tails, &NextId::Last)?
            .ok_or_else(|| BacklogError::from(StructuralError::NoTail { circle }))?;

        story.next_id = Some(NextId::Last);
        let stored = self.store.insert_story(&story).await?;

        old_tail.next_id = stored.as_next();
        self.store.update_story(&old_tail).await?;

        debug!(story = %stored.id, previous = %old_tail.id, "appended as tail");
        Ok(stored)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a story so that it sits immediately before `new_next`.
    ///
    /// In the general case three stories change: the old predecessor (A)
    /// closes the gap, the moved story (X) points at `new_next`, and the story
    /// that pointed at `new_next` (C) now points at X. Written in that order.
    ///
    /// Moving the head hands the head flag to its successor first. Moving in
    /// front of the head takes the flag over from it.
    pub async fn move_story(&self, id: &StoryId, new_next: NextId) -> Result<Story> {
        let story = self.store.require_story(id).await?;

        if new_next.points_at(&story.id) {
            return Err(conflict(new_next, ConflictReason::SelfReference));
        }

        if new_next == story.next_id {
            debug!(story = %story.id, "already in place");
            return Ok(story);
        }

        let circle = story.circle_id.clone();
        let here = story.as_next();

        let before = single(self.store.find_by_next_id(&circle, &here).await?, &here)?;
        let dest = single(self.store.find_by_next_id(&circle, &new_next).await?, &new_next)?;

        match (before, dest) {
            (Some(a), Some(c)) => self.relink(a, story, new_next, c).await,
            (None, Some(c)) if story.is_first_story => self.move_head(story, new_next, c).await,
            (Some(a), None) => {
                let head = self.require_head_at(&circle, &new_next).await?;
                self.move_to_head(a, story, head).await
            }
            (None, Some(_)) => Err(BacklogError::NotFound(format!(
                "predecessor of story {}",
                story.id
            ))),
            (None, None) => Err(BacklogError::NotFound(format!(
                "story pointing at {}",
                new_next
            ))),
        }
    }

    async fn relink(
        &self,
        mut a: Story,
        mut x: Story,
        new_next: NextId,
        mut c: Story,
    ) -> Result<Story> {
        a.next_id = x.next_id.clone();
        self.store.update_story(&a).await?;

        x.next_id = new_next;
        let x = self.store.update_story(&x).await?;

        c.next_id = x.as_next();
        self.store.update_story(&c).await?;

        debug!(story = %x.id, after = %c.id, next = %x.next_id, "story moved");
        Ok(x)
    }

    async fn move_head(&self, mut x: Story, new_next: NextId, mut c: Story) -> Result<Story> {
        let successor_id = x
            .next_id
            .story_id()
            .cloned()
            .ok_or_else(|| BacklogError::NotFound(format!("successor of story {}", x.id)))?;
        let mut successor = self.store.require_story(&successor_id).await?;

        // When X lands right after its old successor, C and the new head are
        // the same document and take both changes in one write.
        let c_is_successor = c.id == successor.id;

        successor.is_first_story = true;
        if c_is_successor {
            successor.next_id = x.as_next();
        }
        self.store.update_story(&successor).await?;
        info!(circle = %x.circle_id, from = %x.id, to = %successor.id, "head moved");

        x.is_first_story = false;
        x.next_id = new_next;
        let x = self.store.update_story(&x).await?;

        if !c_is_successor {
            c.next_id = x.as_next();
            self.store.update_story(&c).await?;
        }

        Ok(x)
    }

    async fn move_to_head(&self, mut a: Story, mut x: Story, head: Story) -> Result<Story> {
        // Same as above: moving the second story to the top makes A the head.
        let a_is_head = a.id == head.id;

        a.next_id = x.next_id.clone();
        if a_is_head {
            a.is_first_story = false;
        }
        self.store.update_story(&a).await?;

        if !a_is_head {
            let mut old_head = head.clone();
            old_head.is_first_story = false;
            self.store.update_story(&old_head).await?;
        }

        x.next_id = head.as_next();
        x.is_first_story = true;
        let x = self.store.update_story(&x).await?;

        info!(circle = %x.circle_id, from = %head.id, to = %x.id, "head moved");
        Ok(x)
    }

    /// The head of `circle`, provided `next` names it.
    async fn require_head_at(&self, circle: &CircleId, next: &NextId) -> Result<Story> {
        let slot_missing = || BacklogError::NotFound(format!("story pointing at {}", next));

        let id = next.story_id().ok_or_else(slot_missing)?;
        let head = self.store.require_story(id).await?;

        if !head.is_first_story || &head.circle_id != circle {
            return Err(slot_missing());
        }
        Ok(head)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete a story's document without touching its neighbours.
    ///
    /// `story.revision` must be current. The chain is left with a gap that the
    /// caller is expected to close.
    pub async fn remove_story(&self, story: &Story) -> Result<()> {
        self.store.delete_story(&story.id, &story.revision).await?;
        debug!(story = %story.id, "story removed");
        Ok(())
    }

    /// Unlink a story from its chain, then remove it.
    ///
    /// The predecessor is pointed at the story's successor, or if the story
    /// was the head, its successor takes the head flag. Returns the removed
    /// story.
    pub async fn detach_story(&self, id: &StoryId) -> Result<Story> {
        let story = self.store.require_story(id).await?;
        let here = story.as_next();
        let predecessor = single(
            self.store.find_by_next_id(&story.circle_id, &here).await?,
            &here,
        )?;

        match predecessor {
            Some(mut a) => {
                a.next_id = story.next_id.clone();
                self.store.update_story(&a).await?;
            }
            None if story.is_first_story => {
                if let Some(next) = story.next_id.story_id() {
                    let mut successor = self.store.require_story(next).await?;
                    successor.is_first_story = true;
                    self.store.update_story(&successor).await?;
                    info!(
                        circle = %story.circle_id,
                        from = %story.id,
                        to = %successor.id,
                        "head moved"
                    );
                }
            }
            None => {
                warn!(story = %story.id, "detaching a story nothing points at");
            }
        }

        self.remove_story(&story).await?;
        Ok(story)
    }

    /// Detach a story, then record an archive copy of it.
    ///
    /// A failed detach writes no archive. If the archive write itself fails,
    /// the story is already out of the chain and the error is returned.
    pub async fn archive_story(&self, id: &StoryId) -> Result<Archive> {
        let story = self.detach_story(id).await?;
        let archive = Archive::from_story(&story, now_millis());

        self.store.insert_archive(&archive).await?;

        info!(circle = %archive.circle_id, story = %archive.story_id, "story archived");
        Ok(archive)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Repair and Markers
    // ─────────────────────────────────────────────────────────────────────────

    /// Overwrite a story's `next_id` with no collision handling.
    ///
    /// This is the repair path for chains the validator reports as broken.
    pub async fn fix_story(&self, id: &StoryId, next: NextId) -> Result<Story> {
        if next.points_at(id) {
            return Err(conflict(next, ConflictReason::SelfReference));
        }

        let mut story = self.store.require_story(id).await?;
        self.require_in_circle(&story.circle_id, &next).await?;
        story.next_id = next;
        let story = self.store.update_story(&story).await?;

        info!(story = %story.id, next = %story.next_id, "pointer repaired");
        Ok(story)
    }

    /// Show or hide the circle's next-meeting marker.
    ///
    /// Showing inserts the marker at the top of the backlog unless one exists.
    /// Hiding detaches it. Returns the marker while shown.
    pub async fn set_next_meeting(&self, circle: &CircleId, show: bool) -> Result<Option<Story>> {
        let existing = self.store.find_next_meeting(circle).await?;

        match (show, existing) {
            (true, Some(meeting)) => Ok(Some(meeting)),
            (true, None) => {
                let marker = StoryBuilder::new(circle.clone())
                    .summary(NEXT_MEETING_SUMMARY)
                    .next_meeting()
                    .build();
                self.insert(marker).await.map(Some)
            }
            (false, Some(meeting)) => {
                self.detach_story(&meeting.id).await?;
                Ok(None)
            }
            (false, None) => Ok(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries and Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a story by id.
    pub async fn story(&self, id: &StoryId) -> Result<Story> {
        Ok(self.store.require_story(id).await?)
    }

    /// All stories in `circle`, unordered.
    pub async fn stories(&self, circle: &CircleId) -> Result<Vec<Story>> {
        Ok(self.store.find_by_circle(circle).await?)
    }

    /// The head of `circle`, if it has one.
    pub async fn first_story(&self, circle: &CircleId) -> Result<Option<Story>> {
        Ok(self.store.first_story(circle).await?)
    }

    /// The circle's stories in chain order.
    ///
    /// Fails with `Structural` when the chain cannot be walked.
    pub async fn backlog(&self, circle: &CircleId) -> Result<Vec<Story>> {
        let stories = self.stories(circle).await?;
        chain::ordered(stories).map_err(|e| {
            warn!(%circle, error = %e, "backlog is broken");
            e.into()
        })
    }

    /// Walk the chain and report the first structural break.
    pub async fn check(&self, circle: &CircleId) -> Result<()> {
        let stories = self.stories(circle).await?;
        chain::walk(&stories).map(|_| ()).map_err(|e| {
            warn!(%circle, error = %e, "backlog is broken");
            e.into()
        })
    }

    /// Whether the circle's chain is broken.
    pub async fn is_broken(&self, circle: &CircleId) -> Result<bool> {
        let stories = self.stories(circle).await?;
        Ok(chain::is_broken(&stories))
    }

    /// Most recent archives for `circle`, newest first.
    pub async fn archives(&self, circle: &CircleId, limit: usize) -> Result<Vec<Archive>> {
        Ok(self.store.find_archives(circle, limit).await?)
    }
}
