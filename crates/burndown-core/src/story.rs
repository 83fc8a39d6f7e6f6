//! Story: the node type of a circle's backlog chain.
//!
//! A story's position is given only by its `next_id` pointer and, for the
//! head, the `is_first_story` flag. Everything else is payload and has no
//! bearing on chain structure.

use serde::{Deserialize, Serialize};

use crate::revision::Revision;
use crate::types::{CircleId, NextId, StoryId};

/// Who created a story or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub id: String,
}

/// A comment attached to a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub created_by: Option<Author>,
    /// Unix ms.
    pub timestamp: i64,
}

/// A persisted story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub revision: Revision,
    pub circle_id: CircleId,
    pub next_id: NextId,
    pub is_first_story: bool,
    pub is_deadline: bool,
    pub is_next_meeting: bool,
    pub summary: String,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub comments: Vec<Comment>,
    pub created_by: Option<Author>,
    /// Unix ms.
    pub created_at: i64,
    /// Unix ms.
    pub updated_at: i64,
}

/// The revision-relevant content of a story.
///
/// Excludes the revision itself and `updated_at`, so the digest only moves
/// when the document actually changes.
#[derive(Serialize)]
struct StoryContent<'a> {
    id: &'a StoryId,
    circle_id: &'a CircleId,
    next_id: &'a NextId,
    is_first_story: bool,
    is_deadline: bool,
    is_next_meeting: bool,
    summary: &'a str,
    owner: &'a Option<String>,
    status: &'a Option<String>,
    description: &'a Option<String>,
    comments: &'a [Comment],
    created_by: &'a Option<Author>,
    created_at: i64,
}

impl Story {
    /// Canonical CBOR encoding of the story content, used for revision digests.
    pub fn content_bytes(&self) -> Vec<u8> {
        let content = StoryContent {
            id: &self.id,
            circle_id: &self.circle_id,
            next_id: &self.next_id,
            is_first_story: self.is_first_story,
            is_deadline: self.is_deadline,
            is_next_meeting: self.is_next_meeting,
            summary: &self.summary,
            owner: &self.owner,
            status: &self.status,
            description: &self.description,
            comments: &self.comments,
            created_by: &self.created_by,
            created_at: self.created_at,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&content, &mut buf).unwrap_or_default();
        buf
    }

    /// The revision this story gets once its current content is written.
    pub fn next_revision(&self) -> Revision {
        self.revision.next(&self.content_bytes())
    }

    pub fn is_tail(&self) -> bool {
        self.next_id.is_last()
    }

    /// The pointer other stories use to reference this one.
    pub fn as_next(&self) -> NextId {
        NextId::Story(self.id.clone())
    }
}

/// A story that has not been linked into a chain yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    /// Caller-supplied id; the store generates one when absent.
    pub id: Option<StoryId>,
    pub circle_id: CircleId,
    /// Requested successor. `None` means no preference.
    pub next_id: Option<NextId>,
    pub is_first_story: bool,
    pub is_deadline: bool,
    pub is_next_meeting: bool,
    pub summary: String,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub comments: Vec<Comment>,
    pub created_by: Option<Author>,
}

impl NewStory {
    /// Materialize the stored form, assigning the id and first revision.
    ///
    /// A missing `next_id` is stored as the sentinel.
    pub fn into_story(self, id: StoryId, now: i64) -> Story {
        let mut story = Story {
            id,
            revision: Revision::first(&[]),
            circle_id: self.circle_id,
            next_id: self.next_id.unwrap_or(NextId::Last),
            is_first_story: self.is_first_story,
            is_deadline: self.is_deadline,
            is_next_meeting: self.is_next_meeting,
            summary: self.summary,
            owner: self.owner,
            status: self.status,
            description: self.description,
            comments: self.comments,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        };
        story.revision = Revision::first(&story.content_bytes());
        story
    }
}

/// Builder for [`NewStory`].
#[derive(Debug, Clone)]
pub struct StoryBuilder {
    story: NewStory,
}

impl StoryBuilder {
    pub fn new(circle_id: CircleId) -> Self {
        Self {
            story: NewStory {
                id: None,
                circle_id,
                next_id: None,
                is_first_story: false,
                is_deadline: false,
                is_next_meeting: false,
                summary: String::new(),
                owner: None,
                status: None,
                description: None,
                comments: Vec::new(),
                created_by: None,
            },
        }
    }

    pub fn id(mut self, id: StoryId) -> Self {
        self.story.id = Some(id);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.story.summary = summary.into();
        self
    }

    /// Request a position immediately before `next`.
    pub fn before(mut self, next: impl Into<NextId>) -> Self {
        self.story.next_id = Some(next.into());
        self
    }

    /// Request a position at the end of the chain.
    pub fn at_tail(mut self) -> Self {
        self.story.next_id = Some(NextId::Last);
        self
    }

    pub fn deadline(mut self) -> Self {
        self.story.is_deadline = true;
        self
    }

    pub fn next_meeting(mut self) -> Self {
        self.story.is_next_meeting = true;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.story.owner = Some(owner.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.story.status = Some(status.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.story.description = Some(description.into());
        self
    }

    pub fn created_by(mut self, author: Author) -> Self {
        self.story.created_by = Some(author);
        self
    }

    pub fn build(self) -> NewStory {
        self.story
    }
}

/// A frozen copy of an archived story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub story_id: StoryId,
    pub circle_id: CircleId,
    pub summary: String,
    pub owner: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub comments: Vec<Comment>,
    pub created_by: Option<Author>,
    pub is_deadline: bool,
    /// Unix ms.
    pub archived_at: i64,
}

impl Archive {
    pub fn from_story(story: &Story, archived_at: i64) -> Self {
        Self {
            story_id: story.id.clone(),
            circle_id: story.circle_id.clone(),
            summary: story.summary.clone(),
            owner: story.owner.clone(),
            status: story.status.clone(),
            description: story.description.clone(),
            comments: story.comments.clone(),
            created_by: story.created_by.clone(),
            is_deadline: story.is_deadline,
            archived_at,
        }
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle() -> CircleId {
        CircleId::new("circle-1").unwrap()
    }

    #[test]
    fn test_builder_defaults_to_unlinked() {
        let story = StoryBuilder::new(circle()).summary("write docs").build();
        assert!(story.next_id.is_none());
        assert!(!story.is_first_story);
        assert_eq!(story.summary, "write docs");
    }

    #[test]
    fn test_into_story_defaults_next_to_sentinel() {
        let id = StoryId::new("s1").unwrap();
        let story = StoryBuilder::new(circle()).build().into_story(id.clone(), 1000);
        assert_eq!(story.id, id);
        assert!(story.is_tail());
        assert_eq!(story.revision.generation(), 1);
        assert_eq!(story.revision, Revision::first(&story.content_bytes()));
    }

    #[test]
    fn test_content_digest_tracks_pointer_changes() {
        let id = StoryId::new("s1").unwrap();
        let mut story = StoryBuilder::new(circle()).build().into_story(id, 1000);
        let before = story.content_bytes();

        story.next_id = NextId::Story(StoryId::new("s2").unwrap());
        assert_ne!(before, story.content_bytes());

        story.next_id = NextId::Last;
        story.updated_at = 99_999;
        assert_eq!(before, story.content_bytes());
    }

    #[test]
    fn test_archive_copies_payload() {
        let id = StoryId::new("s1").unwrap();
        let story = StoryBuilder::new(circle())
            .summary("ship it")
            .owner("ana")
            .deadline()
            .build()
            .into_story(id.clone(), 1000);

        let archive = Archive::from_story(&story, 2000);
        assert_eq!(archive.story_id, id);
        assert_eq!(archive.owner.as_deref(), Some("ana"));
        assert!(archive.is_deadline);
        assert_eq!(archive.archived_at, 2000);
    }
}
