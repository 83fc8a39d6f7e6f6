//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Each trait call runs under the
//! connection mutex, which is what gives us per-document atomicity for the
//! revision-checked read-modify-write in `update_story` and `delete_story`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use burndown_core::{
    now_millis, Archive, Author, CircleId, Comment, CoreError, NewStory, NextId, Revision,
    Setting, Story, StoryId, Visibility,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

const STORY_COLUMNS: &str = "story_id, circle_id, next_id, is_first_story, is_deadline, \
     is_next_meeting, summary, owner, status, description, comments, created_by, \
     created_at, updated_at, revision";

const ARCHIVE_COLUMNS: &str = "story_id, circle_id, summary, owner, status, description, \
     comments, created_by, is_deadline, archived_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

fn encode_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, CoreError> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::EncodingError(e.to_string()))
}

fn conversion_failure(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

// Helper to convert a row to Story
fn row_to_story(row: &rusqlite::Row<'_>) -> rusqlite::Result<Story> {
    let id: String = row.get("story_id")?;
    let circle_id: String = row.get("circle_id")?;
    let next_id: String = row.get("next_id")?;
    let comments: Vec<u8> = row.get("comments")?;
    let created_by: Option<Vec<u8>> = row.get("created_by")?;
    let revision: String = row.get("revision")?;

    Ok(Story {
        id: StoryId::new(id).map_err(|e| conversion_failure(0, e))?,
        revision: revision.parse().map_err(|e| conversion_failure(14, e))?,
        circle_id: CircleId::new(circle_id).map_err(|e| conversion_failure(1, e))?,
        next_id: NextId::parse(&next_id).map_err(|e| conversion_failure(2, e))?,
        is_first_story: row.get("is_first_story")?,
        is_deadline: row.get("is_deadline")?,
        is_next_meeting: row.get("is_next_meeting")?,
        summary: row.get("summary")?,
        owner: row.get("owner")?,
        status: row.get("status")?,
        description: row.get("description")?,
        comments: decode_cbor::<Vec<Comment>>(&comments).map_err(|e| conversion_failure(10, e))?,
        created_by: created_by
            .map(|b| decode_cbor::<Author>(&b))
            .transpose()
            .map_err(|e| conversion_failure(11, e))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_archive(row: &rusqlite::Row<'_>) -> rusqlite::Result<Archive> {
    let story_id: String = row.get("story_id")?;
    let circle_id: String = row.get("circle_id")?;
    let comments: Vec<u8> = row.get("comments")?;
    let created_by: Option<Vec<u8>> = row.get("created_by")?;

    Ok(Archive {
        story_id: StoryId::new(story_id).map_err(|e| conversion_failure(0, e))?,
        circle_id: CircleId::new(circle_id).map_err(|e| conversion_failure(1, e))?,
        summary: row.get("summary")?,
        owner: row.get("owner")?,
        status: row.get("status")?,
        description: row.get("description")?,
        comments: decode_cbor::<Vec<Comment>>(&comments).map_err(|e| conversion_failure(6, e))?,
        created_by: created_by
            .map(|b| decode_cbor::<Author>(&b))
            .transpose()
            .map_err(|e| conversion_failure(7, e))?,
        is_deadline: row.get("is_deadline")?,
        archived_at: row.get("archived_at")?,
    })
}

fn query_stories<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<Story>> {
    let sql = format!(
        "SELECT {} FROM stories WHERE {} ORDER BY story_id",
        STORY_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let stories = stmt
        .query_map(params, row_to_story)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(stories)
}

/// A revision-checked write touched no rows. Work out why.
fn stale_or_missing(conn: &Connection, id: &StoryId, presented: &Revision) -> Result<StoreError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT revision FROM stories WHERE story_id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        None => Ok(StoreError::NotFound(format!("story {}", id))),
        Some(text) => {
            let stored: Revision = text
                .parse()
                .map_err(|e: CoreError| StoreError::InvalidData(e.to_string()))?;
            Ok(StoreError::RevisionConflict {
                id: id.clone(),
                presented: *presented,
                stored,
            })
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_story(&self, story: &NewStory) -> Result<Story> {
        let story = story.clone();

        self.blocking(move |conn| {
            let id = story.id.clone().unwrap_or_else(StoryId::generate);

            let existing: Option<String> = conn
                .query_row(
                    "SELECT story_id FROM stories WHERE story_id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Err(StoreError::AlreadyExists(id));
            }

            let stored = story.into_story(id, now_millis());
            let comments = encode_cbor(&stored.comments)?;
            let created_by = stored.created_by.as_ref().map(encode_cbor).transpose()?;

            conn.execute(
                &format!(
                    "INSERT INTO stories ({}) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    STORY_COLUMNS
                ),
                params![
                    stored.id.as_str(),
                    stored.circle_id.as_str(),
                    stored.next_id.to_string(),
                    stored.is_first_story,
                    stored.is_deadline,
                    stored.is_next_meeting,
                    stored.summary,
                    stored.owner,
                    stored.status,
                    stored.description,
                    comments,
                    created_by,
                    stored.created_at,
                    stored.updated_at,
                    stored.revision.to_string(),
                ],
            )?;

            Ok(stored)
        })
        .await
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>> {
        let id = id.clone();

        self.blocking(move |conn| {
            let story = conn
                .query_row(
                    &format!("SELECT {} FROM stories WHERE story_id = ?1", STORY_COLUMNS),
                    params![id.as_str()],
                    row_to_story,
                )
                .optional()?;
            Ok(story)
        })
        .await
    }

    async fn update_story(&self, story: &Story) -> Result<Story> {
        let story = story.clone();

        self.blocking(move |conn| {
            let mut updated = story.clone();
            updated.revision = story.next_revision();
            updated.updated_at = now_millis();

            let comments = encode_cbor(&updated.comments)?;
            let created_by = updated.created_by.as_ref().map(encode_cbor).transpose()?;

            let changed = conn.execute(
                "UPDATE stories SET
                    circle_id = ?1, next_id = ?2, is_first_story = ?3, is_deadline = ?4,
                    is_next_meeting = ?5, summary = ?6, owner = ?7, status = ?8,
                    description = ?9, comments = ?10, created_by = ?11, created_at = ?12,
                    updated_at = ?13, revision = ?14
                 WHERE story_id = ?15 AND revision = ?16",
                params![
                    updated.circle_id.as_str(),
                    updated.next_id.to_string(),
                    updated.is_first_story,
                    updated.is_deadline,
                    updated.is_next_meeting,
                    updated.summary,
                    updated.owner,
                    updated.status,
                    updated.description,
                    comments,
                    created_by,
                    updated.created_at,
                    updated.updated_at,
                    updated.revision.to_string(),
                    story.id.as_str(),
                    story.revision.to_string(),
                ],
            )?;

            if changed == 0 {
                return Err(stale_or_missing(conn, &story.id, &story.revision)?);
            }

            Ok(updated)
        })
        .await
    }

    async fn delete_story(&self, id: &StoryId, revision: &Revision) -> Result<()> {
        let id = id.clone();
        let revision = *revision;

        self.blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM stories WHERE story_id = ?1 AND revision = ?2",
                params![id.as_str(), revision.to_string()],
            )?;

            if changed == 0 {
                return Err(stale_or_missing(conn, &id, &revision)?);
            }

            Ok(())
        })
        .await
    }

    async fn find_by_next_id(&self, circle: &CircleId, next: &NextId) -> Result<Vec<Story>> {
        let circle = circle.clone();
        let next = next.to_string();

        self.blocking(move |conn| {
            query_stories(
                conn,
                "circle_id = ?1 AND next_id = ?2",
                params![circle.as_str(), next],
            )
        })
        .await
    }

    async fn find_by_circle(&self, circle: &CircleId) -> Result<Vec<Story>> {
        let circle = circle.clone();

        self.blocking(move |conn| query_stories(conn, "circle_id = ?1", params![circle.as_str()]))
            .await
    }

    async fn first_story(&self, circle: &CircleId) -> Result<Option<Story>> {
        let circle = circle.clone();

        self.blocking(move |conn| {
            let heads = query_stories(
                conn,
                "circle_id = ?1 AND is_first_story = 1",
                params![circle.as_str()],
            )?;
            Ok(heads.into_iter().next())
        })
        .await
    }

    async fn count_stories(&self, circle: &CircleId) -> Result<usize> {
        let circle = circle.clone();

        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM stories WHERE circle_id = ?1",
                params![circle.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn find_next_meeting(&self, circle: &CircleId) -> Result<Option<Story>> {
        let circle = circle.clone();

        self.blocking(move |conn| {
            let meetings = query_stories(
                conn,
                "circle_id = ?1 AND is_next_meeting = 1",
                params![circle.as_str()],
            )?;
            Ok(meetings.into_iter().next())
        })
        .await
    }

    async fn insert_archive(&self, archive: &Archive) -> Result<()> {
        let archive = archive.clone();

        self.blocking(move |conn| {
            let comments = encode_cbor(&archive.comments)?;
            let created_by = archive.created_by.as_ref().map(encode_cbor).transpose()?;

            conn.execute(
                &format!(
                    "INSERT INTO archives ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    ARCHIVE_COLUMNS
                ),
                params![
                    archive.story_id.as_str(),
                    archive.circle_id.as_str(),
                    archive.summary,
                    archive.owner,
                    archive.status,
                    archive.description,
                    comments,
                    created_by,
                    archive.is_deadline,
                    archive.archived_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_archives(&self, circle: &CircleId, limit: usize) -> Result<Vec<Archive>> {
        let circle = circle.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM archives WHERE circle_id = ?1
                 ORDER BY archived_at DESC, archive_id DESC LIMIT ?2",
                ARCHIVE_COLUMNS
            ))?;

            let archives = stmt
                .query_map(params![circle.as_str(), limit as i64], row_to_archive)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(archives)
        })
        .await
    }

    async fn count_archives(&self, circle: &CircleId) -> Result<usize> {
        let circle = circle.clone();

        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM archives WHERE circle_id = ?1",
                params![circle.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn get_settings(&self) -> Result<Vec<Setting>> {
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT name, value, visibility FROM settings ORDER BY name")?;

            let settings = stmt
                .query_map([], |row| {
                    let value: String = row.get(1)?;
                    let visibility: String = row.get(2)?;
                    Ok(Setting {
                        name: row.get(0)?,
                        value: serde_json::from_str(&value).map_err(|e| conversion_failure(1, e))?,
                        visibility: visibility
                            .parse::<Visibility>()
                            .map_err(|e| conversion_failure(2, e))?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(settings)
        })
        .await
    }

    async fn put_setting(&self, setting: &Setting) -> Result<()> {
        let setting = setting.clone();

        self.blocking(move |conn| {
            let value = serde_json::to_string(&setting.value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            conn.execute(
                "INSERT INTO settings (name, value, visibility) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET
                    value = excluded.value,
                    visibility = excluded.visibility",
                params![setting.name, value, setting.visibility.as_str()],
            )?;
            Ok(())
        })
        .await
    }
}
