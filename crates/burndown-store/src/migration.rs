//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use burndown_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            tracing::debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Story documents: one row per chain node
        CREATE TABLE stories (
            story_id TEXT PRIMARY KEY,
            circle_id TEXT NOT NULL,
            next_id TEXT NOT NULL,              -- successor story id, or 'last'
            is_first_story INTEGER NOT NULL DEFAULT 0,
            is_deadline INTEGER NOT NULL DEFAULT 0,
            is_next_meeting INTEGER NOT NULL DEFAULT 0,
            summary TEXT NOT NULL,
            owner TEXT,
            status TEXT,
            description TEXT,
            comments BLOB NOT NULL,             -- CBOR array of comments
            created_by BLOB,                    -- CBOR author, nullable
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            revision TEXT NOT NULL              -- '<generation>-<digest>'
        );

        -- Archived stories
        CREATE TABLE archives (
            archive_id INTEGER PRIMARY KEY AUTOINCREMENT,
            story_id TEXT NOT NULL,
            circle_id TEXT NOT NULL,
            summary TEXT NOT NULL,
            owner TEXT,
            status TEXT,
            description TEXT,
            comments BLOB NOT NULL,
            created_by BLOB,
            is_deadline INTEGER NOT NULL DEFAULT 0,
            archived_at INTEGER NOT NULL
        );

        -- Settings records
        CREATE TABLE settings (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,                -- JSON
            visibility TEXT NOT NULL            -- public | private | secret
        );

        -- Pointer index for collision and predecessor lookups
        CREATE INDEX idx_stories_circle_next ON stories(circle_id, next_id);
        CREATE INDEX idx_stories_circle_first ON stories(circle_id, is_first_story);
        CREATE INDEX idx_archives_circle_time ON archives(circle_id, archived_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"stories".to_string()));
        assert!(tables.contains(&"archives".to_string()));
        assert!(tables.contains(&"settings".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_refuses_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
