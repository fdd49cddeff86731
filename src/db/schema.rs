//! Tag database schema
//!
//! One `tags` table holds both folders and leaves, keyed by their fully
//! qualified path. Job metadata goes into a key/value `job_info` table.

use crate::error::DbResult;
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// `kind` column value for folders
pub const KIND_FOLDER: i64 = 0;

/// `kind` column value for leaves
pub const KIND_LEAF: i64 = 1;

const CREATE_TAGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    parent_path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind INTEGER NOT NULL,        -- 0=folder, 1=leaf
    data_type TEXT,               -- leaves only
    source_server TEXT,
    item_path TEXT,
    enabled INTEGER,
    value_source TEXT,
    created_at TEXT NOT NULL      -- RFC 3339
)
"#;

const CREATE_JOB_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS job_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tags_parent ON tags(parent_path)",
    "CREATE INDEX IF NOT EXISTS idx_tags_kind ON tags(kind)",
];

/// Pragmas for a single-writer file
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
PRAGMA foreign_keys = OFF;
"#;

/// Configure a connection and create missing tables
pub fn create_database(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(PRAGMAS)?;

    conn.execute(CREATE_TAGS_TABLE, [])?;
    conn.execute(CREATE_JOB_INFO_TABLE, [])?;
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }

    set_job_info(conn, keys::SCHEMA_VERSION, &SCHEMA_VERSION.to_string())?;
    Ok(())
}

/// Store job metadata
pub fn set_job_info(conn: &Connection, key: &str, value: &str) -> DbResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO job_info (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get job metadata
pub fn get_job_info(conn: &Connection, key: &str) -> DbResult<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM job_info WHERE key = ?1",
        [key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Metadata keys written by the binary
pub mod keys {
    /// Remote server the tags read from
    pub const SOURCE_SERVER: &str = "source_server";

    /// Base node the walk started at
    pub const BASE_NODE: &str = "base_node";

    /// Qualified destination root
    pub const DESTINATION_ROOT: &str = "destination_root";

    /// Timestamp when the job started (RFC 3339)
    pub const START_TIME: &str = "start_time";

    /// Timestamp when the job ended (RFC 3339)
    pub const END_TIME: &str = "end_time";

    /// Final job state: "running", "complete", "partial", "cancelled", "failed"
    pub const STATUS: &str = "status";

    pub const TAGS_FOUND: &str = "tags_found";

    pub const TAGS_CREATED: &str = "tags_created";

    pub const FOLDERS_CREATED: &str = "folders_created";

    pub const FAILURE_COUNT: &str = "failure_count";

    pub const SCHEMA_VERSION: &str = "schema_version";

    pub const TOOL_VERSION: &str = "tool_version";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('tags', 'job_info')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);

        // Reopening an existing schema is fine
        create_database(&conn).unwrap();
        assert_eq!(
            get_job_info(&conn, keys::SCHEMA_VERSION).unwrap(),
            Some(SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn test_job_info() {
        let conn = Connection::open_in_memory().unwrap();
        create_database(&conn).unwrap();

        set_job_info(&conn, keys::STATUS, "running").unwrap();
        set_job_info(&conn, keys::STATUS, "complete").unwrap();

        assert_eq!(get_job_info(&conn, keys::STATUS).unwrap(), Some("complete".into()));
        assert_eq!(get_job_info(&conn, "nonexistent").unwrap(), None);
    }
}
