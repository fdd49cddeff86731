//! SQLite-backed destination store

use crate::config::JobConfig;
use crate::db::schema::{self, keys, KIND_FOLDER, KIND_LEAF};
use crate::error::{DbError, DbResult, StoreError, StoreResult};
use crate::job::{JobReport, JobState};
use crate::mirror::{is_provider_root, join, DestinationStore, LeafSpec, PathMapper};
use crate::resolve::CanonicalType;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tag store persisted in a SQLite file
pub struct SqliteTagStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteTagStore {
    /// Open or create the database at `db_path`
    ///
    /// Existing tags are kept, so a re-run against the same file only adds
    /// what is missing.
    pub fn open(db_path: &Path) -> DbResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(DbError::CreateFailed {
                    path: db_path.to_path_buf(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let conn = Connection::open(db_path)?;
        schema::create_database(&conn)?;
        schema::set_job_info(&conn, keys::TOOL_VERSION, env!("CARGO_PKG_VERSION"))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn folder_count(&self) -> DbResult<u64> {
        self.count_kind(KIND_FOLDER)
    }

    pub fn leaf_count(&self) -> DbResult<u64> {
        self.count_kind(KIND_LEAF)
    }

    fn count_kind(&self, kind: i64) -> DbResult<u64> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM tags WHERE kind = ?1",
            [kind],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Payload of the leaf at `path`, if there is one
    pub fn leaf(&self, path: &str) -> DbResult<Option<LeafSpec>> {
        let row = self
            .conn
            .lock()
            .query_row(
                "SELECT source_server, item_path, data_type, enabled, value_source
                 FROM tags WHERE path = ?1 AND kind = ?2",
                params![path, KIND_LEAF],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, bool>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(source_server, item_path, data_type, enabled, value_source)| LeafSpec {
            source_server,
            item_path,
            data_type: data_type.parse().unwrap_or(CanonicalType::FALLBACK),
            enabled,
            value_source,
        }))
    }

    /// Leaf paths below `prefix`, sorted
    pub fn leaf_paths(&self, prefix: &str) -> DbResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path FROM tags WHERE kind = ?1 AND substr(path, 1, length(?2)) = ?2 ORDER BY path",
        )?;
        let paths = stmt
            .query_map(params![KIND_LEAF, prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(paths)
    }

    pub fn set_info(&self, key: &str, value: &str) -> DbResult<()> {
        schema::set_job_info(&self.conn.lock(), key, value)
    }

    pub fn get_info(&self, key: &str) -> DbResult<Option<String>> {
        schema::get_job_info(&self.conn.lock(), key)
    }

    /// Record the job's inputs and mark it running
    pub fn record_start(&self, config: &JobConfig) -> DbResult<()> {
        let root = PathMapper::from_config(config);
        self.set_info(keys::SOURCE_SERVER, &config.remote_server)?;
        self.set_info(keys::BASE_NODE, config.base_node.as_str())?;
        self.set_info(keys::DESTINATION_ROOT, root.root_path())?;
        self.set_info(keys::START_TIME, &Utc::now().to_rfc3339())?;
        self.set_info(keys::STATUS, "running")?;
        Ok(())
    }

    /// Record the job's final counts and state
    pub fn record_finish(&self, report: &JobReport) -> DbResult<()> {
        self.set_info(keys::END_TIME, &Utc::now().to_rfc3339())?;
        self.set_info(keys::STATUS, status_name(report.state))?;
        self.set_info(keys::TAGS_FOUND, &report.tags_found.to_string())?;
        self.set_info(keys::TAGS_CREATED, &report.tags_created.to_string())?;
        self.set_info(
            keys::FOLDERS_CREATED,
            &(report.folders_created + report.root_folders_created).to_string(),
        )?;
        self.set_info(keys::FAILURE_COUNT, &report.failures.len().to_string())?;
        Ok(())
    }

    fn kind_of(conn: &Connection, path: &str) -> rusqlite::Result<Option<i64>> {
        conn.query_row("SELECT kind FROM tags WHERE path = ?1", [path], |row| row.get(0))
            .optional()
    }

    fn check_parent(conn: &Connection, parent: &str) -> StoreResult<()> {
        if is_provider_root(parent) {
            return Ok(());
        }
        match Self::kind_of(conn, parent) {
            Ok(Some(KIND_FOLDER)) => Ok(()),
            Ok(_) => Err(StoreError::MissingParent {
                path: parent.to_string(),
            }),
            Err(e) => Err(StoreError::QueryFailed {
                path: parent.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Value written to the `status` key for a final state
pub fn status_name(state: JobState) -> &'static str {
    match state {
        JobState::Complete => "complete",
        JobState::PartialFailure => "partial",
        JobState::Cancelled => "cancelled",
        JobState::BrowseFailed => "failed",
        _ => "running",
    }
}

fn write_failed(path: &str, e: rusqlite::Error) -> StoreError {
    StoreError::WriteFailed {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

impl DestinationStore for SqliteTagStore {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        if is_provider_root(path) {
            return Ok(true);
        }
        Self::kind_of(&self.conn.lock(), path)
            .map(|kind| kind.is_some())
            .map_err(|e| StoreError::QueryFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    fn create_folder(&self, parent: &str, name: &str) -> StoreResult<()> {
        let path = join(parent, name);
        let conn = self.conn.lock();
        Self::check_parent(&conn, parent)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO tags (path, parent_path, name, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![path, parent, name, KIND_FOLDER, Utc::now().to_rfc3339()],
            )
            .map_err(|e| write_failed(&path, e))?;
        debug!(path = %path, inserted, "create_folder");
        Ok(())
    }

    fn create_leaf(&self, parent: &str, name: &str, spec: &LeafSpec) -> StoreResult<()> {
        let path = join(parent, name);
        let conn = self.conn.lock();
        Self::check_parent(&conn, parent)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO tags
                 (path, parent_path, name, kind, data_type, source_server, item_path,
                  enabled, value_source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    path,
                    parent,
                    name,
                    KIND_LEAF,
                    spec.data_type.as_str(),
                    spec.source_server,
                    spec.item_path,
                    spec.enabled,
                    spec.value_source,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| write_failed(&path, e))?;
        debug!(path = %path, inserted, "create_leaf");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_folder_and_leaf() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        assert!(store.exists("[default]").unwrap());
        assert!(!store.exists("[default]Target").unwrap());

        store.create_folder("[default]", "Target").unwrap();
        let spec = LeafSpec::opc("srv", "ns=2;s=CV", CanonicalType::Int64);
        store.create_leaf("[default]Target", "CV", &spec).unwrap();

        assert!(store.exists("[default]Target/CV").unwrap());
        assert_eq!(store.folder_count().unwrap(), 1);
        assert_eq!(store.leaf_count().unwrap(), 1);
        assert_eq!(store.leaf("[default]Target/CV").unwrap(), Some(spec));
        assert_eq!(store.leaf("[default]Target").unwrap(), None);
    }

    #[test]
    fn test_create_is_idempotent() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        store.create_folder("[default]", "Target").unwrap();
        store.create_folder("[default]", "Target").unwrap();

        let first = LeafSpec::opc("srv", "first", CanonicalType::Int32);
        let second = LeafSpec::opc("srv", "second", CanonicalType::String);
        store.create_leaf("[default]Target", "CV", &first).unwrap();
        store.create_leaf("[default]Target", "CV", &second).unwrap();

        assert_eq!(store.folder_count().unwrap(), 1);
        assert_eq!(store.leaf("[default]Target/CV").unwrap().unwrap().item_path, "first");
    }

    #[test]
    fn test_missing_parent() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        let err = store.create_folder("[default]Nope", "A").unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingParent {
                path: "[default]Nope".into()
            }
        );
    }

    #[test]
    fn test_reopen_keeps_tags() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tags.db");

        {
            let store = SqliteTagStore::open(&db_path).unwrap();
            store.create_folder("[edge]", "A").unwrap();
            store
                .create_leaf("[edge]A", "PV", &LeafSpec::opc("srv", "pv", CanonicalType::Float64))
                .unwrap();
        }

        let store = SqliteTagStore::open(&db_path).unwrap();
        assert_eq!(store.db_path(), Some(db_path.as_path()));
        assert!(store.exists("[edge]A/PV").unwrap());
        assert_eq!(store.leaf_paths("[edge]").unwrap(), vec!["[edge]A/PV"]);
        assert_eq!(store.get_info(keys::TOOL_VERSION).unwrap().as_deref(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("missing").join("tags.db");
        assert!(matches!(
            SqliteTagStore::open(&db_path),
            Err(DbError::CreateFailed { .. })
        ));
    }

    #[test]
    fn test_job_info_roundtrip() {
        let store = SqliteTagStore::open_in_memory().unwrap();
        let config = JobConfig::builder("opc-srv", "ns=2;s=Root", "Plant/Area")
            .build()
            .unwrap();
        store.record_start(&config).unwrap();
        assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("running"));
        assert_eq!(
            store.get_info(keys::DESTINATION_ROOT).unwrap().as_deref(),
            Some("[default]Plant/Area")
        );

        let report = JobReport {
            state: JobState::PartialFailure,
            tags_found: 4,
            tags_created: 3,
            ..Default::default()
        };
        store.record_finish(&report).unwrap();
        assert_eq!(store.get_info(keys::STATUS).unwrap().as_deref(), Some("partial"));
        assert_eq!(store.get_info(keys::TAGS_CREATED).unwrap().as_deref(), Some("3"));
    }
}
