//! Error types for tag-mirror
//!
//! This module defines the error hierarchy for a mirror job:
//! - Configuration errors (fatal, raised before any remote call)
//! - Remote namespace errors (browse and value reads, retried when transient)
//! - Destination store errors (folder and leaf creation)
//! - SQLite errors for the bundled destination store
//!
//! Node-level and request-level failures never abort a job. They are
//! recorded as [`NodeOutcome`]s and [`FailureRecord`]s and reported at the end.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tag-mirror
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Invalid job configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote namespace errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Destination store errors
    #[error("Destination error: {0}")]
    Store(#[from] StoreError),

    /// SQLite destination errors
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The base node could not be browsed at all
    #[error("Failed to browse base node '{node}': {source}")]
    BrowseFailed { node: String, source: RemoteError },

    /// I/O errors (snapshot files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot parse errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Configuration errors, always detected before the job touches the remote
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Missing remote server reference
    #[error("Remote server reference must not be empty")]
    EmptyServer,

    /// Missing base node reference
    #[error("Base node reference must not be empty")]
    EmptyBaseNode,

    /// Destination root has no usable segment
    #[error("Invalid destination root '{path}': {reason}")]
    InvalidRoot { path: String, reason: String },

    /// Tag provider name is unusable
    #[error("Invalid tag provider '{provider}': {reason}")]
    InvalidProvider { provider: String, reason: String },

    /// Batch size out of range
    #[error("Invalid batch size {size}: must be between {min} and {max}")]
    InvalidBatchSize { size: usize, min: usize, max: usize },

    /// Iteration bound must be positive
    #[error("Invalid max iterations {0}: must be at least 1")]
    InvalidMaxIterations(usize),

    /// Retry attempts must be positive
    #[error("Invalid retry attempts {0}: must be at least 1")]
    InvalidRetryAttempts(u32),

    /// Name filter contains an empty name
    #[error("Name filter contains an empty name")]
    EmptyFilterName,

    /// Unknown data type name
    #[error("Unknown data type '{0}'")]
    UnknownDataType(String),

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },
}

/// Errors from the remote namespace client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Remote endpoint not reachable
    #[error("Remote unavailable while accessing '{node}': {reason}")]
    Unavailable { node: String, reason: String },

    /// Remote call did not complete in time
    #[error("Remote call timed out for '{node}'")]
    Timeout { node: String },

    /// Value read failed
    #[error("Failed to read value of '{node}': {reason}")]
    ReadFailed { node: String, reason: String },

    /// Node does not exist on the remote
    #[error("Node not found: '{node}'")]
    NotFound { node: String },

    /// Node id rejected by the remote
    #[error("Invalid node id '{node}'")]
    InvalidNode { node: String },

    /// Retry budget exhausted
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<RemoteError> },
}

impl RemoteError {
    /// Check if this error is worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Unavailable { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::ReadFailed { .. }
        )
    }

    /// Check if this is the terminal error raised by a retry policy
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RemoteError::Exhausted { .. })
    }
}

/// Destination store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Folder or leaf creation was rejected
    #[error("Failed to write '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    /// Parent folder missing for a create call
    #[error("Parent folder '{path}' does not exist")]
    MissingParent { path: String },

    /// Existence check failed
    #[error("Failed to query '{path}': {reason}")]
    QueryFailed { path: String, reason: String },
}

/// SQLite errors for [`crate::db::SqliteTagStore`]
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to create database file
    #[error("Failed to create database at '{path}': {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        StoreError::WriteFailed {
            path: String::from("<database>"),
            reason: e.to_string(),
        }
    }
}

/// Result type alias for MirrorError
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for RemoteError
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for DbError
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Outcome of browsing a single remote node
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Children were listed
    Browsed { node: String, children: usize },

    /// Node was not browsed (already visited, empty, or filtered)
    Skipped { node: String, reason: String },

    /// Browsing failed after retries; subtree left unexplored
    Failed { node: String, error: RemoteError },
}

impl NodeOutcome {
    /// Returns true if this outcome represents a successful browse
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Browsed { .. })
    }

    /// Returns the node associated with this outcome
    pub fn node(&self) -> &str {
        match self {
            NodeOutcome::Browsed { node, .. } => node,
            NodeOutcome::Skipped { node, .. } => node,
            NodeOutcome::Failed { node, .. } => node,
        }
    }
}

/// Where in the job a non-fatal failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Remote browse exhausted its retries
    Browse,
    /// Folder creation failed
    Folder,
    /// Leaf creation failed
    Leaf,
}

/// A non-fatal failure kept for the job report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub kind: FailureKind,
    /// Remote node id or destination path
    pub target: String,
    pub message: String,
}

impl FailureRecord {
    pub fn new(kind: FailureKind, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            message: message.into(),
        }
    }
}
