//! tag-mirror - Remote namespace to tag store mirroring
//!
//! Walks a remote hierarchical namespace (an OPC-style browse tree),
//! collects the leaves whose display names match a filter, and mirrors
//! them as folders and leaves into a destination tag store. Creation is
//! idempotent, so a job can be re-run safely after a partial failure.
//!
//! # Features
//!
//! - **Breadth-first walk**: Explicit queue with a visited set and an
//!   iteration bound, so back-references and very deep trees are safe.
//!
//! - **Bounded retries**: Every remote call goes through a
//!   [`RetryPolicy`]; a node that keeps failing is skipped, not fatal.
//!
//! - **Cached, idempotent creation**: Each destination folder is checked
//!   and created at most once per job; existing entries are never touched.
//!
//! - **Paced writes**: Requests are applied in chunks with a short pause
//!   between them.
//!
//! - **Dry run**: Reports the would-be destination paths without a
//!   single call to the destination store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ RemoteNamespaceClient│
//! └──────────┬───────────┘
//!            │ browse / read (RetryPolicy)
//!            ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │   NamespaceWalker    │─────►│     PathMapper       │──► preview (dry run)
//! │ (BFS + VisitedSet)   │      └──────────┬───────────┘
//! └──────────────────────┘                 │ TagCreationRequest
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │   BatchScheduler     │
//!                               └──────────┬───────────┘
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │ MirrorStore          │
//!                               │ (FolderCache,        │
//!                               │  TypeResolver)       │
//!                               └──────────┬───────────┘
//!                                          ▼
//!                               ┌──────────────────────┐
//!                               │  DestinationStore    │
//!                               └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Preview what would be created
//! tag-mirror plant.json --base "ns=2;s=BRX001" --root DELTAV/BRX001 -t CV -t SP
//!
//! # Apply into a SQLite tag database
//! tag-mirror plant.json --base "ns=2;s=BRX001" --root DELTAV/BRX001 -t CV --apply -o tags.db
//! ```

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod mirror;
pub mod progress;
pub mod remote;
pub mod resolve;
pub mod retry;
pub mod walker;

pub use config::{CliArgs, DataTypeChoice, JobConfig, NameFilter};
pub use error::{MirrorError, Result};
pub use job::{CancelFlag, JobReport, JobState, MirrorJob};
pub use mirror::{DestinationStore, MemoryTagStore};
pub use remote::{RemoteNamespaceClient, SnapshotClient};
pub use retry::RetryPolicy;
pub use walker::{NamespaceWalker, WalkResult};
