//! SQLite tag database
//!
//! The binary mirrors into a local SQLite file. Folders and leaves share
//! one `tags` table keyed by their qualified path, so an existence check
//! is a single indexed lookup and re-running a job against the same file
//! only inserts what is missing.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   MirrorStore (one thread)   │
//! └──────────────┬───────────────┘
//!                │ exists / create_folder / create_leaf
//!                ▼
//! ┌──────────────────────────────┐
//! │ SqliteTagStore (Mutex<Conn>) │
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │   tags + job_info (WAL)      │
//! └──────────────────────────────┘
//! ```

pub mod schema;
pub mod store;

pub use schema::{create_database, get_job_info, keys, set_job_info};
pub use store::{status_name, SqliteTagStore};
