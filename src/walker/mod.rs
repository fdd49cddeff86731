//! Remote namespace discovery
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────────────────────┐
//!                 │     NamespaceWalker     │
//!                 │  - FIFO BrowseQueue     │
//!                 │  - VisitedSet           │
//!                 │  - max_iterations bound │
//!                 └───────────┬─────────────┘
//!                             │ browse (via RetryPolicy)
//!                             ▼
//!                 ┌─────────────────────────┐
//!                 │  RemoteNamespaceClient  │
//!                 └─────────────────────────┘
//! ```
//!
//! The walk produces a flat list of [`DiscoveredLeaf`]s with their path
//! relative to the base node.

pub mod namespace;
pub mod queue;

pub use namespace::{DiscoveredLeaf, NamespaceWalker, WalkResult, WalkStats, IGNORED_CHILDREN};
pub use queue::{BrowseQueue, BrowseTask, QueueStats, VisitedSet};
