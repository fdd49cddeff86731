//! Destination mirroring
//!
//! Turns discovered leaves into folders and leaves in a destination tag
//! store. Creation is idempotent: every folder and leaf is checked for
//! existence first, and existing entries are never touched. A per-job
//! [`FolderCache`] keeps the existence checks to one per distinct folder.
//!
//! ```text
//!   DiscoveredLeaf ──► PathMapper ──► TagCreationRequest
//!                                          │
//!                         BatchScheduler (chunks + pause)
//!                                          │
//!                                          ▼
//!                          MirrorStore (FolderCache, TypeResolver)
//!                                          │
//!                                          ▼
//!                                  DestinationStore
//! ```
//!
//! Paths are fully qualified with the tag provider: `[provider]A/B/CV`.

pub mod memory;
pub mod paths;
pub mod store;

pub use memory::{MemoryTagStore, StoreCalls};
pub use paths::{join, provider_root, PathMapper, TagCreationRequest};
pub use store::{FolderCache, LeafOutcome, MaterializeSummary, MirrorStore};

use crate::error::StoreResult;
use crate::resolve::CanonicalType;

/// Where a created leaf takes its value from
pub const VALUE_SOURCE_OPC: &str = "opc";

/// Payload of a created leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafSpec {
    /// Remote connection the leaf reads from
    pub source_server: String,

    /// Remote node id the leaf reads
    pub item_path: String,

    pub data_type: CanonicalType,

    pub enabled: bool,

    pub value_source: String,
}

impl LeafSpec {
    pub fn opc(source_server: impl Into<String>, item_path: impl Into<String>, data_type: CanonicalType) -> Self {
        Self {
            source_server: source_server.into(),
            item_path: item_path.into(),
            data_type,
            enabled: true,
            value_source: VALUE_SOURCE_OPC.to_string(),
        }
    }
}

/// Hierarchical store that receives the mirror
///
/// `parent` arguments are fully qualified folder paths; the provider root
/// (`[provider]`) always exists. Create calls on a path that already
/// exists must succeed without changing it.
pub trait DestinationStore {
    fn exists(&self, path: &str) -> StoreResult<bool>;

    fn create_folder(&self, parent: &str, name: &str) -> StoreResult<()>;

    fn create_leaf(&self, parent: &str, name: &str, spec: &LeafSpec) -> StoreResult<()>;
}

impl<T: DestinationStore + ?Sized> DestinationStore for &T {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        (**self).exists(path)
    }

    fn create_folder(&self, parent: &str, name: &str) -> StoreResult<()> {
        (**self).create_folder(parent, name)
    }

    fn create_leaf(&self, parent: &str, name: &str, spec: &LeafSpec) -> StoreResult<()> {
        (**self).create_leaf(parent, name, spec)
    }
}

/// Check if a path is a provider root such as `[default]`
pub fn is_provider_root(path: &str) -> bool {
    path.len() > 2 && path.starts_with('[') && path.ends_with(']') && !path[1..].contains('[')
}
