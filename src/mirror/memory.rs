//! In-memory destination store
//!
//! Keeps folders and leaves in a sorted map keyed by qualified path and
//! counts every call, so tests can assert on exact call numbers.

use crate::error::{StoreError, StoreResult};
use crate::mirror::{is_provider_root, join, DestinationStore, LeafSpec};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

/// Entry kinds held by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    Folder,
    Leaf(LeafSpec),
}

/// Calls made against a [`MemoryTagStore`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreCalls {
    pub exists: u64,
    pub create_folder: u64,
    pub create_leaf: u64,
}

impl StoreCalls {
    /// Calls that would change the store
    pub fn mutating(&self) -> u64 {
        self.create_folder + self.create_leaf
    }
}

/// Destination store held in memory
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    nodes: Mutex<BTreeMap<String, MemoryNode>>,
    calls: Mutex<StoreCalls>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a folder as if it had existed before the job
    pub fn insert_folder(&self, path: &str) {
        self.nodes.lock().insert(path.to_string(), MemoryNode::Folder);
    }

    /// Make every create call for `path` fail
    pub fn fail_create(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn calls(&self) -> StoreCalls {
        *self.calls.lock()
    }

    pub fn reset_calls(&self) {
        *self.calls.lock() = StoreCalls::default();
    }

    /// Qualified paths of all folders, sorted
    pub fn folders(&self) -> Vec<String> {
        self.nodes
            .lock()
            .iter()
            .filter(|(_, n)| matches!(n, MemoryNode::Folder))
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Qualified paths of all leaves, sorted
    pub fn leaves(&self) -> Vec<String> {
        self.nodes
            .lock()
            .iter()
            .filter(|(_, n)| matches!(n, MemoryNode::Leaf(_)))
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn leaf(&self, path: &str) -> Option<LeafSpec> {
        match self.nodes.lock().get(path) {
            Some(MemoryNode::Leaf(spec)) => Some(spec.clone()),
            _ => None,
        }
    }

    fn check_create(&self, parent: &str, path: &str) -> StoreResult<bool> {
        if self.failing.lock().contains(path) {
            return Err(StoreError::WriteFailed {
                path: path.to_string(),
                reason: "rejected by store".into(),
            });
        }

        let nodes = self.nodes.lock();
        if !is_provider_root(parent) && !matches!(nodes.get(parent), Some(MemoryNode::Folder)) {
            return Err(StoreError::MissingParent {
                path: parent.to_string(),
            });
        }
        Ok(nodes.contains_key(path))
    }
}

impl DestinationStore for MemoryTagStore {
    fn exists(&self, path: &str) -> StoreResult<bool> {
        self.calls.lock().exists += 1;
        Ok(is_provider_root(path) || self.nodes.lock().contains_key(path))
    }

    fn create_folder(&self, parent: &str, name: &str) -> StoreResult<()> {
        self.calls.lock().create_folder += 1;
        let path = join(parent, name);
        if !self.check_create(parent, &path)? {
            self.nodes.lock().insert(path, MemoryNode::Folder);
        }
        Ok(())
    }

    fn create_leaf(&self, parent: &str, name: &str, spec: &LeafSpec) -> StoreResult<()> {
        self.calls.lock().create_leaf += 1;
        let path = join(parent, name);
        if !self.check_create(parent, &path)? {
            self.nodes.lock().insert(path, MemoryNode::Leaf(spec.clone()));
        }
        Ok(())
    }
}
