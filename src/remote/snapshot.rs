//! In-memory namespace client
//!
//! Serves browse and read calls from a tree held in memory. The tree comes
//! either from a JSON snapshot file or from [`SnapshotBuilder`].
//!
//! Snapshot format:
//!
//! ```json
//! {
//!   "server": "DeltaV",
//!   "root": {
//!     "id": "ns=2;s=Root", "name": "Root",
//!     "children": [
//!       { "id": "ns=2;s=A", "name": "A",
//!         "children": [ { "id": "ns=2;s=A.CV", "name": "CV",
//!                         "value": { "type": "Double", "value": 1.0 } } ],
//!         "links": ["ns=2;s=Root"] }
//!     ]
//!   }
//! }
//! ```
//!
//! `links` adds extra children by id, so redundant edges and back-references
//! to ancestors can be expressed.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::types::{BrowseItem, NativeValue, NodeId, StructuralClass};
use crate::remote::RemoteNamespaceClient;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    server: String,
    root: SnapshotNode,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotNode {
    id: NodeId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<NativeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<SnapshotNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    links: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    value: Option<NativeValue>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Faults {
    browse: HashMap<NodeId, VecDeque<RemoteError>>,
    read: HashMap<NodeId, VecDeque<RemoteError>>,
}

#[derive(Debug, Default)]
struct CallLog {
    browse: HashMap<NodeId, u32>,
    read: HashMap<NodeId, u32>,
}

/// Namespace client backed by an in-memory tree
#[derive(Debug)]
pub struct SnapshotClient {
    server: String,
    root: NodeId,
    nodes: HashMap<NodeId, Entry>,
    faults: Mutex<Faults>,
    calls: Mutex<CallLog>,
}

impl SnapshotClient {
    /// Start building a namespace with the given root node
    pub fn builder(
        server: impl Into<String>,
        root_id: impl Into<NodeId>,
        root_name: impl Into<String>,
    ) -> SnapshotBuilder {
        SnapshotBuilder::new(server, root_id, root_name)
    }

    /// Parse a JSON snapshot
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let file: SnapshotFile = serde_json::from_str(json)?;
        let mut builder = SnapshotBuilder::new(file.server, file.root.id.clone(), file.root.name.clone());
        builder.absorb(None, file.root);
        Ok(builder.build())
    }

    /// Load a JSON snapshot from disk
    pub fn from_path(path: &Path) -> crate::error::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&json)?)
    }

    /// Root node of the snapshot
    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// Number of nodes in the snapshot
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Make the next `times` browse calls on `node` fail with `error`
    pub fn fail_browse(&self, node: impl Into<NodeId>, times: u32, error: RemoteError) {
        let mut faults = self.faults.lock();
        let queue = faults.browse.entry(node.into()).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Make the next `times` read calls on `node` fail with `error`
    pub fn fail_read(&self, node: impl Into<NodeId>, times: u32, error: RemoteError) {
        let mut faults = self.faults.lock();
        let queue = faults.read.entry(node.into()).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Browse calls issued for one node, failed attempts included
    pub fn browse_count(&self, node: &str) -> u32 {
        self.calls.lock().browse.get(&NodeId::from(node)).copied().unwrap_or(0)
    }

    /// Browse calls issued in total
    pub fn total_browse_calls(&self) -> u32 {
        self.calls.lock().browse.values().sum()
    }

    /// Read calls issued for one node
    pub fn read_count(&self, node: &str) -> u32 {
        self.calls.lock().read.get(&NodeId::from(node)).copied().unwrap_or(0)
    }

    /// Read calls issued in total
    pub fn total_read_calls(&self) -> u32 {
        self.calls.lock().read.values().sum()
    }

    /// Forget recorded calls (fault queues are kept)
    pub fn reset_counters(&self) {
        let mut calls = self.calls.lock();
        calls.browse.clear();
        calls.read.clear();
    }

    fn injected(&self, node: &NodeId, browse: bool) -> Option<RemoteError> {
        let mut faults = self.faults.lock();
        let map = if browse { &mut faults.browse } else { &mut faults.read };
        map.get_mut(node).and_then(|q| q.pop_front())
    }
}

impl RemoteNamespaceClient for SnapshotClient {
    fn server(&self) -> &str {
        &self.server
    }

    fn browse_children(&self, node: &NodeId) -> RemoteResult<Vec<BrowseItem>> {
        *self.calls.lock().browse.entry(node.clone()).or_insert(0) += 1;

        if let Some(err) = self.injected(node, true) {
            return Err(err);
        }

        let entry = self.nodes.get(node).ok_or_else(|| RemoteError::NotFound {
            node: node.to_string(),
        })?;

        Ok(entry
            .children
            .iter()
            .filter_map(|id| {
                self.nodes.get(id).map(|child| {
                    let class = if child.children.is_empty() {
                        StructuralClass::Unknown
                    } else {
                        StructuralClass::Folder
                    };
                    BrowseItem::new(id.clone(), child.name.clone()).with_class(class)
                })
            })
            .collect())
    }

    fn read_value(&self, node: &NodeId) -> RemoteResult<Option<NativeValue>> {
        *self.calls.lock().read.entry(node.clone()).or_insert(0) += 1;

        if let Some(err) = self.injected(node, false) {
            return Err(err);
        }

        self.nodes
            .get(node)
            .map(|e| e.value.clone())
            .ok_or_else(|| RemoteError::NotFound {
                node: node.to_string(),
            })
    }
}

/// Builder for [`SnapshotClient`] trees
#[derive(Debug)]
pub struct SnapshotBuilder {
    server: String,
    root: NodeId,
    nodes: HashMap<NodeId, Entry>,
}

impl SnapshotBuilder {
    fn new(server: impl Into<String>, root_id: impl Into<NodeId>, root_name: impl Into<String>) -> Self {
        let root = root_id.into();
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Entry {
                name: root_name.into(),
                value: None,
                children: Vec::new(),
            },
        );
        Self {
            server: server.into(),
            root,
            nodes,
        }
    }

    /// Add a child node with an optional value
    pub fn node(
        mut self,
        parent: &str,
        id: &str,
        name: &str,
        value: Option<NativeValue>,
    ) -> Self {
        self.insert(NodeId::from(parent), NodeId::from(id), name.to_string(), value);
        self
    }

    /// Add a child node that will carry children of its own
    pub fn folder(self, parent: &str, id: &str, name: &str) -> Self {
        self.node(parent, id, name, None)
    }

    /// Add a child node carrying a value
    pub fn leaf(self, parent: &str, id: &str, name: &str, value: NativeValue) -> Self {
        self.node(parent, id, name, Some(value))
    }

    /// Reference an existing node as an additional child of `parent`
    pub fn link(mut self, parent: &str, child: &str) -> Self {
        let parent = NodeId::from(parent);
        let entry = self.nodes.entry(parent.clone()).or_insert_with(|| Entry {
            name: parent.to_string(),
            value: None,
            children: Vec::new(),
        });
        entry.children.push(NodeId::from(child));
        self
    }

    pub fn build(self) -> SnapshotClient {
        SnapshotClient {
            server: self.server,
            root: self.root,
            nodes: self.nodes,
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(CallLog::default()),
        }
    }

    fn insert(&mut self, parent: NodeId, id: NodeId, name: String, value: Option<NativeValue>) {
        let parent_entry = self.nodes.entry(parent.clone()).or_insert_with(|| Entry {
            name: parent.to_string(),
            value: None,
            children: Vec::new(),
        });
        parent_entry.children.push(id.clone());

        let entry = self.nodes.entry(id).or_insert_with(|| Entry {
            name: name.clone(),
            value: None,
            children: Vec::new(),
        });
        entry.name = name;
        if value.is_some() {
            entry.value = value;
        }
    }

    fn absorb(&mut self, parent: Option<&NodeId>, node: SnapshotNode) {
        let SnapshotNode {
            id,
            name,
            value,
            children,
            links,
        } = node;

        match parent {
            Some(parent) => self.insert(parent.clone(), id.clone(), name, value),
            None => {
                if let Some(root) = self.nodes.get_mut(&id) {
                    root.value = value;
                }
            }
        }

        for child in children {
            self.absorb(Some(&id), child);
        }

        if let Some(entry) = self.nodes.get_mut(&id) {
            entry.children.extend(links);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "server": "DeltaV",
        "root": {
            "id": "Root", "name": "Root",
            "children": [
                { "id": "A", "name": "A",
                  "children": [
                      { "id": "A.CV", "name": "CV", "value": { "type": "Double", "value": 1.0 } }
                  ],
                  "links": ["Root"] }
            ]
        }
    }"#;

    #[test]
    fn test_load_json_snapshot() {
        let client = SnapshotClient::from_json_str(SNAPSHOT).unwrap();
        assert_eq!(client.server(), "DeltaV");
        assert_eq!(client.node_count(), 3);

        let children = client.browse_children(&NodeId::from("Root")).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].display_name, "A");
        assert_eq!(children[0].class, StructuralClass::Folder);

        // CV plus the back-reference to Root
        let children = client.browse_children(&NodeId::from("A")).unwrap();
        let names: Vec<_> = children.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["CV", "Root"]);

        assert_eq!(
            client.read_value(&NodeId::from("A.CV")).unwrap(),
            Some(NativeValue::Double(1.0))
        );
    }

    #[test]
    fn test_fault_injection_is_consumed() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .build();
        client.fail_browse("Root", 2, RemoteError::Timeout { node: "Root".into() });

        let root = NodeId::from("Root");
        assert!(client.browse_children(&root).is_err());
        assert!(client.browse_children(&root).is_err());
        assert_eq!(client.browse_children(&root).unwrap().len(), 1);
        assert_eq!(client.browse_count("Root"), 3);
    }

    #[test]
    fn test_unknown_node_is_not_found() {
        let client = SnapshotClient::builder("srv", "Root", "Root").build();
        let err = client.browse_children(&NodeId::from("missing")).unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));
        assert_eq!(client.read_value(&NodeId::from("Root")).unwrap(), None);
    }
}
