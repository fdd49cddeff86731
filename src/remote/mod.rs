//! Remote namespace access
//!
//! The core never speaks the communication protocol itself. Everything it
//! needs from the remote side is the [`RemoteNamespaceClient`] trait:
//! list a node's children and read a leaf's current value. Calls are
//! blocking and issued one at a time.
//!
//! [`SnapshotClient`] implements the trait over an in-memory tree loaded
//! from JSON, with fault injection and call counters for tests and
//! offline previews.

pub mod snapshot;
pub mod types;

pub use snapshot::{SnapshotBuilder, SnapshotClient};
pub use types::{BrowseItem, NativeKind, NativeValue, NodeId, StructuralClass};

use crate::error::RemoteResult;

/// Capability to browse a remote hierarchical namespace
pub trait RemoteNamespaceClient {
    /// Name of the remote connection, used as the source server on created leaves
    fn server(&self) -> &str;

    /// List the direct children of a node
    fn browse_children(&self, node: &NodeId) -> RemoteResult<Vec<BrowseItem>>;

    /// Read the current value of a node; `Ok(None)` when the node carries no value
    fn read_value(&self, node: &NodeId) -> RemoteResult<Option<NativeValue>>;
}

impl<T: RemoteNamespaceClient + ?Sized> RemoteNamespaceClient for &T {
    fn server(&self) -> &str {
        (**self).server()
    }

    fn browse_children(&self, node: &NodeId) -> RemoteResult<Vec<BrowseItem>> {
        (**self).browse_children(node)
    }

    fn read_value(&self, node: &NodeId) -> RemoteResult<Option<NativeValue>> {
        (**self).read_value(node)
    }
}

impl<T: RemoteNamespaceClient + ?Sized> RemoteNamespaceClient for Box<T> {
    fn server(&self) -> &str {
        (**self).server()
    }

    fn browse_children(&self, node: &NodeId) -> RemoteResult<Vec<BrowseItem>> {
        (**self).browse_children(node)
    }

    fn read_value(&self, node: &NodeId) -> RemoteResult<Option<NativeValue>> {
        (**self).read_value(node)
    }
}
