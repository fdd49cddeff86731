//! Remote namespace types
//!
//! These types describe what a browse or read call returns. They carry
//! no behavior beyond classification helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque remote node identifier (e.g. an OPC UA node id string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Structural class reported for a node
///
/// Remotes often cannot tell whether a node has children without
/// browsing it, so `Unknown` is the common case. The walker never trusts
/// this hint alone; it probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StructuralClass {
    Folder,
    Leaf,
    #[default]
    Unknown,
}

/// One child returned by a browse call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseItem {
    pub id: NodeId,
    pub display_name: String,
    pub class: StructuralClass,
}

impl BrowseItem {
    pub fn new(id: impl Into<NodeId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            class: StructuralClass::Unknown,
        }
    }

    pub fn with_class(mut self, class: StructuralClass) -> Self {
        self.class = class;
        self
    }
}

/// Kind of a native value, used for type resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Double,
    Float,
    Int,
    Long,
    Bool,
    String,
    Unsupported,
}

/// Current value of a remote leaf, in the remote's own type system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NativeValue {
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Bool(bool),
    String(String),
    /// A value whose type has no canonical mapping; carries the type name
    Unsupported(String),
}

impl NativeValue {
    pub fn kind(&self) -> NativeKind {
        match self {
            NativeValue::Double(_) => NativeKind::Double,
            NativeValue::Float(_) => NativeKind::Float,
            NativeValue::Int(_) => NativeKind::Int,
            NativeValue::Long(_) => NativeKind::Long,
            NativeValue::Bool(_) => NativeKind::Bool,
            NativeValue::String(_) => NativeKind::String,
            NativeValue::Unsupported(_) => NativeKind::Unsupported,
        }
    }
}
