//! Destination data type resolution
//!
//! Maps a sampled remote value onto one of the canonical destination types.
//! Resolution never fails outward: any read error, missing value or
//! unmapped native type falls back to [`CanonicalType::Float64`].

use crate::error::ConfigError;
use crate::remote::{NativeKind, NodeId, RemoteNamespaceClient};
use crate::retry::RetryPolicy;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Destination-side value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Float64,
    Float32,
    Int32,
    Int64,
    Boolean,
    String,
}

impl CanonicalType {
    /// Type used when nothing better is known
    pub const FALLBACK: CanonicalType = CanonicalType::Float64;

    /// Name as written into the destination store
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::Float64 => "Float8",
            CanonicalType::Float32 => "Float4",
            CanonicalType::Int32 => "Int4",
            CanonicalType::Int64 => "Int8",
            CanonicalType::Boolean => "Boolean",
            CanonicalType::String => "String",
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalType {
    type Err = ConfigError;

    /// Accepts destination names (`Float8`) and descriptive names (`float64`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float8" | "float64" | "double" => Ok(CanonicalType::Float64),
            "float4" | "float32" | "float" => Ok(CanonicalType::Float32),
            "int4" | "int32" | "int" | "integer" => Ok(CanonicalType::Int32),
            "int8" | "int64" | "long" => Ok(CanonicalType::Int64),
            "boolean" | "bool" => Ok(CanonicalType::Boolean),
            "string" | "text" => Ok(CanonicalType::String),
            _ => Err(ConfigError::UnknownDataType(s.to_string())),
        }
    }
}

/// Native kind to canonical type, in precedence order
const TYPE_TABLE: &[(NativeKind, CanonicalType)] = &[
    (NativeKind::Double, CanonicalType::Float64),
    (NativeKind::Float, CanonicalType::Float32),
    (NativeKind::Int, CanonicalType::Int32),
    (NativeKind::Long, CanonicalType::Int64),
    (NativeKind::Bool, CanonicalType::Boolean),
    (NativeKind::String, CanonicalType::String),
];

/// Look up the canonical type for a native kind
pub fn canonical_for(kind: NativeKind) -> Option<CanonicalType> {
    TYPE_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, t)| *t)
}

/// Resolves destination types by sampling remote values
pub struct TypeResolver<'a, C: RemoteNamespaceClient> {
    client: &'a C,
    retry: &'a RetryPolicy,
}

impl<'a, C: RemoteNamespaceClient> TypeResolver<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Resolve the canonical type of a remote leaf
    pub fn resolve(&self, node: &NodeId) -> CanonicalType {
        let what = format!("read {}", node);
        match self.retry.run(&what, || self.client.read_value(node)) {
            Ok(Some(value)) => canonical_for(value.kind()).unwrap_or_else(|| {
                debug!("No canonical type for {:?} at {}, using fallback", value.kind(), node);
                CanonicalType::FALLBACK
            }),
            Ok(None) => {
                debug!("No value at {}, using fallback type", node);
                CanonicalType::FALLBACK
            }
            Err(e) => {
                debug!("Value read failed for {}: {}, using fallback type", node, e);
                CanonicalType::FALLBACK
            }
        }
    }
}
