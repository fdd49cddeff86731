//! Destination path mapping
//!
//! Destination paths look like `[provider]Root/Sub/A/B/CV`: the qualified
//! root followed by the leaf's path relative to the base node.

use crate::config::{DataTypeChoice, JobConfig};
use crate::remote::NodeId;
use crate::walker::DiscoveredLeaf;

/// `[provider]`
pub fn provider_root(provider: &str) -> String {
    format!("[{}]", provider)
}

/// Append `name` to a qualified parent path
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent.ends_with(']') || parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// One leaf to place in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCreationRequest {
    /// Qualified folder the leaf goes into
    pub destination_folder_path: String,

    /// Folders below the root, top-down
    pub folder_segments: Vec<String>,

    pub leaf_name: String,

    /// Remote node the leaf reads
    pub source: NodeId,

    pub data_type: DataTypeChoice,
}

impl TagCreationRequest {
    /// Qualified path of the leaf itself
    pub fn leaf_path(&self) -> String {
        join(&self.destination_folder_path, &self.leaf_name)
    }
}

/// Maps relative leaf paths onto the destination root
#[derive(Debug, Clone)]
pub struct PathMapper {
    provider_root: String,
    root_segments: Vec<String>,
    root_path: String,
}

impl PathMapper {
    /// `destination_root` is split on '/'; blank segments are dropped
    pub fn new(provider: &str, destination_root: &str) -> Self {
        Self::from_segments(provider, destination_root.split('/'))
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::from_segments(&config.tag_provider, config.root_segments())
    }

    fn from_segments<'s>(provider: &str, segments: impl IntoIterator<Item = &'s str>) -> Self {
        let provider_root = provider_root(provider);
        let root_segments: Vec<String> = segments
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let root_path = root_segments
            .iter()
            .fold(provider_root.clone(), |parent, seg| join(&parent, seg));

        Self {
            provider_root,
            root_segments,
            root_path,
        }
    }

    pub fn provider_root(&self) -> &str {
        &self.provider_root
    }

    /// Qualified path of the deepest root folder
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// `(parent, name)` for each root folder, top-down
    pub fn root_chain(&self) -> Vec<(String, String)> {
        let mut parent = self.provider_root.clone();
        let mut chain = Vec::with_capacity(self.root_segments.len());
        for seg in &self.root_segments {
            let path = join(&parent, seg);
            chain.push((parent, seg.clone()));
            parent = path;
        }
        chain
    }

    /// Qualified destination path of a discovered leaf
    pub fn leaf_path(&self, leaf: &DiscoveredLeaf) -> String {
        join(&self.root_path, &leaf.relative_path)
    }

    /// Build the creation request for a discovered leaf
    pub fn request(&self, leaf: &DiscoveredLeaf, data_type: DataTypeChoice) -> TagCreationRequest {
        let folder_segments: Vec<String> =
            leaf.folder_segments().into_iter().map(String::from).collect();
        let destination_folder_path = folder_segments
            .iter()
            .fold(self.root_path.clone(), |parent, seg| join(&parent, seg));

        TagCreationRequest {
            destination_folder_path,
            folder_segments,
            leaf_name: leaf.leaf_segment().to_string(),
            source: leaf.node.clone(),
            data_type,
        }
    }

    pub fn requests(&self, leaves: &[DiscoveredLeaf], data_type: DataTypeChoice) -> Vec<TagCreationRequest> {
        leaves.iter().map(|l| self.request(l, data_type)).collect()
    }

    /// Would-be destination paths, in discovery order
    pub fn preview(&self, leaves: &[DiscoveredLeaf]) -> Vec<String> {
        leaves.iter().map(|l| self.leaf_path(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::CanonicalType;

    fn leaf(path: &str) -> DiscoveredLeaf {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        DiscoveredLeaf {
            node: NodeId::from(format!("ns=2;s={}", path)),
            display_name: name,
            relative_path: path.to_string(),
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("[default]", "A"), "[default]A");
        assert_eq!(join("[default]A", "B"), "[default]A/B");
        assert_eq!(join("[default]A/", "B"), "[default]A/B");
        assert_eq!(join("", "A"), "A");
    }

    #[test]
    fn test_nested_root() {
        let mapper = PathMapper::new("default", "DELTAV/ BIOREACTOR /BRX001/");
        assert_eq!(mapper.root_path(), "[default]DELTAV/BIOREACTOR/BRX001");
        assert_eq!(
            mapper.root_chain(),
            vec![
                ("[default]".to_string(), "DELTAV".to_string()),
                ("[default]DELTAV".to_string(), "BIOREACTOR".to_string()),
                ("[default]DELTAV/BIOREACTOR".to_string(), "BRX001".to_string()),
            ]
        );
    }

    #[test]
    fn test_request_mapping() {
        let mapper = PathMapper::new("default", "Target");
        let req = mapper.request(&leaf("A/B/CV"), DataTypeChoice::Fixed(CanonicalType::Float32));

        assert_eq!(req.destination_folder_path, "[default]Target/A/B");
        assert_eq!(req.folder_segments, vec!["A", "B"]);
        assert_eq!(req.leaf_name, "CV");
        assert_eq!(req.leaf_path(), "[default]Target/A/B/CV");
        assert_eq!(req.source.as_str(), "ns=2;s=A/B/CV");
    }

    #[test]
    fn test_leaf_directly_under_root() {
        let mapper = PathMapper::new("edge", "Target");
        let req = mapper.request(&leaf("CV"), DataTypeChoice::Auto);
        assert!(req.folder_segments.is_empty());
        assert_eq!(req.destination_folder_path, "[edge]Target");
        assert_eq!(req.leaf_path(), "[edge]Target/CV");
    }

    #[test]
    fn test_preview_matches_request_paths() {
        let mapper = PathMapper::new("default", "Target");
        let leaves = vec![leaf("A/CV"), leaf("A/B/CV")];
        let preview = mapper.preview(&leaves);
        let requested: Vec<String> = mapper
            .requests(&leaves, DataTypeChoice::Auto)
            .iter()
            .map(TagCreationRequest::leaf_path)
            .collect();
        assert_eq!(preview, requested);
        assert_eq!(preview, vec!["[default]Target/A/CV", "[default]Target/A/B/CV"]);
    }

    #[test]
    fn test_from_config_uses_normalized_root() {
        let config = JobConfig::builder("srv", "Root", " DELTAV / BRX001 ")
            .tag_provider("edge")
            .build()
            .unwrap();
        let mapper = PathMapper::from_config(&config);
        assert_eq!(mapper.root_path(), "[edge]DELTAV/BRX001");
        assert_eq!(mapper.root_chain().len(), 2);
    }

    #[test]
    fn test_slash_in_display_name_stays_one_segment() {
        let mapper = PathMapper::new("default", "Target");
        let discovered = DiscoveredLeaf {
            node: NodeId::from("ns=2;s=A/In/Out"),
            display_name: "In/Out".to_string(),
            relative_path: "A/In_Out".to_string(),
        };
        let req = mapper.request(&discovered, DataTypeChoice::Auto);

        assert_eq!(req.folder_segments, vec!["A"]);
        assert_eq!(req.leaf_name, "In_Out");
        assert_eq!(req.leaf_path(), mapper.leaf_path(&discovered));
    }
}
