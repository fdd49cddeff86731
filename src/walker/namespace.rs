//! Breadth-first namespace walker
//!
//! Expands nodes from a FIFO queue seeded with the base node. For each
//! child of an expanded node:
//!
//! 1. Metadata children (see [`IGNORED_CHILDREN`]) are skipped.
//! 2. A child whose display name is in the name filter is recorded as a
//!    leaf straight away and never browsed. Names in the filter are known
//!    leaves, so this saves a round trip per match.
//! 3. Any other child is probed with a browse call. Children found means
//!    a folder, which is queued together with the listed children.
//!    No children means a terminal node: collected when the filter is
//!    `All`, discarded otherwise.
//!
//! Every node id is browsed at most once per walk. The namespace is
//! assumed to be tree-shaped but may contain redundant edges or
//! back-references; the visited set and the iteration bound keep the walk
//! finite either way.

use crate::config::NameFilter;
use crate::error::{FailureKind, FailureRecord, MirrorError, NodeOutcome, RemoteResult, Result};
use crate::job::CancelFlag;
use crate::progress::ProgressSink;
use crate::remote::{BrowseItem, NodeId, RemoteNamespaceClient};
use crate::retry::RetryPolicy;
use crate::walker::queue::{BrowseQueue, BrowseTask, QueueStats, VisitedSet};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Children that never carry process data
pub const IGNORED_CHILDREN: &[&str] = &["#Properties"];

/// Iterations between progress messages
pub const PROGRESS_INTERVAL: usize = 10;

/// A leaf found by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLeaf {
    /// Remote node the destination leaf will point at
    pub node: NodeId,

    /// Name as reported by the server, possibly containing '/'
    pub display_name: String,

    /// Display names from the base node to this leaf, inclusive, joined by '/'.
    /// Any '/' inside a display name is replaced with '_'.
    pub relative_path: String,
}

impl DiscoveredLeaf {
    /// Last segment of `relative_path`, used as the destination leaf name
    pub fn leaf_segment(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Folder segments (everything before the leaf name)
    pub fn folder_segments(&self) -> Vec<&str> {
        let mut segments: Vec<&str> = self.relative_path.split('/').collect();
        segments.pop();
        segments
    }
}

/// Counters for one walk
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    /// Work items processed
    pub iterations: usize,

    /// Children seen across all browse results
    pub items_browsed: u64,

    /// Nodes classified as folders and queued
    pub folders_found: u64,

    /// Children skipped because their id was already browsed
    pub revisits_skipped: u64,

    /// Nodes that could not be browsed after retries
    pub browse_failures: u64,

    /// Iteration bound hit with work left in the queue
    pub truncated: bool,

    /// Stopped by a cancel request
    pub cancelled: bool,

    pub queue: QueueStats,

    pub duration: Duration,
}

/// Result of [`NamespaceWalker::discover`]
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub leaves: Vec<DiscoveredLeaf>,
    pub stats: WalkStats,
    pub failures: Vec<FailureRecord>,
    pub outcomes: Vec<NodeOutcome>,
}

/// Breadth-first walker over a remote namespace
pub struct NamespaceWalker<'a, C: RemoteNamespaceClient> {
    client: &'a C,
    retry: &'a RetryPolicy,
    sink: &'a dyn ProgressSink,
    cancel: Option<&'a CancelFlag>,
}

impl<'a, C: RemoteNamespaceClient> NamespaceWalker<'a, C> {
    pub fn new(client: &'a C, retry: &'a RetryPolicy, sink: &'a dyn ProgressSink) -> Self {
        Self {
            client,
            retry,
            sink,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Walk from `base` and collect matching leaves
    ///
    /// Fails only when the base node itself cannot be browsed. Any other
    /// browse failure skips that node's subtree and is reported in the result.
    pub fn discover(
        &self,
        base: &NodeId,
        filter: &NameFilter,
        max_iterations: usize,
    ) -> Result<WalkResult> {
        let start = Instant::now();
        let mut result = WalkResult::default();
        let mut queue = BrowseQueue::seeded(base.clone());
        let mut visited = VisitedSet::new();
        visited.insert(base);

        self.sink.emit("Starting iterative OPC browsing...");
        self.sink.emit(&format!("Base Node: {}", base));
        if filter.is_all() {
            self.sink.emit("Searching for all tags");
        } else {
            self.sink.emit(&format!("Searching for tags: {}", filter));
        }

        while result.stats.iterations < max_iterations {
            if self.cancel.is_some_and(|c| c.is_cancelled()) {
                result.stats.cancelled = true;
                self.sink.emit("Browse cancelled");
                break;
            }

            let Some(mut task) = queue.pop() else {
                break;
            };
            result.stats.iterations += 1;

            if result.stats.iterations % PROGRESS_INTERVAL == 0 {
                self.sink.emit(&format!(
                    "[Iteration {}] Queue size: {}, Tags found: {}",
                    result.stats.iterations,
                    queue.len(),
                    result.leaves.len()
                ));
            }

            let children = match task.children.take() {
                Some(children) => children,
                None => match self.browse(&task.node) {
                    Ok(children) => children,
                    Err(e) if task.depth == 0 => {
                        return Err(MirrorError::BrowseFailed {
                            node: task.node.to_string(),
                            source: e,
                        });
                    }
                    Err(e) => {
                        self.record_failure(&mut result, &task.node, e);
                        continue;
                    }
                },
            };

            result.stats.items_browsed += children.len() as u64;
            result.outcomes.push(NodeOutcome::Browsed {
                node: task.node.to_string(),
                children: children.len(),
            });

            for child in children {
                self.visit_child(&task, child, filter, &mut queue, &mut visited, &mut result);
            }
        }

        if !queue.is_empty() && !result.stats.cancelled {
            result.stats.truncated = true;
            warn!(
                max_iterations,
                pending = queue.len(),
                "Iteration limit reached before the namespace was exhausted"
            );
            self.sink.emit(&format!(
                "WARNING: Reached maximum iteration limit ({})",
                max_iterations
            ));
        }

        result.stats.queue = queue.stats();
        result.stats.duration = start.elapsed();

        self.sink.emit("Browse complete!");
        self.sink.emit(&format!("Iterations: {}", result.stats.iterations));
        self.sink.emit(&format!("Total items browsed: {}", result.stats.items_browsed));
        self.sink.emit(&format!("Tags found matching criteria: {}", result.leaves.len()));

        info!(
            iterations = result.stats.iterations,
            found = result.leaves.len(),
            failures = result.stats.browse_failures,
            "Browse complete"
        );

        Ok(result)
    }

    fn visit_child(
        &self,
        parent: &BrowseTask,
        child: BrowseItem,
        filter: &NameFilter,
        queue: &mut BrowseQueue,
        visited: &mut VisitedSet,
        result: &mut WalkResult,
    ) {
        if IGNORED_CHILDREN.contains(&child.display_name.as_str()) {
            return;
        }

        let path = parent.child_path(&child.display_name);

        if filter.is_named(&child.display_name) {
            debug!("Matched {} at {}", child.id, path);
            result.leaves.push(DiscoveredLeaf {
                node: child.id,
                display_name: child.display_name,
                relative_path: path,
            });
            return;
        }

        if !visited.insert(&child.id) {
            result.stats.revisits_skipped += 1;
            result.outcomes.push(NodeOutcome::Skipped {
                node: child.id.to_string(),
                reason: "already browsed".into(),
            });
            return;
        }

        match self.browse(&child.id) {
            Ok(grandchildren) if !grandchildren.is_empty() => {
                result.stats.folders_found += 1;
                queue.push(BrowseTask::probed(child.id, path, grandchildren, parent.depth + 1));
            }
            Ok(_) => {
                if filter.is_all() {
                    result.leaves.push(DiscoveredLeaf {
                        node: child.id,
                        display_name: child.display_name,
                        relative_path: path,
                    });
                }
            }
            Err(e) => self.record_failure(result, &child.id, e),
        }
    }

    fn browse(&self, node: &NodeId) -> RemoteResult<Vec<BrowseItem>> {
        let what = format!("browse {}", node);
        self.retry.run(&what, || self.client.browse_children(node))
    }

    fn record_failure(&self, result: &mut WalkResult, node: &NodeId, error: crate::error::RemoteError) {
        result.stats.browse_failures += 1;
        self.sink.emit(&format!("Error browsing node '{}': {}", node, error));
        result
            .failures
            .push(FailureRecord::new(FailureKind::Browse, node.to_string(), error.to_string()));
        result.outcomes.push(NodeOutcome::Failed {
            node: node.to_string(),
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::progress::CollectingSink;
    use crate::remote::{NativeValue, SnapshotClient};

    /// Root -> A -> {CV, B -> {CV}}
    fn scenario() -> SnapshotClient {
        SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.CV", "CV", NativeValue::Double(1.0))
            .folder("A", "B", "B")
            .leaf("B", "B.CV", "CV", NativeValue::Double(2.0))
            .build()
    }

    fn paths(result: &WalkResult) -> Vec<&str> {
        result.leaves.iter().map(|l| l.relative_path.as_str()).collect()
    }

    #[test]
    fn test_discover_scenario() {
        let client = scenario();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker
            .discover(&"Root".into(), &NameFilter::from("CV"), 100)
            .unwrap();

        assert_eq!(paths(&result), vec!["A/CV", "A/B/CV"]);
        assert_eq!(result.leaves[0].node.as_str(), "A.CV");
        assert_eq!(result.leaves[1].folder_segments(), vec!["A", "B"]);
        assert!(!result.stats.truncated);

        // Matched leaves are never browsed
        assert_eq!(client.browse_count("A.CV"), 0);
        assert_eq!(client.browse_count("B.CV"), 0);
        // Folders are listed exactly once
        assert_eq!(client.browse_count("A"), 1);
        assert_eq!(client.browse_count("B"), 1);
        assert!(sink.contains("Tags found matching criteria: 2"));
    }

    #[test]
    fn test_all_filter_collects_terminal_nodes() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.CV", "CV", NativeValue::Double(1.0))
            .leaf("A", "A.PV", "PV", NativeValue::Double(1.0))
            .leaf("Root", "X", "X", NativeValue::Bool(true))
            .build();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::All, 100).unwrap();
        let mut found = paths(&result);
        found.sort();
        assert_eq!(found, vec!["A/CV", "A/PV", "X"]);
    }

    #[test]
    fn test_non_matching_leaves_discarded() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.PV", "PV", NativeValue::Double(1.0))
            .leaf("A", "A.CV", "CV", NativeValue::Double(1.0))
            .build();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 100).unwrap();
        assert_eq!(paths(&result), vec!["A/CV"]);
    }

    #[test]
    fn test_properties_child_ignored() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .folder("A", "A.props", "#Properties")
            .leaf("A.props", "A.props.CV", "CV", NativeValue::Double(1.0))
            .leaf("A", "A.CV", "CV", NativeValue::Double(1.0))
            .build();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 100).unwrap();
        assert_eq!(paths(&result), vec!["A/CV"]);
        assert_eq!(client.browse_count("A.props"), 0);
    }

    #[test]
    fn test_back_reference_terminates() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .folder("A", "B", "B")
            .leaf("B", "B.CV", "CV", NativeValue::Double(1.0))
            .link("B", "A")
            .link("B", "Root")
            .build();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 1000).unwrap();
        assert_eq!(paths(&result), vec!["A/B/CV"]);
        assert_eq!(result.stats.revisits_skipped, 2);
        for node in ["Root", "A", "B"] {
            assert_eq!(client.browse_count(node), 1, "{} browsed more than once", node);
        }
    }

    #[test]
    fn test_iteration_bound_truncates() {
        let client = scenario();
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 1).unwrap();
        assert_eq!(result.stats.iterations, 1);
        assert!(result.stats.truncated);
        assert!(result.leaves.is_empty());
        assert!(sink.contains("WARNING: Reached maximum iteration limit (1)"));
    }

    #[test]
    fn test_transient_failures_within_budget() {
        let client = scenario();
        client.fail_browse("B", 2, RemoteError::Timeout { node: "B".into() });
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 100).unwrap();
        assert_eq!(paths(&result), vec!["A/CV", "A/B/CV"]);
        assert_eq!(retry.stats().transient(), 2);
        assert_eq!(result.stats.browse_failures, 0);
    }

    #[test]
    fn test_exhausted_node_skipped_siblings_unaffected() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.CV", "CV", NativeValue::Double(1.0))
            .folder("Root", "B", "B")
            .leaf("B", "B.CV", "CV", NativeValue::Double(1.0))
            .build();
        client.fail_browse("A", 3, RemoteError::Timeout { node: "A".into() });
        let retry = RetryPolicy::immediate(3);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 100).unwrap();
        assert_eq!(paths(&result), vec!["B/CV"]);
        assert_eq!(result.stats.browse_failures, 1);
        assert_eq!(retry.stats().exhausted(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].target, "A");
    }

    #[test]
    fn test_unbrowsable_base_is_fatal() {
        let client = scenario();
        let retry = RetryPolicy::immediate(2);
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink);

        let err = walker
            .discover(&"Nope".into(), &NameFilter::from("CV"), 100)
            .unwrap_err();
        assert!(matches!(err, MirrorError::BrowseFailed { .. }));
    }

    #[test]
    fn test_cancel_stops_walk() {
        let client = scenario();
        let retry = RetryPolicy::immediate(3);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let sink = CollectingSink::new();
        let walker = NamespaceWalker::new(&client, &retry, &sink).with_cancel(&cancel);

        let result = walker.discover(&"Root".into(), &NameFilter::from("CV"), 100).unwrap();
        assert!(result.stats.cancelled);
        assert!(!result.stats.truncated);
        assert_eq!(result.stats.iterations, 0);
        assert_eq!(client.total_browse_calls(), 0);
    }

    #[test]
    fn test_slash_in_display_name() {
        let client = SnapshotClient::builder("srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.IO", "In/Out", NativeValue::Bool(true))
            .build();
        let retry = RetryPolicy::immediate(1);
        let sink = CollectingSink::new();

        let result = NamespaceWalker::new(&client, &retry, &sink)
            .discover(&"Root".into(), &NameFilter::from("In/Out"), 100)
            .unwrap();

        assert_eq!(paths(&result), vec!["A/In_Out"]);
        assert_eq!(result.leaves[0].display_name, "In/Out");
        assert_eq!(result.leaves[0].folder_segments(), vec!["A"]);
        assert_eq!(result.leaves[0].leaf_segment(), "In_Out");
    }
}
