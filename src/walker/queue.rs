//! Browse queue and visited set
//!
//! The walker is single-threaded, so the queue is a plain FIFO with
//! counters. A task may carry the children already listed while probing
//! the node, so a folder is never listed twice.

use crate::remote::{BrowseItem, NodeId};
use std::collections::{HashSet, VecDeque};

/// A node waiting to be expanded
#[derive(Debug, Clone)]
pub struct BrowseTask {
    /// Remote node to expand
    pub node: NodeId,

    /// Slash-delimited display names from the base node ("" for the base)
    pub path: String,

    /// Children listed by an earlier probe, if any
    pub children: Option<Vec<BrowseItem>>,

    /// Depth from the base node (0 = base)
    pub depth: u32,
}

impl BrowseTask {
    /// Create the root task
    pub fn root(node: NodeId) -> Self {
        Self {
            node,
            path: String::new(),
            children: None,
            depth: 0,
        }
    }

    /// Create a task for a node whose children are already known
    pub fn probed(node: NodeId, path: String, children: Vec<BrowseItem>, depth: u32) -> Self {
        Self {
            node,
            path,
            children: Some(children),
            depth,
        }
    }

    /// Relative path of a child of this task
    ///
    /// A '/' inside `name` becomes '_' so each name stays one segment.
    pub fn child_path(&self, name: &str) -> String {
        let segment = name.replace('/', "_");
        if self.path.is_empty() {
            segment
        } else {
            format!("{}/{}", self.path, segment)
        }
    }
}

/// Counters for the browse queue
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: u64,

    /// Total tasks dequeued
    pub dequeued: u64,

    /// Largest queue length seen
    pub high_water: usize,
}

/// FIFO of pending browse tasks
#[derive(Debug, Default)]
pub struct BrowseQueue {
    tasks: VecDeque<BrowseTask>,
    stats: QueueStats,
}

impl BrowseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the queue with the base node
    pub fn seeded(base: NodeId) -> Self {
        let mut queue = Self::new();
        queue.push(BrowseTask::root(base));
        queue
    }

    pub fn push(&mut self, task: BrowseTask) {
        self.tasks.push_back(task);
        self.stats.enqueued += 1;
        self.stats.high_water = self.stats.high_water.max(self.tasks.len());
    }

    pub fn pop(&mut self) -> Option<BrowseTask> {
        let task = self.tasks.pop_front()?;
        self.stats.dequeued += 1;
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

/// Remote ids already browsed during one job
#[derive(Debug, Default)]
pub struct VisitedSet {
    ids: HashSet<NodeId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node visited; returns false if it already was
    pub fn insert(&mut self, id: &NodeId) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.clone())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = BrowseQueue::seeded(NodeId::from("Root"));
        queue.push(BrowseTask::probed("A".into(), "A".into(), vec![], 1));
        queue.push(BrowseTask::probed("B".into(), "B".into(), vec![], 1));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().node.as_str(), "Root");
        assert_eq!(queue.pop().unwrap().node.as_str(), "A");
        assert_eq!(queue.pop().unwrap().node.as_str(), "B");
        assert!(queue.pop().is_none());

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.dequeued, 3);
        assert_eq!(stats.high_water, 3);
    }

    #[test]
    fn test_child_path() {
        let root = BrowseTask::root("Root".into());
        assert_eq!(root.child_path("A"), "A");

        let task = BrowseTask::probed("B".into(), "A/B".into(), vec![], 2);
        assert_eq!(task.child_path("CV"), "A/B/CV");
        assert_eq!(task.child_path("In/Out"), "A/B/In_Out");
    }

    #[test]
    fn test_visited_set() {
        let mut visited = VisitedSet::new();
        let id = NodeId::from("A");
        assert!(visited.insert(&id));
        assert!(!visited.insert(&id));
        assert!(visited.contains(&id));
        assert_eq!(visited.len(), 1);
    }
}
