//! Idempotent, cached creation of folders and leaves

use crate::batch::{BatchScheduler, BatchStats};
use crate::config::DataTypeChoice;
use crate::error::{FailureKind, FailureRecord};
use crate::mirror::{join, DestinationStore, LeafSpec, PathMapper, TagCreationRequest};
use crate::progress::ProgressSink;
use crate::remote::NodeId;
use crate::resolve::CanonicalType;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Auto-detected types are announced only for names shorter than this
const ANNOUNCE_NAME_LEN: usize = 10;

/// State of a destination folder within one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    /// Created or confirmed to exist
    Ready,
    /// Check or create failed; nothing is placed below it
    Failed,
}

/// Folder paths already handled by this job
///
/// Each distinct path gets at most one existence check and one create.
#[derive(Debug, Default)]
pub struct FolderCache {
    folders: HashMap<String, FolderState>,
}

impl FolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, path: &str) -> Option<FolderState> {
        self.folders.get(path).copied()
    }

    pub fn is_ready(&self, path: &str) -> bool {
        self.state(path) == Some(FolderState::Ready)
    }

    pub fn is_failed(&self, path: &str) -> bool {
        self.state(path) == Some(FolderState::Failed)
    }

    pub fn mark_ready(&mut self, path: impl Into<String>) {
        self.folders.insert(path.into(), FolderState::Ready);
    }

    pub fn mark_failed(&mut self, path: impl Into<String>) {
        self.folders.insert(path.into(), FolderState::Failed);
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Result of placing one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOutcome {
    /// Leaf created with this type
    Created(CanonicalType),
    /// Leaf was already present and left untouched
    Existing,
    /// Leaf or one of its folders could not be created
    Failed(String),
}

impl LeafOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, LeafOutcome::Failed(_))
    }
}

/// Counts from materializing one job's requests
#[derive(Debug, Clone, Default)]
pub struct MaterializeSummary {
    pub tags_created: usize,
    pub tags_existing: usize,

    /// Folders created below the root
    pub folders_created: usize,

    /// Root segments created
    pub root_folders_created: usize,

    /// Distinct folder paths seen (root included)
    pub folders_cached: usize,

    pub failures: Vec<FailureRecord>,

    pub batch: BatchStats,
}

/// Places creation requests into a destination store
pub struct MirrorStore<'a, S: DestinationStore> {
    store: &'a S,
    mapper: &'a PathMapper,
    source_server: String,
    sink: &'a dyn ProgressSink,
    cache: FolderCache,
    summary: MaterializeSummary,
}

impl<'a, S: DestinationStore> MirrorStore<'a, S> {
    pub fn new(
        store: &'a S,
        mapper: &'a PathMapper,
        source_server: impl Into<String>,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            store,
            mapper,
            source_server: source_server.into(),
            sink,
            cache: FolderCache::new(),
            summary: MaterializeSummary::default(),
        }
    }

    pub fn cache(&self) -> &FolderCache {
        &self.cache
    }

    pub fn summary(&self) -> &MaterializeSummary {
        &self.summary
    }

    /// Create the root segments top-down; returns false if any failed
    ///
    /// Segments below a failed one are cached as failed without touching
    /// the store.
    pub fn ensure_root(&mut self) -> bool {
        let mut ready = true;
        for (parent, name) in self.mapper.root_chain() {
            if self.ensure_folder(&parent, &name, true).is_none() {
                ready = false;
            }
        }
        ready
    }

    /// Confirm or create `parent/name`, returning its path
    fn ensure_folder(&mut self, parent: &str, name: &str, root: bool) -> Option<String> {
        let path = join(parent, name);

        match self.cache.state(&path) {
            Some(FolderState::Ready) => return Some(path),
            Some(FolderState::Failed) => return None,
            None => {}
        }

        if self.cache.is_failed(parent) {
            self.cache.mark_failed(path);
            return None;
        }

        match self.store.exists(&path) {
            Ok(true) => {
                debug!("Folder exists: {}", path);
                self.cache.mark_ready(path.clone());
                return Some(path);
            }
            Ok(false) => {}
            Err(e) => {
                self.fail_folder(&path, &e.to_string());
                return None;
            }
        }

        match self.store.create_folder(parent, name) {
            Ok(()) => {
                self.sink.emit(&format!("Created folder: {}", path));
                if root {
                    self.summary.root_folders_created += 1;
                } else {
                    self.summary.folders_created += 1;
                }
                self.cache.mark_ready(path.clone());
                Some(path)
            }
            Err(e) => {
                self.fail_folder(&path, &e.to_string());
                None
            }
        }
    }

    fn fail_folder(&mut self, path: &str, message: &str) {
        warn!("Folder {} failed: {}", path, message);
        self.sink
            .emit(&format!("Error creating folder '{}': {}", path, message));
        self.summary
            .failures
            .push(FailureRecord::new(FailureKind::Folder, path, message));
        self.cache.mark_failed(path);
    }

    fn fail_leaf(&mut self, path: &str, message: String) -> LeafOutcome {
        self.sink
            .emit(&format!("Error creating tag '{}': {}", path, message));
        self.summary
            .failures
            .push(FailureRecord::new(FailureKind::Leaf, path, message.clone()));
        LeafOutcome::Failed(message)
    }

    /// Place one leaf, creating missing folders on the way
    ///
    /// `resolve` is only called for `Auto` requests whose leaf does not
    /// exist yet.
    pub fn place<F>(&mut self, request: &TagCreationRequest, resolve: F) -> LeafOutcome
    where
        F: FnOnce(&NodeId) -> CanonicalType,
    {
        let leaf_path = request.leaf_path();

        let mut parent = self.mapper.root_path().to_string();
        if self.cache.is_failed(&parent) {
            return self.fail_leaf(&leaf_path, format!("folder '{}' unavailable", parent));
        }
        for segment in &request.folder_segments {
            match self.ensure_folder(&parent, segment, false) {
                Some(path) => parent = path,
                None => {
                    let folder = join(&parent, segment);
                    return self.fail_leaf(&leaf_path, format!("folder '{}' unavailable", folder));
                }
            }
        }

        match self.store.exists(&leaf_path) {
            Ok(true) => {
                debug!("Tag exists: {}", leaf_path);
                self.summary.tags_existing += 1;
                return LeafOutcome::Existing;
            }
            Ok(false) => {}
            Err(e) => return self.fail_leaf(&leaf_path, e.to_string()),
        }

        let data_type = match request.data_type {
            DataTypeChoice::Fixed(t) => t,
            DataTypeChoice::Auto => {
                let t = resolve(&request.source);
                if request.leaf_name.len() < ANNOUNCE_NAME_LEN {
                    self.sink.emit(&format!(
                        "Auto-detected data type for {}: {}",
                        request.leaf_name, t
                    ));
                }
                t
            }
        };

        let spec = LeafSpec::opc(&self.source_server, request.source.as_str(), data_type);
        match self.store.create_leaf(&parent, &request.leaf_name, &spec) {
            Ok(()) => {
                self.sink.emit(&format!("Created OPC tag: {}", leaf_path));
                self.summary.tags_created += 1;
                LeafOutcome::Created(data_type)
            }
            Err(e) => self.fail_leaf(&leaf_path, e.to_string()),
        }
    }

    /// Create the root, then place every request through `scheduler`
    pub fn materialize<F>(
        mut self,
        requests: &[TagCreationRequest],
        scheduler: &BatchScheduler<'_>,
        mut resolve: F,
    ) -> MaterializeSummary
    where
        F: FnMut(&NodeId) -> CanonicalType,
    {
        if !self.ensure_root() {
            warn!("Root {} unavailable", self.mapper.root_path());
        }

        let batch = scheduler.run(requests, |request| {
            self.place(request, &mut resolve);
        });

        self.summary.batch = batch;
        self.summary.folders_cached = self.cache.len();
        self.summary
    }
}
