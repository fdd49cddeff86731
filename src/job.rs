//! Mirror job orchestration
//!
//! A job walks the remote namespace, then either previews the would-be
//! destination paths (dry run) or materializes them. All per-job state
//! (visited set, folder cache, counters) lives inside one [`MirrorJob::run`]
//! call and is dropped with it.

use crate::batch::BatchScheduler;
use crate::config::JobConfig;
use crate::error::{FailureKind, FailureRecord, Result};
use crate::mirror::{DestinationStore, MirrorStore, PathMapper};
use crate::progress::{sink_or_log, ProgressSink};
use crate::remote::RemoteNamespaceClient;
use crate::resolve::TypeResolver;
use crate::retry::RetryPolicy;
use crate::walker::{NamespaceWalker, WalkStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cooperative cancel signal shared between a job and its driver
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Browsing,
    /// The base node could not be browsed
    BrowseFailed,
    BrowseComplete,
    DryRunPreview,
    Materializing,
    Complete,
    /// Finished, but some folders or leaves could not be created
    PartialFailure,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::BrowseFailed | JobState::Complete | JobState::PartialFailure | JobState::Cancelled
        )
    }
}

/// Would-be destination paths from a dry run
#[derive(Debug, Clone, Default)]
pub struct PreviewReport {
    /// Every leaf path, in discovery order
    pub paths: Vec<String>,

    /// How many were echoed to the sink
    pub shown: usize,
}

/// Final result of a job
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub state: JobState,

    /// Complete with at least one tag found
    pub success: bool,

    pub dry_run: bool,

    pub tags_found: usize,
    pub tags_created: usize,
    pub tags_existing: usize,

    /// Folders created below the destination root
    pub folders_created: usize,

    /// Destination root segments created
    pub root_folders_created: usize,

    /// Browse and destination failures
    pub failures: Vec<FailureRecord>,

    pub walk: WalkStats,

    pub browse_time: Duration,
    pub total_time: Duration,

    /// Set for dry runs only
    pub preview: Option<PreviewReport>,
}

impl JobReport {
    /// Failures of one kind
    pub fn failures_of(&self, kind: FailureKind) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

/// One mirror job against a remote client and a destination store
pub struct MirrorJob<'a, C: RemoteNamespaceClient, S: DestinationStore> {
    config: JobConfig,
    client: &'a C,
    store: &'a S,
    sink: Option<&'a dyn ProgressSink>,
    cancel: CancelFlag,
    state: JobState,
}

impl<'a, C: RemoteNamespaceClient, S: DestinationStore> MirrorJob<'a, C, S> {
    pub fn new(config: JobConfig, client: &'a C, store: &'a S) -> Self {
        Self {
            config,
            client,
            store,
            sink: None,
            cancel: CancelFlag::new(),
            state: JobState::Idle,
        }
    }

    /// Send status messages to `sink` instead of the log
    pub fn with_sink(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the job to completion
    ///
    /// Only a base node that cannot be browsed is an error; every other
    /// failure is recorded in the report.
    pub fn run(&mut self) -> Result<JobReport> {
        let start = Instant::now();
        let sink = sink_or_log(self.sink);
        let retry = RetryPolicy::new(self.config.retry_attempts, self.config.retry_delay);
        let mut report = JobReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        self.state = JobState::Browsing;
        info!(
            server = %self.config.remote_server,
            base = %self.config.base_node,
            root = %self.config.destination_root,
            dry_run = self.config.dry_run,
            "Starting mirror job"
        );

        let walker = NamespaceWalker::new(self.client, &retry, sink).with_cancel(&self.cancel);
        let walk = match walker.discover(
            &self.config.base_node,
            &self.config.name_filter,
            self.config.max_iterations,
        ) {
            Ok(walk) => walk,
            Err(e) => {
                self.state = JobState::BrowseFailed;
                sink.emit(&format!("Error: {}", e));
                return Err(e);
            }
        };
        self.state = JobState::BrowseComplete;

        report.browse_time = walk.stats.duration;
        report.tags_found = walk.leaves.len();
        report.failures = walk.failures;
        report.walk = walk.stats;

        if report.walk.cancelled {
            return Ok(self.finish(report, JobState::Cancelled, start));
        }

        if walk.leaves.is_empty() {
            sink.emit("No tags found matching criteria");
            return Ok(self.finish(report, JobState::Complete, start));
        }

        let mapper = PathMapper::from_config(&self.config);

        if self.config.dry_run {
            self.state = JobState::DryRunPreview;
            let paths = mapper.preview(&walk.leaves);
            let shown = paths.len().min(self.config.preview_limit);

            sink.emit("DRY RUN - Would create the following tags:");
            for path in &paths[..shown] {
                sink.emit(&format!("  {}", path));
            }
            if paths.len() > shown {
                sink.emit(&format!("  ... and {} more", paths.len() - shown));
            }

            report.preview = Some(PreviewReport { paths, shown });
            return Ok(self.finish(report, JobState::Complete, start));
        }

        self.state = JobState::Materializing;
        sink.emit(&format!("Creating tags under {}", mapper.root_path()));

        let requests = mapper.requests(&walk.leaves, self.config.data_type);
        let resolver = TypeResolver::new(self.client, &retry);
        let scheduler = BatchScheduler::from_config(&self.config, sink).with_cancel(&self.cancel);

        let summary = MirrorStore::new(self.store, &mapper, &self.config.remote_server, sink)
            .materialize(&requests, &scheduler, |node| resolver.resolve(node));

        report.tags_created = summary.tags_created;
        report.tags_existing = summary.tags_existing;
        report.folders_created = summary.folders_created;
        report.root_folders_created = summary.root_folders_created;
        let write_failures = !summary.failures.is_empty();
        report.failures.extend(summary.failures);

        sink.emit("TAG CREATION COMPLETE");
        sink.emit(&format!(
            "Tags Created: {} / {}",
            report.tags_created, report.tags_found
        ));
        sink.emit(&format!(
            "Folders Created: {}",
            report.folders_created + report.root_folders_created
        ));

        let state = if summary.batch.cancelled {
            JobState::Cancelled
        } else if write_failures {
            JobState::PartialFailure
        } else {
            JobState::Complete
        };
        Ok(self.finish(report, state, start))
    }

    fn finish(&mut self, mut report: JobReport, state: JobState, start: Instant) -> JobReport {
        self.state = state;
        report.state = state;
        report.success = state == JobState::Complete && report.tags_found > 0;
        report.total_time = start.elapsed();

        if state == JobState::PartialFailure {
            warn!(failures = report.failures.len(), "Mirror finished with failures");
        }
        info!(
            state = ?state,
            found = report.tags_found,
            created = report.tags_created,
            existing = report.tags_existing,
            elapsed_ms = report.total_time.as_millis() as u64,
            "Mirror job finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataTypeChoice, NameFilter};
    use crate::error::{MirrorError, RemoteError};
    use crate::mirror::MemoryTagStore;
    use crate::progress::CollectingSink;
    use crate::remote::{NativeValue, SnapshotClient};
    use crate::resolve::CanonicalType;

    fn scenario() -> SnapshotClient {
        SnapshotClient::builder("opc-srv", "Root", "Root")
            .folder("Root", "A", "A")
            .leaf("A", "A.CV", "CV", NativeValue::Int(7))
            .folder("A", "B", "B")
            .leaf("B", "B.CV", "CV", NativeValue::Bool(true))
            .leaf("B", "B.SP", "SP", NativeValue::Double(1.5))
            .build()
    }

    fn config(dry_run: bool) -> JobConfig {
        JobConfig::builder("opc-srv", "Root", "Target")
            .name_filter("CV")
            .dry_run(dry_run)
            .retry(3, Duration::ZERO)
            .chunk_pause(Duration::ZERO)
            .build()
            .unwrap()
    }

    #[test]
    fn test_live_run_and_rerun() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let sink = CollectingSink::new();

        let mut job = MirrorJob::new(config(false), &client, &store).with_sink(&sink);
        let report = job.run().unwrap();

        assert_eq!(report.state, JobState::Complete);
        assert!(report.success);
        assert_eq!(report.tags_found, 2);
        assert_eq!(report.tags_created, 2);
        assert_eq!(report.folders_created, 2);
        assert_eq!(report.root_folders_created, 1);
        assert_eq!(store.leaves(), vec!["[default]Target/A/B/CV", "[default]Target/A/CV"]);
        assert_eq!(
            store.leaf("[default]Target/A/CV").unwrap().data_type,
            CanonicalType::Int32
        );
        assert_eq!(job.state(), JobState::Complete);

        store.reset_calls();
        let reads_before = client.total_read_calls();
        let report = MirrorJob::new(config(false), &client, &store).run().unwrap();
        assert_eq!(report.tags_created, 0);
        assert_eq!(report.tags_existing, 2);
        assert_eq!(store.calls().mutating(), 0);
        assert_eq!(client.total_read_calls(), reads_before);
    }

    #[test]
    fn test_dry_run_preview() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let sink = CollectingSink::new();

        let report = MirrorJob::new(config(true), &client, &store)
            .with_sink(&sink)
            .run()
            .unwrap();

        let preview = report.preview.unwrap();
        assert_eq!(preview.paths, vec!["[default]Target/A/CV", "[default]Target/A/B/CV"]);
        assert_eq!(preview.shown, 2);
        assert_eq!(store.calls().mutating(), 0);
        assert_eq!(client.total_read_calls(), 0);
        assert!(sink.contains("DRY RUN"));
        assert!(!sink.contains("... and"));
    }

    #[test]
    fn test_preview_limit() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let sink = CollectingSink::new();
        let config = JobConfig::builder("opc-srv", "Root", "Target")
            .preview_limit(1)
            .build()
            .unwrap();

        let report = MirrorJob::new(config, &client, &store)
            .with_sink(&sink)
            .run()
            .unwrap();

        assert_eq!(report.tags_found, 3);
        assert_eq!(report.preview.unwrap().shown, 1);
        assert!(sink.contains("  ... and 2 more"));
    }

    #[test]
    fn test_no_match_exits_early() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let config = JobConfig::builder("opc-srv", "Root", "Target")
            .name_filter(NameFilter::any_of(["Missing"]))
            .dry_run(false)
            .build()
            .unwrap();

        let report = MirrorJob::new(config, &client, &store).run().unwrap();
        assert_eq!(report.state, JobState::Complete);
        assert!(!report.success);
        assert_eq!(store.calls(), Default::default());
    }

    #[test]
    fn test_fixed_type_skips_reads() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let config = JobConfig::builder("opc-srv", "Root", "Target")
            .name_filter("CV")
            .data_type(DataTypeChoice::Fixed(CanonicalType::String))
            .dry_run(false)
            .chunk_pause(Duration::ZERO)
            .build()
            .unwrap();

        MirrorJob::new(config, &client, &store).run().unwrap();
        assert_eq!(client.total_read_calls(), 0);
        assert_eq!(
            store.leaf("[default]Target/A/B/CV").unwrap().data_type,
            CanonicalType::String
        );
    }

    #[test]
    fn test_partial_failure() {
        let client = scenario();
        let store = MemoryTagStore::new();
        store.fail_create("[default]Target/A/B");

        let report = MirrorJob::new(config(false), &client, &store).run().unwrap();
        assert_eq!(report.state, JobState::PartialFailure);
        assert!(!report.success);
        assert_eq!(report.tags_created, 1);
        assert_eq!(report.failures_of(FailureKind::Folder).count(), 1);
        assert_eq!(report.failures_of(FailureKind::Leaf).count(), 1);
    }

    #[test]
    fn test_base_failure_is_fatal() {
        let client = scenario();
        client.fail_browse("Root", 10, RemoteError::Timeout { node: "Root".into() });
        let store = MemoryTagStore::new();

        let mut job = MirrorJob::new(config(false), &client, &store);
        let err = job.run().unwrap_err();
        assert!(matches!(err, MirrorError::BrowseFailed { .. }));
        assert_eq!(job.state(), JobState::BrowseFailed);
        assert!(job.state().is_terminal());
    }

    #[test]
    fn test_cancelled_before_start() {
        let client = scenario();
        let store = MemoryTagStore::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = MirrorJob::new(config(false), &client, &store)
            .with_cancel(cancel)
            .run()
            .unwrap();
        assert_eq!(report.state, JobState::Cancelled);
        assert_eq!(store.calls(), Default::default());
    }
}
