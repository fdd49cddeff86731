//! Configuration types for tag-mirror
//!
//! This module defines:
//! - The validated, immutable [`JobConfig`] consumed by a mirror job
//! - [`NameFilter`] and [`DataTypeChoice`] option types
//! - CLI argument parsing for the driver binary using clap derive macros

use crate::error::ConfigError;
use crate::remote::NodeId;
use crate::resolve::CanonicalType;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use clap::Parser;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

/// Default number of creation requests per chunk
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default traversal bound
pub const DEFAULT_MAX_ITERATIONS: usize = 2000;

/// Default pause between chunks
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// Default number of paths shown in a dry-run preview
pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

/// Default tag provider
pub const DEFAULT_PROVIDER: &str = "default";

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 10_000;

/// Characters a destination folder name may not contain
static SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^\[\]\\"\x00-\x1f]+$"#).expect("Invalid segment regex")
});

/// Which leaf display names the walker collects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NameFilter {
    /// Collect every terminal node
    #[default]
    All,
    /// Collect nodes whose display name is in the set
    Names(BTreeSet<String>),
}

impl NameFilter {
    /// Filter for one or more names
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameFilter::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, NameFilter::All)
    }

    /// Check if a display name is selected by the filter set
    ///
    /// `All` never short-circuits: with no names, only terminal nodes
    /// are collected, which the walker decides by probing.
    pub fn is_named(&self, name: &str) -> bool {
        match self {
            NameFilter::All => false,
            NameFilter::Names(names) => names.contains(name),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            NameFilter::All => Vec::new(),
            NameFilter::Names(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for NameFilter {
    fn from(name: &str) -> Self {
        NameFilter::any_of([name])
    }
}

impl From<Vec<String>> for NameFilter {
    fn from(names: Vec<String>) -> Self {
        if names.is_empty() {
            NameFilter::All
        } else {
            NameFilter::any_of(names)
        }
    }
}

impl fmt::Display for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameFilter::All => f.write_str("<all leaves>"),
            NameFilter::Names(_) => f.write_str(&self.names().join(", ")),
        }
    }
}

/// Data type assigned to created leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataTypeChoice {
    /// One type for every leaf
    Fixed(CanonicalType),
    /// Sample each leaf's current value
    #[default]
    Auto,
}

impl fmt::Display for DataTypeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTypeChoice::Fixed(t) => write!(f, "{}", t),
            DataTypeChoice::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for DataTypeChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(DataTypeChoice::Auto)
        } else {
            s.parse().map(DataTypeChoice::Fixed)
        }
    }
}

/// Validated job configuration
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Remote connection name
    pub remote_server: String,

    /// Node the walk starts from
    pub base_node: NodeId,

    /// Destination root, normalized to `seg/seg/...`
    pub destination_root: String,

    /// Tag provider the destination paths are qualified with
    pub tag_provider: String,

    pub name_filter: NameFilter,

    pub data_type: DataTypeChoice,

    /// Creation requests per chunk
    pub batch_size: usize,

    /// Traversal bound (work items processed)
    pub max_iterations: usize,

    /// Preview only, no destination writes
    pub dry_run: bool,

    /// Attempts per remote call
    pub retry_attempts: u32,

    /// Base delay between attempts
    pub retry_delay: Duration,

    /// Pause after each chunk of creation requests
    pub chunk_pause: Duration,

    /// Paths listed in a dry-run preview
    pub preview_limit: usize,
}

impl JobConfig {
    /// Start building a configuration
    pub fn builder(
        remote_server: impl Into<String>,
        base_node: impl Into<NodeId>,
        destination_root: impl Into<String>,
    ) -> JobConfigBuilder {
        JobConfigBuilder::new(remote_server, base_node, destination_root)
    }

    /// Create and validate configuration from CLI arguments
    ///
    /// Server and base node fall back to the snapshot's own values.
    pub fn from_args(
        args: &CliArgs,
        snapshot_server: &str,
        snapshot_root: &NodeId,
    ) -> Result<Self, ConfigError> {
        if let Some(parent) = args.output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidOutputPath {
                    path: args.output.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        let server = args.server.clone().unwrap_or_else(|| snapshot_server.to_string());
        let base = args
            .base
            .clone()
            .map(NodeId::from)
            .unwrap_or_else(|| snapshot_root.clone());

        JobConfig::builder(server, base, args.root.clone())
            .tag_provider(args.provider.clone())
            .name_filter(NameFilter::from(args.tags.clone()))
            .data_type(args.data_type)
            .batch_size(args.batch_size)
            .max_iterations(args.max_iterations)
            .retry(args.retries, Duration::from_millis(args.retry_delay_ms))
            .chunk_pause(Duration::from_millis(args.pause_ms))
            .dry_run(!args.apply)
            .build()
    }

    /// Destination root segments, top-down
    pub fn root_segments(&self) -> Vec<&str> {
        self.destination_root.split('/').collect()
    }
}

/// Builder for [`JobConfig`]
#[derive(Debug, Clone)]
pub struct JobConfigBuilder {
    remote_server: String,
    base_node: NodeId,
    destination_root: String,
    tag_provider: String,
    name_filter: NameFilter,
    data_type: DataTypeChoice,
    batch_size: usize,
    max_iterations: usize,
    dry_run: bool,
    retry_attempts: u32,
    retry_delay: Duration,
    chunk_pause: Duration,
    preview_limit: usize,
}

impl JobConfigBuilder {
    fn new(
        remote_server: impl Into<String>,
        base_node: impl Into<NodeId>,
        destination_root: impl Into<String>,
    ) -> Self {
        Self {
            remote_server: remote_server.into(),
            base_node: base_node.into(),
            destination_root: destination_root.into(),
            tag_provider: DEFAULT_PROVIDER.to_string(),
            name_filter: NameFilter::All,
            data_type: DataTypeChoice::Auto,
            batch_size: DEFAULT_BATCH_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            dry_run: true,
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }

    pub fn tag_provider(mut self, provider: impl Into<String>) -> Self {
        self.tag_provider = provider.into();
        self
    }

    pub fn name_filter(mut self, filter: impl Into<NameFilter>) -> Self {
        self.name_filter = filter.into();
        self
    }

    pub fn data_type(mut self, data_type: DataTypeChoice) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    pub fn chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    pub fn preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<JobConfig, ConfigError> {
        let remote_server = self.remote_server.trim().to_string();
        if remote_server.is_empty() {
            return Err(ConfigError::EmptyServer);
        }

        if self.base_node.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyBaseNode);
        }

        let destination_root = normalize_root(&self.destination_root)?;

        let tag_provider = self.tag_provider.trim().to_string();
        if tag_provider.is_empty() || tag_provider.contains(['[', ']', '/']) {
            return Err(ConfigError::InvalidProvider {
                provider: self.tag_provider.clone(),
                reason: "must be non-empty and contain no '[', ']' or '/'".into(),
            });
        }

        if self.batch_size < MIN_BATCH_SIZE || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: self.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(self.max_iterations));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        if let NameFilter::Names(names) = &self.name_filter {
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err(ConfigError::EmptyFilterName);
            }
        }

        Ok(JobConfig {
            remote_server,
            base_node: self.base_node,
            destination_root,
            tag_provider,
            name_filter: self.name_filter,
            data_type: self.data_type,
            batch_size: self.batch_size,
            max_iterations: self.max_iterations,
            dry_run: self.dry_run,
            retry_attempts: self.retry_attempts,
            retry_delay: self.retry_delay,
            chunk_pause: self.chunk_pause,
            preview_limit: self.preview_limit,
        })
    }
}

/// Trim segments, drop empty ones and validate what is left
fn normalize_root(root: &str) -> Result<String, ConfigError> {
    let segments: Vec<&str> = root
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(ConfigError::InvalidRoot {
            path: root.to_string(),
            reason: "no folder name given".into(),
        });
    }

    if let Some(bad) = segments.iter().find(|s| !SEGMENT_REGEX.is_match(s)) {
        return Err(ConfigError::InvalidRoot {
            path: root.to_string(),
            reason: format!("segment '{}' contains an illegal character", bad),
        });
    }

    Ok(segments.join("/"))
}

/// Mirror a remote OPC namespace into a tag provider
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tag-mirror",
    version,
    about = "Mirror matching nodes of a remote namespace into a tag provider",
    long_about = "Walks a remote namespace snapshot breadth-first, collects nodes whose display\n\
                  name matches --tag, and mirrors them as folders and OPC tags into a SQLite\n\
                  tag database.\n\n\
                  Runs as a dry run unless --apply is given. Re-running is always safe:\n\
                  existing folders and tags are never touched.",
    after_help = "EXAMPLES:\n    \
        tag-mirror plant.json --root BRX001 --tag CV\n    \
        tag-mirror plant.json --base 'ns=2;s=AREA_A' --root DELTAV/BIOREACTOR/BRX001 --tag CV --tag PV --apply\n    \
        tag-mirror plant.json --root ALL --data-type Float8 --apply -o tags.db"
)]
pub struct CliArgs {
    /// Namespace snapshot (JSON)
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Remote server name (defaults to the snapshot's server)
    #[arg(long, value_name = "NAME")]
    pub server: Option<String>,

    /// Node to start browsing from (defaults to the snapshot root)
    #[arg(short = 'b', long, value_name = "NODE_ID")]
    pub base: Option<String>,

    /// Destination root folder, may be nested (A/B/C)
    #[arg(short = 'r', long, value_name = "PATH")]
    pub root: String,

    /// Tag provider name
    #[arg(long, default_value = DEFAULT_PROVIDER, value_name = "NAME")]
    pub provider: String,

    /// Display name to collect (can be repeated; none collects every leaf)
    #[arg(short = 't', long = "tag", value_name = "NAME", action = clap::ArgAction::Append)]
    pub tags: Vec<String>,

    /// Data type for created tags, or 'auto' to sample each value
    #[arg(long, default_value = "auto", value_name = "TYPE")]
    pub data_type: DataTypeChoice,

    /// Tags created per chunk before pausing
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub batch_size: usize,

    /// Maximum browse iterations
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS, value_name = "NUM")]
    pub max_iterations: usize,

    /// Attempts per remote call
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_name = "NUM")]
    pub retries: u32,

    /// Base delay between attempts
    #[arg(long, default_value = "250", value_name = "MS")]
    pub retry_delay_ms: u64,

    /// Pause after each chunk
    #[arg(long, default_value = "500", value_name = "MS")]
    pub pause_ms: u64,

    /// Create folders and tags (otherwise dry run)
    #[arg(long)]
    pub apply: bool,

    /// Output tag database
    #[arg(short, long, default_value = "tags.db", value_name = "FILE")]
    pub output: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
