//! Progress reporting for mirror jobs
//!
//! The job reports human-readable status lines through a [`ProgressSink`].
//! Without an explicit sink, messages go to the log via [`LogSink`].
//! The binary forwards messages over a channel to a terminal spinner.

use crate::job::JobReport;
use console::style;
use crossbeam_channel::{Receiver, Sender};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Receiver of status messages; fire-and-forget
pub trait ProgressSink {
    fn emit(&self, message: &str);
}

/// Default sink: every message becomes an info event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, message: &str) {
        info!("{}", message);
    }
}

static LOG_SINK: LogSink = LogSink;

/// Use `sink` if given, the log otherwise
pub fn sink_or_log(sink: Option<&dyn ProgressSink>) -> &dyn ProgressSink {
    sink.unwrap_or(&LOG_SINK)
}

/// Sink that keeps every message, for drivers that render them later
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Check if any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.contains(needle))
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Sink that forwards messages to another thread
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<String>,
}

impl ChannelSink {
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiving end
    pub fn pair() -> (Self, Receiver<String>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, message: &str) {
        // Receiver gone means nobody is watching; the job carries on
        let _ = self.sender.send(message.to_string());
    }
}

/// Terminal spinner showing the latest status line
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Show a status line
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Drain `messages` on a background thread until every sender is dropped
    ///
    /// Errors and warnings are printed above the spinner so they stay
    /// visible; everything else replaces the status line.
    pub fn forward(&self, messages: Receiver<String>) -> JoinHandle<()> {
        let bar = self.bar.clone();
        thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || {
                for message in messages {
                    debug!("{}", message);
                    let trimmed = message.trim();
                    if trimmed.is_empty() || trimmed.chars().all(|c| c == '=') {
                        continue;
                    }
                    if is_notable(trimmed) {
                        bar.println(trimmed);
                    } else {
                        bar.set_message(trimmed.to_string());
                    }
                }
            })
            .expect("Failed to spawn progress thread")
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressReporter {
    fn emit(&self, message: &str) {
        self.set_status(message.trim());
    }
}

fn is_notable(message: &str) -> bool {
    message.starts_with("Error") || message.starts_with("WARNING") || message.starts_with("  ")
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of the job
pub fn print_header(server: &str, base: &str, root: &str, filter: &str, dry_run: bool) {
    println!();
    println!(
        "{} {}",
        style("tag-mirror").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Server:").bold(), server);
    println!("  {} {}", style("Base node:").bold(), base);
    println!("  {} {}", style("Root folder:").bold(), root);
    println!("  {} {}", style("Search:").bold(), filter);
    if dry_run {
        println!("  {} {}", style("Mode:").bold(), style("dry run").yellow());
    } else {
        println!("  {} {}", style("Mode:").bold(), style("live").green());
    }
    println!();
}

/// Print a summary of the job results
pub fn print_summary(report: &JobReport, db_path: &str, db_size: Option<u64>) {
    println!();
    println!("{} ({:?})", style("Mirror Complete").green().bold(), report.state);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Tags found:").bold(),
        format_number(report.tags_found as u64)
    );

    if let Some(preview) = &report.preview {
        println!(
            "  {} {}",
            style("Would create:").bold(),
            format_number(preview.paths.len() as u64)
        );
    } else {
        println!(
            "  {} {} ({} already present)",
            style("Tags created:").bold(),
            format_number(report.tags_created as u64),
            format_number(report.tags_existing as u64)
        );
        println!(
            "  {} {} (+{} root)",
            style("Folders created:").bold(),
            format_number(report.folders_created as u64),
            report.root_folders_created
        );
    }

    println!(
        "  {} {:.1}s browse, {:.1}s total ({} iterations)",
        style("Duration:").bold(),
        report.browse_time.as_secs_f64(),
        report.total_time.as_secs_f64(),
        format_number(report.walk.iterations as u64)
    );

    if !report.failures.is_empty() {
        println!(
            "  {} {}",
            style("Failures:").yellow().bold(),
            format_number(report.failures.len() as u64)
        );
    }

    if report.preview.is_none() {
        match db_size {
            Some(size) => println!(
                "  {} {} ({})",
                style("Database:").bold(),
                db_path,
                format_size(size, BINARY)
            ),
            None => println!("  {} {}", style("Database:").bold(), db_path),
        }
    }
    println!();
}
