//! Chunked, paced processing of creation requests
//!
//! A cooperative throttle: requests are handled one at a time in chunks of
//! `batch_size`, with a short sleep between chunks. No token bucket.

use crate::config::JobConfig;
use crate::job::CancelFlag;
use crate::progress::ProgressSink;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Emit a "Processing tag" line every this many items, and after every chunk
pub const PROGRESS_EVERY: usize = 50;

/// Counters from one scheduler run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    /// Items handed to the callback
    pub processed: usize,

    /// Chunks started
    pub chunks: usize,

    /// Total time spent pausing
    pub paused: Duration,

    /// Stopped early by a cancel request
    pub cancelled: bool,
}

/// Runs a callback over items in fixed-size chunks
pub struct BatchScheduler<'a> {
    batch_size: usize,
    pause: Duration,
    sink: &'a dyn ProgressSink,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> BatchScheduler<'a> {
    /// A zero batch size is treated as 1
    pub fn new(batch_size: usize, pause: Duration, sink: &'a dyn ProgressSink) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pause,
            sink,
            cancel: None,
        }
    }

    pub fn from_config(config: &JobConfig, sink: &'a dyn ProgressSink) -> Self {
        Self::new(config.batch_size, config.chunk_pause, sink)
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|c| c.is_cancelled())
    }

    /// Call `f` on every item in order, pausing between chunks
    pub fn run<T, F>(&self, items: &[T], mut f: F) -> BatchStats
    where
        F: FnMut(&T),
    {
        let mut stats = BatchStats::default();
        let total = items.len();
        let chunk_count = total.div_ceil(self.batch_size);

        for (chunk_idx, chunk) in items.chunks(self.batch_size).enumerate() {
            if self.cancelled() {
                stats.cancelled = true;
                self.sink.emit("Tag creation cancelled");
                break;
            }
            stats.chunks += 1;

            for item in chunk {
                f(item);
                stats.processed += 1;
                if stats.processed % PROGRESS_EVERY == 0 {
                    self.sink
                        .emit(&format!("Processing tag {} / {}", stats.processed, total));
                }
            }

            debug!("Chunk {}/{} done", chunk_idx + 1, chunk_count);
            if stats.processed % PROGRESS_EVERY != 0 {
                self.sink
                    .emit(&format!("Processing tag {} / {}", stats.processed, total));
            }

            if chunk_idx + 1 < chunk_count && !self.pause.is_zero() {
                let start = Instant::now();
                thread::sleep(self.pause);
                stats.paused += start.elapsed();
            }
        }

        stats
    }
}
