use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Action;
use crate::errors::ProcessError;

/// Receives per-file notices while a run is in progress.
///
/// Called concurrently from every worker, so implementations must be
/// `Send + Sync`. Every method defaults to doing nothing.
pub trait Reporter: Send + Sync {
    /// A worker picked up `path`
    fn file_started(&self, _action: Action, _path: &Path) {}

    /// `find` matched a line (1-based)
    fn line_matched(&self, _path: &Path, _line_number: usize, _line: &str) {}

    /// The file was processed successfully but produced no output
    fn file_skipped(&self, _path: &Path, _reason: &str) {}

    /// An output file was written for `source`
    fn file_written(&self, _source: &Path, _output: &Path, _count: u64) {}

    /// Processing `path` failed; the error is also recorded in the stats
    fn file_failed(&self, _path: &Path, _error: &ProcessError) {}
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Forwards notices to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn file_started(&self, action: Action, path: &Path) {
        debug!("{} {}", action, path.display());
    }

    fn line_matched(&self, path: &Path, line_number: usize, line: &str) {
        info!("{}:{}: {}", path.display(), line_number, line);
    }

    fn file_skipped(&self, path: &Path, reason: &str) {
        info!("Skipped {}: {}", path.display(), reason);
    }

    fn file_written(&self, source: &Path, output: &Path, count: u64) {
        info!("{} -> {} ({})", source.display(), output.display(), count);
    }

    fn file_failed(&self, path: &Path, error: &ProcessError) {
        warn!("Failed to process {}: {}", path.display(), error);
    }
}
