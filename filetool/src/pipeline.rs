//! The walk-and-dispatch pipeline.
//!
//! ```text
//! walker thread ──send──▶ handoff queue ──recv──▶ worker 0..N ──▶ Stats
//!      │                                              │
//!      └─ returns: sender dropped, queue closes       └─ joined before the snapshot
//! ```
//!
//! Lifecycle:
//! 1. All `concurrency` workers are spawned before the walker starts, so a
//!    sent path always has a consumer.
//! 2. The walker owns the only [`Sender`](crossbeam_channel::Sender). When it
//!    returns, on success or on a traversal error, the sender is dropped and
//!    the queue closes. Nothing can be sent after that point.
//! 3. Each worker drains the queue until it is closed and empty, then exits.
//! 4. The counters are read only after every worker has been joined.
//!
//! No operation is ever interrupted: a traversal error stops new paths from
//! being produced but everything already queued is still processed.
use crossbeam_channel::{bounded, Receiver, Sender};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;
use crate::errors::{ProcessError, ProcessResult};
use crate::filters::PathFilter;
use crate::operations::{select_handler, FileHandler, Operation};
use crate::reporter::Reporter;
use crate::stats::{Stats, StatsSnapshot};
use crate::walker::walk_files;

/// What a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    /// Counters read after every worker exited
    pub stats: StatsSnapshot,
    /// Paths the walker handed to the workers
    pub files_discovered: usize,
    /// Why the walk stopped early, if it did
    pub walk_error: Option<ProcessError>,
    /// Wall-clock time from first spawn to last join
    pub elapsed: Duration,
}

/// A fixed-size pool of workers fed by a single directory walker
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: NonZeroUsize,
    queue_depth: usize,
}

impl WorkerPool {
    pub fn new(concurrency: NonZeroUsize, queue_depth: usize) -> Self {
        Self {
            concurrency,
            queue_depth,
        }
    }

    /// Walks `root` and runs `handler` on every accepted file
    pub fn run(
        &self,
        root: &Path,
        filter: &PathFilter,
        handler: &FileHandler,
        reporter: &dyn Reporter,
    ) -> ProcessResult<RunOutcome> {
        self.run_with(|tx| walk_files(root, filter, tx), handler, reporter)
    }

    /// Runs `handler` on every path `producer` sends.
    ///
    /// `producer` runs on its own thread and returns how many paths it sent.
    /// An `Err` from it ends up in [`RunOutcome::walk_error`] once the paths it
    /// already sent have been processed.
    pub fn run_with<P>(
        &self,
        producer: P,
        handler: &FileHandler,
        reporter: &dyn Reporter,
    ) -> ProcessResult<RunOutcome>
    where
        P: FnOnce(&Sender<PathBuf>) -> ProcessResult<usize> + Send,
    {
        let stats = Stats::new();
        let start = Instant::now();

        let (walk_result, handled, panicked) = thread::scope(|scope| -> ProcessResult<_> {
            // The sender must be dropped before the scope joins running workers
            let (tx, rx) = bounded::<PathBuf>(self.queue_depth);

            let mut workers = Vec::with_capacity(self.concurrency.get());
            for id in 0..self.concurrency.get() {
                let rx = rx.clone();
                let stats = &stats;
                let handle = thread::Builder::new()
                    .name(format!("filetool-worker-{}", id))
                    .spawn_scoped(scope, move || worker_loop(id, rx, handler, stats, reporter))
                    .map_err(|e| {
                        ProcessError::worker(format!("failed to spawn worker {}: {}", id, e))
                    })?;
                workers.push(handle);
            }
            drop(rx);

            let walker = thread::Builder::new()
                .name("filetool-walker".to_string())
                .spawn_scoped(scope, move || producer(&tx))
                .map_err(|e| ProcessError::worker(format!("failed to spawn walker: {}", e)))?;

            let walk_result = walker
                .join()
                .unwrap_or_else(|_| Err(ProcessError::worker("walker thread panicked")));

            let mut handled = 0;
            let mut panicked = 0;
            for worker in workers {
                match worker.join() {
                    Ok(count) => handled += count,
                    Err(_) => panicked += 1,
                }
            }
            Ok((walk_result, handled, panicked))
        })?;

        if panicked > 0 {
            return Err(ProcessError::worker(format!(
                "{} of {} workers panicked",
                panicked,
                self.concurrency.get()
            )));
        }

        // Every sent path is received by exactly one worker
        let walk_error = match walk_result {
            Ok(sent) => {
                debug_assert_eq!(sent, handled);
                None
            }
            Err(e) => {
                warn!("Walk stopped early: {}", e);
                Some(e)
            }
        };

        Ok(RunOutcome {
            stats: stats.snapshot(),
            files_discovered: handled,
            walk_error,
            elapsed: start.elapsed(),
        })
    }
}

fn worker_loop(
    id: usize,
    rx: Receiver<PathBuf>,
    handler: &FileHandler,
    stats: &Stats,
    reporter: &dyn Reporter,
) -> usize {
    debug!("Worker {} started", id);
    let mut handled = 0;
    for path in rx.iter() {
        debug!("Worker {} processing {}", id, path.display());
        if let Err(e) = handler(&path, stats) {
            stats.add_error(&path, &e);
            reporter.file_failed(&path, &e);
        }
        handled += 1;
    }
    debug!("Worker {} exiting after {} files", id, handled);
    handled
}

/// Runs the configured action over the configured directory.
///
/// Argument errors are returned before any thread is started. Per-file
/// failures end up in [`RunOutcome::stats`], and a traversal failure in
/// [`RunOutcome::walk_error`].
pub fn process(config: &ProcessConfig, reporter: Arc<dyn Reporter>) -> ProcessResult<RunOutcome> {
    let operation = Operation::from_config(config)?;
    let filter = PathFilter::new(config.extension.clone(), &config.ignore_patterns)?;
    let handler = select_handler(&operation, config.encoding_mode, Arc::clone(&reporter));

    info!(
        "Processing {} with action {}, suffix '{}', {} workers",
        config.root_path.display(),
        operation.action(),
        config.extension,
        config.concurrency
    );

    let pool = WorkerPool::new(config.concurrency, config.queue_depth);
    let outcome = pool.run(&config.root_path, &filter, &handler, reporter.as_ref())?;

    info!(
        "Processed {} files ({} ok, {} failed) in {:?}",
        outcome.stats.total, outcome.stats.success, outcome.stats.fail, outcome.elapsed
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Action;
    use crate::reporter::NullReporter;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn pool(concurrency: usize, queue_depth: usize) -> WorkerPool {
        WorkerPool::new(NonZeroUsize::new(concurrency).unwrap(), queue_depth)
    }

    fn write_files(dir: &Path, count: usize) {
        for i in 0..count {
            fs::write(dir.join(format!("file_{:03}.txt", i)), "line\n").unwrap();
        }
    }

    #[test]
    fn test_every_file_reaches_a_worker() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), 50);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler: FileHandler = Box::new(move |_path: &Path, stats: &Stats| {
            counter.fetch_add(1, Ordering::SeqCst);
            stats.add_success();
            Ok(())
        });

        let outcome = pool(4, 0)
            .run(dir.path(), &PathFilter::default(), &handler, &NullReporter)
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 50);
        assert_eq!(outcome.files_discovered, 50);
        assert_eq!(outcome.stats.total, 50);
        assert_eq!(outcome.stats.success, 50);
        assert!(outcome.walk_error.is_none());
    }

    #[test]
    fn test_handler_errors_are_recorded() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), 10);

        let handler: FileHandler = Box::new(|path: &Path, stats: &Stats| {
            if path.to_string_lossy().ends_with("5.txt") {
                return Err(ProcessError::format(1, "bad"));
            }
            stats.add_success();
            Ok(())
        });

        let outcome = pool(3, 2)
            .run(dir.path(), &PathFilter::default(), &handler, &NullReporter)
            .unwrap();

        assert_eq!(outcome.stats.total, 10);
        assert_eq!(outcome.stats.success, 9);
        assert_eq!(outcome.stats.fail, 1);
        assert!(outcome.stats.errors.contains_key(&dir.path().join("file_005.txt")));
    }

    #[test]
    fn test_more_workers_than_files() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), 2);

        let handler: FileHandler = Box::new(|_path: &Path, stats: &Stats| {
            stats.add_success();
            Ok(())
        });

        let outcome = pool(16, 0)
            .run(dir.path(), &PathFilter::default(), &handler, &NullReporter)
            .unwrap();
        assert_eq!(outcome.stats.total, 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let handler: FileHandler = Box::new(|_path: &Path, _stats: &Stats| Ok(()));

        let outcome = pool(2, 0)
            .run(dir.path(), &PathFilter::default(), &handler, &NullReporter)
            .unwrap();
        assert_eq!(outcome.files_discovered, 0);
        assert_eq!(outcome.stats, StatsSnapshot::default());
    }

    #[test]
    fn test_walk_error_does_not_fail_run() {
        let dir = tempdir().unwrap();
        let handler: FileHandler = Box::new(|_path: &Path, _stats: &Stats| Ok(()));

        let outcome = pool(2, 0)
            .run(
                &dir.path().join("missing"),
                &PathFilter::default(),
                &handler,
                &NullReporter,
            )
            .unwrap();
        assert!(matches!(
            outcome.walk_error,
            Some(ProcessError::Traversal { .. })
        ));
        assert_eq!(outcome.stats.total, 0);
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), 3);

        let handler: FileHandler = Box::new(|_path: &Path, _stats: &Stats| -> ProcessResult<()> { panic!("boom") });

        let result = pool(1, 0).run(dir.path(), &PathFilter::default(), &handler, &NullReporter);
        assert!(matches!(result, Err(ProcessError::Worker(_))));
    }

    #[test]
    fn test_process_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let config = ProcessConfig::new(dir.path(), Action::Find);
        let result = process(&config, Arc::new(NullReporter));
        assert!(matches!(result, Err(ProcessError::Config(_))));
    }

    #[test]
    fn test_process_find() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "foo\nbar\nfoo baz\n").unwrap();
        fs::write(dir.path().join("b.txt"), "baz\n").unwrap();
        fs::write(dir.path().join("c.md"), "foo\n").unwrap();

        let config = ProcessConfig {
            target: Some("foo".to_string()),
            extension: ".txt".to_string(),
            ..ProcessConfig::new(dir.path(), Action::Find)
        };

        let outcome = process(&config, Arc::new(NullReporter)).unwrap();
        assert_eq!(outcome.stats.matches, 2);
        assert_eq!(outcome.stats.total, 2);
        assert_eq!(outcome.stats.success, 2);
        assert_eq!(outcome.stats.fail, 0);
    }

    #[test]
    fn test_paths_sent_before_walk_error_are_processed() {
        let dir = tempdir().unwrap();
        write_files(dir.path(), 5);

        let handler: FileHandler = Box::new(|path: &Path, stats: &Stats| {
            if path.to_string_lossy().ends_with("1.txt") {
                return Err(ProcessError::format(1, "bad"));
            }
            stats.add_success();
            Ok(())
        });

        let root = dir.path();
        let producer = |tx: &Sender<PathBuf>| -> ProcessResult<usize> {
            for i in 0..3 {
                tx.send(root.join(format!("file_{:03}.txt", i)))
                    .map_err(|_| ProcessError::worker("queue closed"))?;
            }
            Err(ProcessError::traversal(root.join("unreadable"), "permission denied"))
        };

        let outcome = pool(2, 0).run_with(producer, &handler, &NullReporter).unwrap();

        match &outcome.walk_error {
            Some(ProcessError::Traversal { path, .. }) => {
                assert_eq!(path, &dir.path().join("unreadable"))
            }
            other => panic!("unexpected walk error: {:?}", other),
        }
        assert_eq!(outcome.files_discovered, 3);
        assert_eq!(outcome.stats.total, 3);
        assert_eq!(outcome.stats.success, 2);
        assert_eq!(outcome.stats.fail, 1);
        assert!(outcome.stats.errors.contains_key(&dir.path().join("file_001.txt")));
    }
}
