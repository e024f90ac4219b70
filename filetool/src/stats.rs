//! Shared counters for a processing run.
//!
//! [`Stats`] is written to by every worker at once and read exactly once,
//! after all workers have been joined. All fields live behind one mutex so
//! that `total == success + fail` holds after every update; the critical
//! sections are a few additions or a single map insert.
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::Action;
use crate::errors::ProcessError;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    success: u64,
    fail: u64,
    matches: u64,
    replaces: u64,
    converts: u64,
    errors: HashMap<PathBuf, String>,
}

/// Thread-safe accumulator for per-file outcomes and operation metrics
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<Counters>,
}

impl Stats {
    /// Creates an empty set of counters
    pub fn new() -> Self {
        Self::default()
    }

    // Updates are single assignments; a poisoned lock still holds consistent counters.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a successfully processed file
    pub fn add_success(&self) {
        let mut counters = self.lock();
        counters.total += 1;
        counters.success += 1;
    }

    /// Records a failed file and the reason it failed
    pub fn add_error(&self, path: &Path, err: &ProcessError) {
        let mut counters = self.lock();
        counters.total += 1;
        counters.fail += 1;
        counters.errors.insert(path.to_path_buf(), err.to_string());
    }

    /// Adds to the number of matching lines
    pub fn add_matches(&self, count: u64) {
        self.lock().matches += count;
    }

    /// Adds to the number of replaced occurrences
    pub fn add_replaces(&self, count: u64) {
        self.lock().replaces += count;
    }

    /// Counts one converted file
    pub fn add_converts(&self) {
        self.lock().converts += 1;
    }

    /// Copies the current counters out for reporting
    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.lock();
        StatsSnapshot {
            total: counters.total,
            success: counters.success,
            fail: counters.fail,
            matches: counters.matches,
            replaces: counters.replaces,
            converts: counters.converts,
            errors: counters
                .errors
                .iter()
                .map(|(path, err)| (path.clone(), err.clone()))
                .collect(),
        }
    }
}

/// Final, read-only view of a run's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    pub matches: u64,
    pub replaces: u64,
    pub converts: u64,
    /// Failure detail per file, ordered by path
    #[serde(serialize_with = "serialize_errors")]
    pub errors: BTreeMap<PathBuf, String>,
}

impl StatsSnapshot {
    /// The operation-specific metric for `action`
    pub fn metric(&self, action: Action) -> u64 {
        match action {
            Action::Find => self.matches,
            Action::Replace => self.replaces,
            Action::Convert => self.converts,
        }
    }

    /// Counters without the error detail, for comparing runs
    pub fn counts(&self) -> (u64, u64, u64, u64, u64, u64) {
        (
            self.total,
            self.success,
            self.fail,
            self.matches,
            self.replaces,
            self.converts,
        )
    }
}

// Paths are not always valid UTF-8, so keys are written in their display form
fn serialize_errors<S>(errors: &BTreeMap<PathBuf, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(
        errors
            .iter()
            .map(|(path, error)| (path.display().to_string(), error)),
    )
}
