//! Path filtering for the directory walker.
//!
//! Two independent checks decide whether a regular file is handed to the
//! workers:
//!
//! 1. **Suffix filter**: the path string must end with the configured suffix.
//!    This is a plain string suffix, so `.txt`, `txt` and `notes.txt` are all
//!    valid filters. An empty suffix accepts every file.
//! 2. **Ignore patterns**: glob patterns matched against the `/`-normalised
//!    path. A file matching any pattern is skipped.
//!
//! [`PathFilter`] compiles both once per run so the walker does not re-parse
//! globs for every entry.
use glob::Pattern;
use std::path::Path;

use crate::errors::{ProcessError, ProcessResult};

/// Checks if a path ends with the given suffix. An empty suffix matches everything.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    suffix.is_empty() || path.to_string_lossy().ends_with(suffix)
}

/// Checks if a file should be ignored based on ignore patterns
pub fn should_ignore(path: &Path, ignore_patterns: &[Pattern]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }
    let normalized_path = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|p| p.matches(&normalized_path))
}

/// Compiled filter applied to every regular file the walker visits
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    suffix: String,
    ignore_patterns: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(suffix: impl Into<String>, ignore_patterns: &[String]) -> ProcessResult<Self> {
        let ignore_patterns = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    ProcessError::config(format!("invalid ignore pattern '{}': {}", p, e))
                })
            })
            .collect::<ProcessResult<Vec<_>>>()?;

        Ok(Self {
            suffix: suffix.into(),
            ignore_patterns,
        })
    }

    /// Determines if a file should be handed to the workers
    pub fn matches(&self, path: &Path) -> bool {
        has_suffix(path, &self.suffix) && !should_ignore(path, &self.ignore_patterns)
    }
}
