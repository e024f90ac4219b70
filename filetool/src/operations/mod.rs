//! The per-file operations and the selector that binds one of them to a run.
//!
//! Every operation has the same shape once its parameters are bound: it takes
//! a path and the run's [`Stats`], and either records its own success and
//! metric or returns an error for the dispatcher to record. What counts as
//! success is decided by each operation: `replace` with no occurrences is a
//! success that writes nothing.
//!
//! The selector turns an [`Operation`] into a boxed [`FileHandler`] once,
//! before any worker starts, so workers never branch on the action:
//!
//! ```rust,ignore
//! let operation = Operation::from_config(&config)?;
//! let handler = select_handler(&operation, config.encoding_mode, reporter);
//! handler(path, &stats)?;
//! ```
pub mod convert;
pub mod find;
pub mod reader;
pub mod replace;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::config::{Action, EncodingMode, ProcessConfig};
use crate::errors::{ProcessError, ProcessResult};
use crate::reporter::Reporter;
use crate::stats::Stats;

pub use convert::convert_file;
pub use find::find_in_file;
pub use replace::{replace_in_file, replaced_path};

/// An action together with the parameters it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Find { target: String },
    Replace { target: String, replacement: String },
    Convert,
}

impl Operation {
    /// Builds the operation from a config, validating it first
    pub fn from_config(config: &ProcessConfig) -> ProcessResult<Self> {
        let action = config.validate()?;
        let target = || config.target.clone().unwrap_or_default();

        Ok(match action {
            Action::Find => Operation::Find { target: target() },
            Action::Replace => Operation::Replace {
                target: target(),
                replacement: config.replacement.clone().unwrap_or_default(),
            },
            Action::Convert => Operation::Convert,
        })
    }

    pub fn action(&self) -> Action {
        match self {
            Operation::Find { .. } => Action::Find,
            Operation::Replace { .. } => Action::Replace,
            Operation::Convert => Action::Convert,
        }
    }
}

/// The callable each worker invokes once per file
pub type FileHandler = Box<dyn Fn(&Path, &Stats) -> ProcessResult<()> + Send + Sync>;

/// Binds `operation` to a handler for the duration of a run.
///
/// `find` and `replace` work on raw bytes; `encoding_mode` only affects
/// `convert`, which has to decode its input.
pub fn select_handler(
    operation: &Operation,
    encoding_mode: EncodingMode,
    reporter: Arc<dyn Reporter>,
) -> FileHandler {
    match operation.clone() {
        Operation::Find { target } => Box::new(move |path: &Path, stats: &Stats| {
            find_in_file(path, &target, stats, reporter.as_ref())
        }),
        Operation::Replace {
            target,
            replacement,
        } => Box::new(move |path: &Path, stats: &Stats| {
            replace_in_file(path, &target, &replacement, stats, reporter.as_ref())
        }),
        Operation::Convert => Box::new(move |path: &Path, stats: &Stats| {
            convert_file(path, encoding_mode, stats, reporter.as_ref())
        }),
    }
}

/// Writes `contents` to `dest` in one step.
///
/// The data goes to a temporary file in the destination directory which is
/// then renamed over `dest`, so a failed write never leaves a partial file.
pub(crate) fn write_output(dest: &Path, contents: &[u8]) -> ProcessResult<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ProcessError::persist(dest, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.flush())
        .map_err(|e| ProcessError::persist(dest, e))?;

    #[cfg(unix)]
    {
        use std::{fs, os::unix::fs::PermissionsExt};
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))
            .map_err(|e| ProcessError::persist(dest, e))?;
    }

    tmp.persist(dest)
        .map_err(|e| ProcessError::persist(dest, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_operation_from_config() {
        let dir = tempdir().unwrap();

        let config = ProcessConfig {
            target: Some("foo".to_string()),
            ..ProcessConfig::new(dir.path(), Action::Find)
        };
        assert_eq!(
            Operation::from_config(&config).unwrap(),
            Operation::Find {
                target: "foo".to_string()
            }
        );

        let config = ProcessConfig {
            target: Some("foo".to_string()),
            replacement: Some("bar".to_string()),
            ..ProcessConfig::new(dir.path(), Action::Replace)
        };
        let operation = Operation::from_config(&config).unwrap();
        assert_eq!(operation.action(), Action::Replace);

        let config = ProcessConfig::new(dir.path(), Action::Replace);
        assert!(Operation::from_config(&config).is_err());
    }

    #[test]
    fn test_select_handler_dispatches_by_action() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "name: foo\nfoo: bar\n").unwrap();

        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

        let stats = Stats::new();
        let find = select_handler(
            &Operation::Find {
                target: "foo".to_string(),
            },
            EncodingMode::FailFast,
            Arc::clone(&reporter),
        );
        find(&path, &stats).unwrap();
        assert_eq!(stats.snapshot().matches, 2);

        let stats = Stats::new();
        let convert = select_handler(&Operation::Convert, EncodingMode::FailFast, reporter);
        convert(&path, &stats).unwrap();
        assert_eq!(stats.snapshot().converts, 1);
        assert!(dir.path().join("a.json").exists());
    }

    #[test]
    fn test_write_output_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        fs::write(&dest, "old").unwrap();

        write_output(&dest, b"new contents").unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new contents");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "no temporary files should remain");
    }
}
