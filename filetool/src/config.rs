use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{ProcessError, ProcessResult};

/// Number of workers used when neither the CLI nor a config file sets one
pub const DEFAULT_CONCURRENCY: usize = 5;

/// The operation applied to every file of a run.
///
/// Fixed for the whole run and chosen before any worker starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Count lines containing a target string
    Find,
    /// Write a `_new` sibling with every occurrence of the target replaced
    Replace,
    /// Turn `key:value` lines into a `.json` sibling
    Convert,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Find => "find",
            Action::Replace => "replace",
            Action::Convert => "convert",
        }
    }

    fn needs_target(&self) -> bool {
        matches!(self, Action::Find | Action::Replace)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find" => Ok(Action::Find),
            "replace" => Ok(Action::Replace),
            "convert" => Ok(Action::Convert),
            other => Err(ProcessError::config(format!(
                "unsupported action: {} (expected find, replace or convert)",
                other
            ))),
        }
    }
}

/// How to handle invalid UTF-8 sequences in input files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Fail the file on the first invalid sequence
    #[default]
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep going
    Lossy,
}

impl FromStr for EncodingMode {
    type Err = ProcessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "failfast" => Ok(EncodingMode::FailFast),
            "lossy" => Ok(EncodingMode::Lossy),
            other => Err(ProcessError::config(format!(
                "unsupported encoding mode: {} (expected failfast or lossy)",
                other
            ))),
        }
    }
}

/// Configuration for a processing run.
///
/// # Configuration Locations
///
/// Values are read from these files, later ones taking precedence:
/// 1. Global `$HOME/.config/filetool/config.yaml`
/// 2. Local `.filetool.yaml` in the current directory
/// 3. Custom config file passed via `--config`
///
/// Command-line values are applied last through [`ProcessConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # Root directory to process
/// root_path: "notes"
///
/// # find | replace | convert
/// action: "replace"
/// target: "foo"
/// replacement: "bar"
///
/// # Only paths ending with this suffix are processed
/// extension: ".txt"
///
/// # Number of workers
/// concurrency: 8
///
/// # Glob patterns to skip
/// ignore_patterns:
///   - "**/drafts/**"
///
/// # failfast | lossy
/// encoding_mode: "failfast"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Root directory to walk
    #[serde(default)]
    pub root_path: PathBuf,

    /// Operation applied to each file
    #[serde(default)]
    pub action: Option<Action>,

    /// String to find or replace
    #[serde(default)]
    pub target: Option<String>,

    /// Replacement text for `replace`
    #[serde(default)]
    pub replacement: Option<String>,

    /// Suffix filter; empty matches every regular file
    #[serde(default)]
    pub extension: String,

    /// Number of concurrent workers
    #[serde(default = "default_concurrency")]
    pub concurrency: NonZeroUsize,

    /// Capacity of the handoff queue between the walker and the workers.
    /// Zero makes every send wait for a worker to take the path.
    #[serde(default)]
    pub queue_depth: usize,

    /// Patterns to ignore (glob syntax)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// How invalid UTF-8 is handled
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Values given on the command line. `None` leaves the file value in place.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_path: Option<PathBuf>,
    pub action: Option<Action>,
    pub target: Option<String>,
    pub replacement: Option<String>,
    pub extension: Option<String>,
    pub concurrency: Option<NonZeroUsize>,
    pub queue_depth: Option<usize>,
    pub ignore_patterns: Vec<String>,
    pub encoding_mode: Option<EncodingMode>,
    pub log_level: Option<String>,
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CONCURRENCY).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::new(),
            action: None,
            target: None,
            replacement: None,
            extension: String::new(),
            concurrency: default_concurrency(),
            queue_depth: 0,
            ignore_patterns: Vec::new(),
            encoding_mode: EncodingMode::default(),
            log_level: default_log_level(),
        }
    }
}

impl ProcessConfig {
    /// Builds a config for `action` over `root_path` with every other field defaulted
    pub fn new(root_path: impl Into<PathBuf>, action: Action) -> Self {
        Self {
            root_path: root_path.into(),
            action: Some(action),
            ..Self::default()
        }
    }

    /// Loads configuration from the default locations
    pub fn load() -> ProcessResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus an optional custom file
    pub fn load_from(config_path: Option<&Path>) -> ProcessResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ProcessError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("filetool/config.yaml")),
            // Local config
            Some(PathBuf::from(".filetool.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments over configuration file values
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(root_path) = cli.root_path {
            self.root_path = root_path;
        }
        if cli.action.is_some() {
            self.action = cli.action;
        }
        if cli.target.is_some() {
            self.target = cli.target;
        }
        if cli.replacement.is_some() {
            self.replacement = cli.replacement;
        }
        if let Some(extension) = cli.extension {
            self.extension = extension;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(queue_depth) = cli.queue_depth {
            self.queue_depth = queue_depth;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        if let Some(encoding_mode) = cli.encoding_mode {
            self.encoding_mode = encoding_mode;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }

    /// Checks the arguments a run needs before anything is started.
    ///
    /// Returns the validated action so callers do not have to unwrap it again.
    pub fn validate(&self) -> ProcessResult<Action> {
        if self.root_path.as_os_str().is_empty() {
            return Err(ProcessError::config("root directory must not be empty"));
        }
        if !self.root_path.is_dir() {
            return Err(ProcessError::config(format!(
                "root directory does not exist or is not a directory: {}",
                self.root_path.display()
            )));
        }

        let action = self
            .action
            .ok_or_else(|| ProcessError::config("action must not be empty"))?;

        if action.needs_target() && self.target.as_deref().unwrap_or("").is_empty() {
            return Err(ProcessError::config(format!(
                "target must not be empty when action is {}",
                action
            )));
        }
        if action == Action::Replace && self.replacement.as_deref().unwrap_or("").is_empty() {
            return Err(ProcessError::config(
                "replacement must not be empty when action is replace",
            ));
        }

        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ProcessError::config(format!("invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(action)
    }
}
