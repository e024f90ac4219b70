pub mod config;
pub mod errors;
pub mod filters;
pub mod operations;
pub mod pipeline;
pub mod reporter;
pub mod stats;
pub mod walker;

pub use config::{Action, ConfigOverrides, EncodingMode, ProcessConfig};
pub use errors::{ProcessError, ProcessResult};
pub use operations::{select_handler, FileHandler, Operation};
pub use pipeline::{process, RunOutcome, WorkerPool};
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use stats::{Stats, StatsSnapshot};
