use clap::{Parser, ValueEnum};
use colored::Colorize;
use filetool::{
    process, Action, ConfigOverrides, EncodingMode, ProcessConfig, ProcessError, Reporter,
    RunOutcome, StatsSnapshot,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Parser)]
#[command(name = "filetool", author, version, about, long_about = None)]
struct Cli {
    /// Root directory to process
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Operation to apply to each file (find|replace|convert)
    #[arg(short = 'a', long, value_parser = parse_action)]
    action: Option<Action>,

    /// Text to search for (find, replace)
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Replacement text (replace)
    #[arg(short = 'r', long = "replace")]
    replacement: Option<String>,

    /// Only process files whose path ends with this suffix (e.g. .txt)
    #[arg(short = 'e', long = "ext")]
    extension: Option<String>,

    /// Number of worker threads [default: 5]
    #[arg(short = 'c', long)]
    concurrency: Option<NonZeroUsize>,

    /// Patterns to ignore (glob format)
    #[arg(short = 'i', long)]
    ignore: Vec<String>,

    /// Paths buffered between the walker and the workers [default: 0]
    #[arg(long)]
    queue_depth: Option<usize>,

    /// How convert handles invalid UTF-8 sequences (failfast|lossy)
    #[arg(long, value_parser = parse_encoding)]
    encoding: Option<EncodingMode>,

    /// Additional YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Format of the final report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Only print failures and the final report
    #[arg(short, long)]
    quiet: bool,

    /// Log level used when RUST_LOG is not set [default: warn]
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

fn parse_action(s: &str) -> std::result::Result<Action, String> {
    s.parse().map_err(|e: ProcessError| e.to_string())
}

fn parse_encoding(s: &str) -> std::result::Result<EncodingMode, String> {
    s.parse().map_err(|e: ProcessError| e.to_string())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        if matches!(e, ProcessError::Config(_) | ProcessError::ConfigLoad(_)) {
            eprintln!("Run 'filetool --help' for usage");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        root_path: cli.dir,
        action: cli.action,
        target: cli.target,
        replacement: cli.replacement,
        extension: cli.extension,
        concurrency: cli.concurrency,
        queue_depth: cli.queue_depth,
        ignore_patterns: cli.ignore,
        encoding_mode: cli.encoding,
        log_level: cli.log_level,
    };
    let config = ProcessConfig::load_from(cli.config.as_deref())?.merge_with_cli(overrides);

    setup_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    // Reject bad arguments before the banner or any worker starts
    let action = config.validate()?;

    let json = cli.format == ReportFormat::Json;
    if !json {
        println!(
            "{} {} in {} (suffix: {}, workers: {})",
            "Running".green().bold(),
            action,
            config.root_path.display().to_string().blue(),
            if config.extension.is_empty() {
                "<any>"
            } else {
                config.extension.as_str()
            },
            config.concurrency
        );
    }

    let reporter = Arc::new(ConsoleReporter::new(cli.quiet || json));
    let outcome = process(&config, reporter.clone())?;
    reporter.finish();

    if json {
        print_json_report(action, &outcome)
    } else {
        print_text_report(action, &outcome);
        Ok(())
    }
}

fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints per-file notices above a spinner on stderr.
///
/// Notices go through `suspend` so they are printed even when the spinner is
/// hidden because the output is not a terminal.
struct ConsoleReporter {
    progress: ProgressBar,
    quiet: bool,
}

impl ConsoleReporter {
    fn new(quiet: bool) -> Self {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} {pos} files {wide_msg}")
        {
            progress.set_style(style);
        }
        progress.enable_steady_tick(Duration::from_millis(100));
        Self { progress, quiet }
    }

    fn finish(&self) {
        self.progress.finish_and_clear();
    }
}

impl Reporter for ConsoleReporter {
    fn file_started(&self, _action: Action, path: &Path) {
        self.progress.inc(1);
        self.progress.set_message(path.display().to_string());
    }

    fn line_matched(&self, path: &Path, line_number: usize, line: &str) {
        if self.quiet {
            return;
        }
        self.progress.suspend(|| {
            println!(
                "{}:{}: {}",
                path.display().to_string().blue(),
                line_number.to_string().green(),
                line
            )
        });
    }

    fn file_skipped(&self, path: &Path, reason: &str) {
        if self.quiet {
            return;
        }
        self.progress
            .suspend(|| println!("{} {}: {}", "Skipped".yellow(), path.display(), reason));
    }

    fn file_written(&self, source: &Path, output: &Path, count: u64) {
        if self.quiet {
            return;
        }
        self.progress.suspend(|| {
            println!(
                "{} {} -> {} ({})",
                "Wrote".green(),
                source.display(),
                output.display().to_string().blue(),
                count
            )
        });
    }

    fn file_failed(&self, path: &Path, error: &ProcessError) {
        self.progress
            .suspend(|| eprintln!("{} {}: {}", "Failed".red(), path.display(), error));
    }
}

fn metric_label(action: Action) -> &'static str {
    match action {
        Action::Find => "Matched lines",
        Action::Replace => "Replacements",
        Action::Convert => "Converted files",
    }
}

fn print_text_report(action: Action, outcome: &RunOutcome) {
    let stats = &outcome.stats;

    if let Some(err) = &outcome.walk_error {
        println!("{} {}", "Directory walk stopped early:".red().bold(), err);
    }

    println!("\n{}", "Summary".bold());
    println!(
        "Total files: {}, succeeded: {}, failed: {}",
        stats.total,
        stats.success.to_string().green(),
        if stats.fail > 0 {
            stats.fail.to_string().red()
        } else {
            stats.fail.to_string().normal()
        }
    );
    println!("{}: {}", metric_label(action), stats.metric(action));

    if !stats.errors.is_empty() {
        println!("\n{}", "Failed files:".red().bold());
        for (path, error) in &stats.errors {
            println!("  {}: {}", path.display(), error);
        }
    }

    println!(
        "\nFinished in {}",
        humantime::format_duration(round_to_millis(outcome.elapsed))
    );
}

#[derive(Serialize)]
struct JsonReport<'a> {
    action: Action,
    stats: &'a StatsSnapshot,
    files_discovered: usize,
    walk_error: Option<String>,
    elapsed_ms: u64,
}

impl<'a> JsonReport<'a> {
    fn new(action: Action, outcome: &'a RunOutcome) -> Self {
        Self {
            action,
            stats: &outcome.stats,
            files_discovered: outcome.files_discovered,
            walk_error: outcome.walk_error.as_ref().map(|e| e.to_string()),
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        }
    }
}

fn print_json_report(action: Action, outcome: &RunOutcome) -> Result<()> {
    let report = JsonReport::new(action, outcome);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn round_to_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}
