use memchr::memmem;
use std::path::Path;
use tracing::trace;

use super::reader::read_bytes;
use crate::config::Action;
use crate::errors::ProcessResult;
use crate::reporter::Reporter;
use crate::stats::Stats;

/// Splits raw contents into lines the same way `str::lines` does: `\n` ends
/// a line, a trailing `\r` is dropped and a final newline adds no empty line.
pub fn byte_lines(contents: &[u8]) -> impl Iterator<Item = &[u8]> {
    let contents = contents.strip_suffix(b"\n").unwrap_or(contents);
    contents
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Returns the 1-based numbers and contents of lines containing `target`.
///
/// Matching is done on bytes, so lines that are not valid UTF-8 still match.
/// A line with several occurrences is reported once.
pub fn matching_lines<'a>(contents: &'a [u8], target: &str) -> Vec<(usize, &'a [u8])> {
    let finder = memmem::Finder::new(target.as_bytes());
    byte_lines(contents)
        .enumerate()
        .filter(|(_, line)| finder.find(line).is_some())
        .map(|(index, line)| (index + 1, line))
        .collect()
}

/// Counts the lines of `path` containing `target` and records them in `stats`
pub fn find_in_file(
    path: &Path,
    target: &str,
    stats: &Stats,
    reporter: &dyn Reporter,
) -> ProcessResult<()> {
    reporter.file_started(Action::Find, path);
    let contents = read_bytes(path)?;

    let matches = matching_lines(&contents, target);
    for (line_number, line) in &matches {
        reporter.line_matched(path, *line_number, &String::from_utf8_lossy(line));
    }
    trace!("{} matching lines in {}", matches.len(), path.display());

    stats.add_success();
    stats.add_matches(matches.len() as u64);
    Ok(())
}
