use memchr::memmem;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::reader::read_bytes;
use super::write_output;
use crate::config::Action;
use crate::errors::ProcessResult;
use crate::reporter::Reporter;
use crate::stats::Stats;

/// Suffix appended to the file stem of replace output
pub const REPLACED_SUFFIX: &str = "_new";

/// Path of the sibling written by `replace`: `dir/<stem>_new.<ext>`
pub fn replaced_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    let mut name = OsString::from(stem);
    name.push(REPLACED_SUFFIX);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Replaces the non-overlapping occurrences of `target` in `contents`.
///
/// Bytes outside the occurrences are copied unchanged, whatever their encoding.
/// Returns the new contents and the number of occurrences replaced.
pub fn replace_bytes(contents: &[u8], target: &str, replacement: &str) -> (Vec<u8>, u64) {
    let mut output = Vec::with_capacity(contents.len());
    let mut last = 0;
    let mut count = 0;
    for start in memmem::find_iter(contents, target.as_bytes()) {
        output.extend_from_slice(&contents[last..start]);
        output.extend_from_slice(replacement.as_bytes());
        last = start + target.len();
        count += 1;
    }
    output.extend_from_slice(&contents[last..]);
    (output, count)
}

/// Replaces every occurrence of `target` in `path`, writing the result next to it.
///
/// Nothing is written when `target` does not occur; the file still counts as
/// processed successfully.
pub fn replace_in_file(
    path: &Path,
    target: &str,
    replacement: &str,
    stats: &Stats,
    reporter: &dyn Reporter,
) -> ProcessResult<()> {
    reporter.file_started(Action::Replace, path);
    let contents = read_bytes(path)?;

    let (replaced, count) = replace_bytes(&contents, target, replacement);
    if count == 0 {
        reporter.file_skipped(path, &format!("'{}' not found", target));
        stats.add_success();
        return Ok(());
    }

    let output = replaced_path(path);
    write_output(&output, &replaced)?;
    reporter.file_written(path, &output, count);

    stats.add_success();
    stats.add_replaces(count);
    Ok(())
}
