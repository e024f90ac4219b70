use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::reader::read_text;
use super::write_output;
use crate::config::{Action, EncodingMode};
use crate::errors::{ProcessError, ProcessResult};
use crate::reporter::Reporter;
use crate::stats::Stats;

/// Parses newline-separated `key:value` records.
///
/// Lines are trimmed and blank lines skipped. The first `:` splits key from
/// value and both halves are trimmed. A later duplicate key overwrites the
/// earlier one. Line numbers in errors are 1-based and count blank lines.
pub fn parse_records(contents: &str) -> ProcessResult<BTreeMap<String, String>> {
    let mut records = BTreeMap::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ProcessError::format(index + 1, line))?;
        records.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(records)
}

/// Path of the JSON file written by `convert`
pub fn converted_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}

/// Converts a `key:value` file into a pretty-printed JSON object next to it
pub fn convert_file(
    path: &Path,
    encoding_mode: EncodingMode,
    stats: &Stats,
    reporter: &dyn Reporter,
) -> ProcessResult<()> {
    reporter.file_started(Action::Convert, path);
    let contents = read_text(path, encoding_mode)?;

    let records = parse_records(&contents)?;
    let json = serde_json::to_string_pretty(&records)?;

    let output = converted_path(path);
    write_output(&output, json.as_bytes())?;
    reporter.file_written(path, &output, records.len() as u64);

    stats.add_success();
    stats.add_converts();
    Ok(())
}
