use crossbeam_channel::Sender;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{ProcessError, ProcessResult};
use crate::filters::PathFilter;

/// Recursively walks `root`, sending every regular file accepted by `filter`.
///
/// Each send blocks until the queue has room, so the walker never runs ahead
/// of the workers by more than the queue capacity. The walk stops at the
/// first traversal error; paths sent before it remain queued.
///
/// Every directory is listed in full, in file-name order, before any of its
/// entries is sent. Output files that workers write next to their inputs are
/// therefore never picked up by the same walk.
///
/// Returns the number of paths sent.
pub fn walk_files(root: &Path, filter: &PathFilter, tx: &Sender<PathBuf>) -> ProcessResult<usize> {
    let mut walker = WalkBuilder::new(root);
    walker
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut sent = 0;
    for entry in walker.build() {
        let entry = entry.map_err(|e| {
            warn!("Directory walk aborted: {}", e);
            ProcessError::traversal(error_path(&e).unwrap_or(root), e.to_string())
        })?;

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if !filter.matches(entry.path()) {
            continue;
        }

        tx.send(entry.into_path())
            .map_err(|_| ProcessError::worker("all workers exited before the walk finished"))?;
        sent += 1;
    }

    debug!("Walk of {} finished, {} files queued", root.display(), sent);
    Ok(sent)
}

/// The path an `ignore` error refers to, if it carries one
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::fs;
    use std::io;
    use tempfile::tempdir;

    fn collect(root: &Path, filter: &PathFilter) -> ProcessResult<Vec<PathBuf>> {
        let (tx, rx) = unbounded();
        walk_files(root, filter, &tx)?;
        drop(tx);
        Ok(rx.iter().collect())
    }

    #[test]
    fn test_walk_recurses_and_filters() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("nested/c.txt"), "c").unwrap();
        fs::write(dir.path().join("nested/deeper/d.txt"), "d").unwrap();

        let filter = PathFilter::new(".txt", &[]).unwrap();
        let paths = collect(dir.path(), &filter).unwrap();

        assert_eq!(
            paths,
            vec![
                dir.path().join("a.txt"),
                dir.path().join("nested/c.txt"),
                dir.path().join("nested/deeper/d.txt"),
            ]
        );
    }

    #[test]
    fn test_empty_filter_emits_every_file() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join(".hidden"), "h").unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join("run.log"), "l").unwrap();
        fs::write(dir.path().join("sub/Makefile"), "m").unwrap();

        let paths = collect(dir.path(), &PathFilter::default()).unwrap();
        // Hidden files and gitignore rules do not apply, directories are never sent
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.is_file()));
    }

    #[test]
    fn test_ignore_patterns_skip_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("keep.txt"), "k").unwrap();
        fs::write(dir.path().join("drafts/skip.txt"), "s").unwrap();

        let filter = PathFilter::new(".txt", &["**/drafts/**".to_string()]).unwrap();
        let paths = collect(dir.path(), &filter).unwrap();
        assert_eq!(paths, vec![dir.path().join("keep.txt")]);
    }

    #[test]
    fn test_missing_root_is_traversal_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        match collect(&missing, &PathFilter::default()) {
            Err(ProcessError::Traversal { path, .. }) => assert_eq!(path, missing),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_path_names_failing_entry() {
        let not_found = || Box::new(ignore::Error::Io(io::Error::from(io::ErrorKind::NotFound)));

        let err = ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path: PathBuf::from("root/locked/dir"),
                err: not_found(),
            }),
        };
        assert_eq!(error_path(&err), Some(Path::new("root/locked/dir")));

        let err = ignore::Error::Loop {
            ancestor: PathBuf::from("root"),
            child: PathBuf::from("root/link"),
        };
        assert_eq!(error_path(&err), Some(Path::new("root/link")));

        assert_eq!(error_path(&not_found()), None);
    }

    #[test]
    fn test_closed_queue_stops_walk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let (tx, rx) = unbounded::<PathBuf>();
        drop(rx);
        let result = walk_files(dir.path(), &PathFilter::default(), &tx);
        assert!(matches!(result, Err(ProcessError::Worker(_))));
    }
}
