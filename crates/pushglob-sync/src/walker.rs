//! Directory walker adapter (secondary/driven adapter)
//!
//! Implements [`IDirectoryWalker`] on top of `walkdir`. Entries come out in
//! file-name order within each directory, so rescans are deterministic.
//! Symbolic links are not followed.
//!
//! An unreadable directory or an entry whose name is not valid UTF-8 is
//! yielded as an error and the walk carries on with its siblings.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use walkdir::WalkDir;

use pushglob_core::domain::RelativePath;
use pushglob_core::ports::{IDirectoryWalker, WalkEntry, WalkError, WalkIter};

/// `walkdir`-backed directory walker
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirWalker;

impl WalkdirWalker {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Seconds since the Unix epoch, negative for earlier times
fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn to_walk_entry(root: &Path, entry: &walkdir::DirEntry) -> Result<WalkEntry, WalkError> {
    let io_error = |message: String| WalkError::Io {
        path: entry.path().to_path_buf(),
        message,
    };

    let modified = entry
        .metadata()
        .map_err(|e| io_error(e.to_string()))?
        .modified()
        .map_err(|e| io_error(e.to_string()))?;

    let relative = entry
        .path()
        .strip_prefix(root)
        .map_err(|e| io_error(e.to_string()))?;
    let relative_path = RelativePath::from_path(relative)
        .map_err(|_| WalkError::InvalidEntry(entry.path().display().to_string()))?;

    Ok(WalkEntry {
        relative_path,
        mtime: unix_seconds(modified),
    })
}

impl IDirectoryWalker for WalkdirWalker {
    fn walk(&self, root: &Path) -> Result<WalkIter, WalkError> {
        if !root.exists() {
            return Err(WalkError::PathNotFound(root.to_path_buf()));
        }
        debug!(root = %root.display(), "Walking directory");

        let root: PathBuf = root.to_path_buf();
        let iter = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(to_walk_entry(&root, &entry)),
                Ok(_) => None,
                Err(e) => Some(Err(WalkError::Io {
                    path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                    message: e.to_string(),
                })),
            });

        Ok(Box::new(iter))
    }
}
