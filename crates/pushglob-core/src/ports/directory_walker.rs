//! Directory walker port (driven/secondary port)
//!
//! The inventory only needs an ordered sequence of `(relative path, mtime)`
//! pairs for the regular files under a root. How the tree is traversed
//! (symlinks, ignore rules, platform quirks) is left to the adapter.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::RelativePath;

/// One regular file found under the walk root
#[derive(Debug, Clone, PartialEq)]
pub struct WalkEntry {
    /// Path relative to the walk root, `/`-separated
    pub relative_path: RelativePath,
    /// Modification time, seconds since the Unix epoch
    pub mtime: f64,
}

/// Errors produced while walking a directory tree
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalkError {
    /// The walk root does not exist
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// An entry could not be read
    #[error("cannot read {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// An entry has a name that cannot be tracked (e.g. not valid UTF-8)
    #[error("untrackable entry: {0}")]
    InvalidEntry(String),
}

/// Lazy sequence of walk results
pub type WalkIter = Box<dyn Iterator<Item = Result<WalkEntry, WalkError>> + Send>;

/// Port trait for enumerating local files
pub trait IDirectoryWalker: Send + Sync {
    /// Starts a walk of every regular file under `root`
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::PathNotFound`] if `root` does not exist. Errors
    /// for individual entries are yielded by the iterator.
    fn walk(&self, root: &Path) -> Result<WalkIter, WalkError>;
}
