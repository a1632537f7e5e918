//! File Inventory
//!
//! Rescans a subtree of a space and records the latest mtime of every regular
//! file found. Paths are stored relative to the space's local root, never to
//! the scanned subtree, so the same file keeps one row no matter which
//! directory a sync was started from.
//!
//! Entries the walker cannot read or name (an unreadable directory, a file
//! name that is not valid UTF-8) are logged and skipped; the rest of the
//! tree is still recorded.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use pushglob_core::domain::{RelativePath, SpaceName};
use pushglob_core::ports::{FileObservation, IDirectoryWalker, ILedgerStore};

use crate::SyncError;

/// Outcome of one rescan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Regular files found under the subtree
    pub observed: usize,
    /// Files seen for the first time
    pub inserted: usize,
    /// Files whose mtime changed
    pub updated: usize,
    /// Entries that could not be read or tracked
    pub skipped: usize,
}

/// Populates the file inventory from the local filesystem
#[derive(Clone)]
pub struct FileInventory {
    store: Arc<dyn ILedgerStore>,
    walker: Arc<dyn IDirectoryWalker>,
}

impl FileInventory {
    pub fn new(store: Arc<dyn ILedgerStore>, walker: Arc<dyn IDirectoryWalker>) -> Self {
        Self { store, walker }
    }

    /// Rescans `space_root/subtree` and upserts every file found
    ///
    /// The walk completes before anything is written, and all rows are
    /// written by one store call.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ScanTargetMissing`] if the subtree does not exist
    /// - [`SyncError::Walk`] if the walk task itself dies
    /// - [`SyncError::LedgerWriteFailed`] if the upsert fails
    #[instrument(skip(self, space_root), fields(space = %space, subtree = %subtree))]
    pub async fn rescan(
        &self,
        space: &SpaceName,
        space_root: &Path,
        subtree: &RelativePath,
    ) -> Result<ScanSummary, SyncError> {
        let scan_root = subtree.resolve(space_root);
        let walker = Arc::clone(&self.walker);
        let prefix = subtree.clone();

        let (observations, skipped) = tokio::task::spawn_blocking(move || {
            let mut observations = Vec::new();
            let mut skipped = 0;
            for entry in walker.walk(&scan_root)? {
                match entry {
                    Ok(entry) => {
                        debug!(path = %entry.relative_path, mtime = entry.mtime, "Observed file");
                        observations.push(FileObservation {
                            path: prefix.join(&entry.relative_path),
                            mtime: entry.mtime,
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Skipping entry");
                        skipped += 1;
                    }
                }
            }
            Ok::<_, SyncError>((observations, skipped))
        })
        .await
        .map_err(|e| SyncError::Walk(format!("walk task failed: {e}")))??;

        let upsert = self
            .store
            .upsert_files(space, &observations)
            .await
            .map_err(|e| SyncError::LedgerWriteFailed(format!("{e:#}")))?;

        let summary = ScanSummary {
            observed: observations.len(),
            inserted: upsert.inserted,
            updated: upsert.updated,
            skipped,
        };
        info!(
            count = summary.observed,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "Rescan complete"
        );
        Ok(summary)
    }
}
