//! Sync plans and file classification
//!
//! A plan is the result of joining the File Inventory of a space against the
//! Sync Ledger for one destination endpoint. Every file falls into exactly
//! one class:
//!
//! | Class     | Condition                                                   |
//! |-----------|-------------------------------------------------------------|
//! | `pending` | an unresolved sync record exists for the file and endpoint  |
//! | `stale`   | no confirmed record, or the newest one is older than mtime  |
//! | `ok`      | otherwise                                                   |
//!
//! Pending wins over stale: a file is never queued twice while a job is
//! outstanding for it, even if it changed again locally.

use serde::{Deserialize, Serialize};

use super::newtypes::{EndpointName, FileId, RelativePath, SpaceName};

/// Classification of a tracked file against one destination endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    /// Last confirmed transfer matches the local mtime
    Ok,
    /// Covered by an unresolved transfer job
    Pending,
    /// Needs a transfer
    Stale,
}

/// Ledger view of one file for one endpoint, as produced by the store join
#[derive(Debug, Clone, PartialEq)]
pub struct FileSyncStatus {
    pub file_id: FileId,
    pub path: RelativePath,
    pub mtime: f64,
    /// True if any unconfirmed record exists for the endpoint
    pub has_unresolved: bool,
    /// Newest confirmed timestamp for the endpoint
    pub last_confirmed: Option<f64>,
}

/// Classifies a file from its ledger view
pub fn classify(status: &FileSyncStatus) -> FileClass {
    if status.has_unresolved {
        return FileClass::Pending;
    }
    match status.last_confirmed {
        Some(ts) if ts >= status.mtime => FileClass::Ok,
        _ => FileClass::Stale,
    }
}

/// A file together with its class, kept on the plan for later filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFile {
    pub file_id: FileId,
    pub path: RelativePath,
    pub mtime: f64,
    pub class: FileClass,
}

/// A file selected for transfer, with the mtime observed at plan time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleFile {
    pub file_id: FileId,
    pub path: RelativePath,
    pub mtime: f64,
}

/// Per-class file counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    pub ok: usize,
    pub pending: usize,
    pub stale: usize,
}

impl PlanCounts {
    /// Number of files classified
    pub fn total(&self) -> usize {
        self.ok + self.pending + self.stale
    }

    fn add(&mut self, class: FileClass) {
        match class {
            FileClass::Ok => self.ok += 1,
            FileClass::Pending => self.pending += 1,
            FileClass::Stale => self.stale += 1,
        }
    }
}

/// Classification of a space against one destination endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub space: SpaceName,
    /// Subtree that was rescanned to build this plan
    pub subtree: RelativePath,
    pub destination: EndpointName,
    pub counts: PlanCounts,
    /// Files to include in the next transfer, in path order
    pub stale_files: Vec<StaleFile>,
    /// Every classified file, in path order
    pub files: Vec<ClassifiedFile>,
}

impl Plan {
    /// Builds a plan from the store's per-file ledger view
    pub fn from_statuses(
        space: SpaceName,
        subtree: RelativePath,
        destination: EndpointName,
        statuses: impl IntoIterator<Item = FileSyncStatus>,
    ) -> Self {
        let mut files: Vec<ClassifiedFile> = statuses
            .into_iter()
            .map(|status| ClassifiedFile {
                class: classify(&status),
                file_id: status.file_id,
                path: status.path,
                mtime: status.mtime,
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Self::build(space, subtree, destination, files)
    }

    fn build(
        space: SpaceName,
        subtree: RelativePath,
        destination: EndpointName,
        files: Vec<ClassifiedFile>,
    ) -> Self {
        let mut counts = PlanCounts::default();
        let mut stale_files = Vec::new();
        for file in &files {
            counts.add(file.class);
            if file.class == FileClass::Stale {
                stale_files.push(StaleFile {
                    file_id: file.file_id,
                    path: file.path.clone(),
                    mtime: file.mtime,
                });
            }
        }

        Self {
            space,
            subtree,
            destination,
            counts,
            stale_files,
            files,
        }
    }

    /// Returns true if at least one file is stale
    pub fn needs_transfer(&self) -> bool {
        !self.stale_files.is_empty()
    }

    /// Returns a copy restricted to files under `self.subtree`
    ///
    /// Plans are space-wide; this narrows counts and the stale list to the
    /// subtree that was actually rescanned.
    #[must_use]
    pub fn restrict_to_subtree(&self) -> Plan {
        let files = self
            .files
            .iter()
            .filter(|f| f.path.starts_with(&self.subtree))
            .cloned()
            .collect();
        Self::build(
            self.space.clone(),
            self.subtree.clone(),
            self.destination.clone(),
            files,
        )
    }
}
