//! SyncRecord domain entity
//!
//! A sync record certifies that a given version (mtime) of a file was handed
//! to the transfer service for one destination endpoint.
//!
//! ## Lifecycle
//!
//! ```text
//!   dispatch            job SUCCEEDED
//!  ─────────► pending ────────────────► confirmed (job detached)
//!               │
//!               │ job FAILED
//!               ▼
//!            deleted  (file reverts to stale)
//! ```
//!
//! History is never compacted: a file accumulates one confirmed record per
//! successful transfer. Planning only looks at the newest state per file.

use serde::{Deserialize, Serialize};

use super::newtypes::{EndpointName, FileId, JobId};

/// Link from a sync record to the job that covers it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobLink {
    /// The record is waiting on this job's outcome
    Attached(JobId),
    /// The job outcome has been applied; the record no longer depends on it
    Detached,
}

impl JobLink {
    /// Returns the attached job, if any
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobLink::Attached(id) => Some(*id),
            JobLink::Detached => None,
        }
    }
}

/// One (file, destination endpoint) sync certification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// File this record certifies
    pub file_id: FileId,
    /// Destination endpoint the file was sent to
    pub endpoint: EndpointName,
    /// The file mtime that was transferred
    pub timestamp: f64,
    /// False while the owning job is unresolved
    pub confirmed: bool,
    /// Owning job, or detached once resolved
    pub job: JobLink,
}
