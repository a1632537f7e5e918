//! TransferJob domain entity
//!
//! A transfer job is the local record of one batched request issued to the
//! external transfer service. It caches the last status the service reported.
//!
//! ## Status State Machine
//!
//! ```text
//!   dispatch    ┌─────────┐   poll    ┌────────┐
//!  ───────────► │ unknown │ ────────► │ active │ ◄─┐ poll (non-terminal)
//!               └─────────┘           └────────┘ ──┘
//!                                         │
//!                       ┌─────────────────┴──────────────────┐
//!                       ▼                                    ▼
//!                ┌───────────┐                          ┌────────┐
//!                │ SUCCEEDED │ confirm records          │ FAILED │ discard records
//!                └───────────┘                          └────────┘
//! ```
//!
//! Status names come from the transfer service and are passed through
//! opaquely; only the two terminal values carry meaning for the ledger.
//! Jobs are never deleted; they are the audit trail of every request.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{EndpointName, JobId, TaskId};

/// External status string for a successfully completed task
pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";
/// External status string for a task that ended in failure
pub const STATUS_FAILED: &str = "FAILED";
/// External status string for a task still in progress
pub const STATUS_ACTIVE: &str = "ACTIVE";
/// Status cached on a job before it has ever been polled
pub const STATUS_UNKNOWN: &str = "unknown";

/// Cached status of a transfer job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum JobStatus {
    /// Not polled yet
    #[default]
    Unknown,
    /// Still running on the service side
    Active,
    /// Terminal: every file in the batch arrived
    Succeeded,
    /// Terminal: the batch failed
    Failed,
    /// Any other status string the service reported
    Other(String),
}

impl JobStatus {
    /// Interprets a status string reported by the transfer service
    ///
    /// Matching is exact for the terminal values; anything unrecognised is
    /// kept verbatim so it can be shown to the user.
    pub fn from_external(status: &str) -> Self {
        match status.trim() {
            STATUS_SUCCEEDED => JobStatus::Succeeded,
            STATUS_FAILED => JobStatus::Failed,
            STATUS_ACTIVE => JobStatus::Active,
            STATUS_UNKNOWN | "" => JobStatus::Unknown,
            other => JobStatus::Other(other.to_string()),
        }
    }

    /// The status string as stored and displayed
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Unknown => STATUS_UNKNOWN,
            JobStatus::Active => STATUS_ACTIVE,
            JobStatus::Succeeded => STATUS_SUCCEEDED,
            JobStatus::Failed => STATUS_FAILED,
            JobStatus::Other(s) => s,
        }
    }

    /// Returns true for SUCCEEDED and FAILED
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// What the ledger must do with the job's records given this status
    pub fn ledger_action(&self) -> LedgerAction {
        match self {
            JobStatus::Succeeded => LedgerAction::Confirm,
            JobStatus::Failed => LedgerAction::Discard,
            _ => LedgerAction::Keep,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::from_external(&s)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Effect of a job status on the sync records attached to the job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    /// Mark every attached record confirmed and detach it
    Confirm,
    /// Delete every attached record
    Discard,
    /// Leave the records untouched; only the cached status changes
    Keep,
}

/// Local record of one batched transfer request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferJob {
    /// Store-assigned identifier
    pub id: JobId,
    /// Handle issued by the transfer service
    pub task_id: TaskId,
    /// Last status reported by the service
    pub status: JobStatus,
    /// Destination endpoint of the batch
    pub endpoint: EndpointName,
    /// Number of files in the batch when it was requested
    pub file_count: u32,
    /// When the request was recorded
    pub created_at: DateTime<Utc>,
    /// When the cached status last changed
    pub updated_at: DateTime<Utc>,
}
