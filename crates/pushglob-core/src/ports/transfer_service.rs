//! Transfer service port (driven/secondary port)
//!
//! The external service moves bytes between endpoints. The core only issues
//! one batched request per plan, polls it by task id, and can probe an
//! endpoint for connectivity.
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` for async trait methods.
//! - Errors are typed because the dispatcher and reconciler react to them
//!   differently (a rejected request writes nothing, a failed lookup only
//!   skips one job).

use thiserror::Error;

use crate::domain::{JobStatus, RelativePath, TaskId};

// ============================================================================
// Request / response types
// ============================================================================

/// One file to copy, relative to the source and destination roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPair {
    pub source: RelativePath,
    pub destination: RelativePath,
}

impl TransferPair {
    /// A pair with the same relative path on both sides
    pub fn mirrored(path: RelativePath) -> Self {
        Self {
            source: path.clone(),
            destination: path,
        }
    }
}

/// A batched transfer between two endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Opaque service id of the source endpoint
    pub source_endpoint_id: String,
    /// Opaque service id of the destination endpoint
    pub destination_endpoint_id: String,
    /// Root of the space on the source endpoint
    pub source_root: String,
    /// Root of the space on the destination endpoint
    pub destination_root: String,
    pub pairs: Vec<TransferPair>,
}

impl TransferRequest {
    /// Renders the batch as one `SOURCE DEST` line per pair
    ///
    /// Paths containing whitespace or quote characters are single-quoted
    /// so the service's line splitter keeps them whole.
    pub fn batch_input(&self) -> String {
        let mut out = String::new();
        for pair in &self.pairs {
            out.push_str(&quote_batch_path(
                &pair.source.join_remote(&self.source_root),
            ));
            out.push(' ');
            out.push_str(&quote_batch_path(
                &pair.destination.join_remote(&self.destination_root),
            ));
            out.push('\n');
        }
        out
    }
}

fn quote_batch_path(path: &str) -> String {
    let needs_quotes = path
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '#' | '\\'));
    if !needs_quotes {
        return path.to_string();
    }
    format!("'{}'", path.replace('\'', r#"'"'"'"#))
}

/// Acknowledgement of an accepted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReceipt {
    pub task_id: TaskId,
}

/// Current state of a task as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub status: JobStatus,
    /// Files in the task, when reported
    pub files: Option<u64>,
    /// Files already transferred, when reported
    pub files_transferred: Option<u64>,
}

/// Result of listing the root of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointListing {
    /// Number of entries at the endpoint root
    pub file_count: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a transfer service adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferServiceError {
    /// The service rejected or failed to accept the batch
    #[error("transfer request failed (exit code {}): {stderr}", fmt_exit_code(.exit_code))]
    RequestFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The task could not be looked up
    #[error("lookup of task {task_id} failed: {reason}")]
    LookupFailed { task_id: String, reason: String },

    /// The endpoint could not be listed
    #[error("listing endpoint {endpoint_id} failed: {reason}")]
    ListFailed { endpoint_id: String, reason: String },

    /// The service answered with something that could not be understood
    #[error("unexpected response from transfer service: {0}")]
    InvalidResponse(String),
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

// ============================================================================
// ITransferService trait
// ============================================================================

/// Port trait for the external bulk-transfer service
#[async_trait::async_trait]
pub trait ITransferService: Send + Sync {
    /// Submits one batched transfer
    ///
    /// # Errors
    ///
    /// [`TransferServiceError::RequestFailed`] if the service did not accept
    /// the batch.
    async fn request_batch_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TaskReceipt, TransferServiceError>;

    /// Fetches the current status of a task
    ///
    /// # Errors
    ///
    /// [`TransferServiceError::LookupFailed`] if the task cannot be queried.
    async fn poll_task(&self, task_id: &TaskId) -> Result<TaskInfo, TransferServiceError>;

    /// Lists the root of an endpoint, as a connectivity probe
    async fn list_endpoint_root(
        &self,
        endpoint_id: &str,
    ) -> Result<EndpointListing, TransferServiceError>;
}
