//! pushglob Sync - Bookkeeping engine
//!
//! Provides:
//! - Rescanning a local subtree into the file inventory
//! - Classifying a space against a destination endpoint (ok / pending / stale)
//! - Dispatching stale files as one batched transfer
//! - Reconciling terminal job outcomes back into the sync ledger
//!
//! ## Modules
//!
//! - [`inventory`] - File Inventory rescans
//! - [`planner`] - Sync Planner
//! - [`dispatcher`] - Job Dispatcher
//! - [`reconciler`] - Reconciler and its report types
//! - [`scheduler`] - Periodic reconcile loop
//! - [`walker`] - `walkdir`-based directory walker adapter

pub mod dispatcher;
pub mod inventory;
pub mod planner;
pub mod reconciler;
mod retry;
pub mod scheduler;
pub mod walker;

use std::path::PathBuf;

use thiserror::Error;

use pushglob_core::domain::DomainError;
use pushglob_core::ports::WalkError;

pub use retry::RetryPolicy;

/// Errors that can occur during bookkeeping operations
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The subtree to rescan does not exist
    #[error("Scan target does not exist: {}", .0.display())]
    ScanTargetMissing(PathBuf),

    /// The transfer service did not accept the batch; nothing was recorded
    #[error("Transfer request failed (exit code {}): {stderr}", exit_code_label(.exit_code))]
    TransferRequestFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A task could not be polled
    #[error("Lookup of task {task_id} failed: {reason}")]
    TaskLookupFailed { task_id: String, reason: String },

    /// Writing to the ledger failed after retries
    #[error("Ledger write failed: {0}")]
    LedgerWriteFailed(String),

    /// Reading from the ledger failed
    #[error("Ledger read failed: {0}")]
    LedgerReadFailed(String),

    /// The request refers to something the configuration does not define
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A rescan's walk could not run to completion
    #[error("Directory walk failed: {0}")]
    Walk(String),

    /// A domain-level error propagated from pushglob-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl From<WalkError> for SyncError {
    fn from(e: WalkError) -> Self {
        match e {
            WalkError::PathNotFound(path) => SyncError::ScanTargetMissing(path),
            other => SyncError::Walk(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_not_found_maps_to_scan_target_missing() {
        let err: SyncError = WalkError::PathNotFound(PathBuf::from("/nope")).into();
        assert!(matches!(err, SyncError::ScanTargetMissing(p) if p == PathBuf::from("/nope")));
    }

    #[test]
    fn walk_io_maps_to_walk() {
        let err: SyncError = WalkError::Io {
            path: PathBuf::from("/x"),
            message: "denied".into(),
        }
        .into();
        assert!(matches!(err, SyncError::Walk(_)));
    }

    #[test]
    fn transfer_request_failed_display() {
        let err = SyncError::TransferRequestFailed {
            exit_code: Some(4),
            stderr: "bad endpoint".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transfer request failed (exit code 4): bad endpoint"
        );
    }
}
