//! Ledger store port (driven/secondary port)
//!
//! This module defines the interface for persisting the File Inventory, the
//! Sync Ledger and the Transfer Job Registry.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem, etc.) and don't need domain-level classification.
//! - Every multi-row mutation is a single method so the adapter can run it
//!   in one transaction: a dispatch never leaves records without their job,
//!   and a job's status never disagrees with its records.

use chrono::{DateTime, Utc};

use crate::domain::{
    EndpointName, FileSyncStatus, JobId, JobStatus, RelativePath, SpaceName, StaleFile, SyncRecord,
    TaskId, TrackedFile, TransferJob,
};

// ============================================================================
// Input / output types
// ============================================================================

/// A file seen by a rescan
#[derive(Debug, Clone, PartialEq)]
pub struct FileObservation {
    /// Path relative to the space's local root
    pub path: RelativePath,
    pub mtime: f64,
}

/// Row counts of one inventory upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Everything recorded after the service accepted a batch
#[derive(Debug, Clone, PartialEq)]
pub struct NewDispatch {
    pub task_id: TaskId,
    pub endpoint: EndpointName,
    /// Files in the batch, with the mtime they were planned at
    pub files: Vec<StaleFile>,
    pub requested_at: DateTime<Utc>,
}

/// A job with at least one unresolved sync record
#[derive(Debug, Clone, PartialEq)]
pub struct OpenJob {
    pub job: TransferJob,
    /// Number of unconfirmed records attached to the job
    pub open_records: usize,
}

// ============================================================================
// ILedgerStore trait
// ============================================================================

/// Port trait for the persistent ledger
///
/// ## Implementation Notes
///
/// - `upsert_files`, `record_dispatch`, `attach_registered_batches` and
///   `apply_job_status` must each be atomic.
/// - Files are never deleted; jobs are never deleted.
#[async_trait::async_trait]
pub trait ILedgerStore: Send + Sync {
    // --- File Inventory ---

    /// Inserts or updates one file row per observation
    ///
    /// Rows whose stored mtime already equals the observation are left alone.
    async fn upsert_files(
        &self,
        space: &SpaceName,
        observations: &[FileObservation],
    ) -> anyhow::Result<UpsertSummary>;

    /// Joins every file of `space` against the ledger for `endpoint`
    async fn file_statuses(
        &self,
        space: &SpaceName,
        endpoint: &EndpointName,
    ) -> anyhow::Result<Vec<FileSyncStatus>>;

    // --- Dispatch ---

    /// Creates a job with status `unknown` plus one unconfirmed record per file
    async fn record_dispatch(&self, dispatch: &NewDispatch) -> anyhow::Result<JobId>;

    /// Creates a job row without any records
    ///
    /// Used when `record_dispatch` keeps failing, so the external task id is
    /// still on file. The batch is kept on the job row until
    /// `attach_registered_batches` turns it into records.
    async fn register_job(&self, dispatch: &NewDispatch) -> anyhow::Result<JobId>;

    /// Writes the unconfirmed records of every job created by `register_job`
    ///
    /// Atomic. Returns the number of records attached; a job's batch is
    /// attached only once.
    async fn attach_registered_batches(&self) -> anyhow::Result<usize>;

    // --- Reconcile ---

    /// Jobs with at least one unresolved record, oldest first
    async fn open_jobs(&self) -> anyhow::Result<Vec<OpenJob>>;

    /// Stores `status` on the job and applies its ledger action
    ///
    /// Returns the number of records confirmed or deleted.
    async fn apply_job_status(&self, job_id: JobId, status: &JobStatus) -> anyhow::Result<usize>;

    // --- Reporting ---

    /// Every tracked file of `space`, in path order
    async fn list_files(&self, space: &SpaceName) -> anyhow::Result<Vec<TrackedFile>>;

    /// Sync records, optionally for one endpoint, in insertion order
    async fn list_sync_records(
        &self,
        endpoint: Option<&EndpointName>,
    ) -> anyhow::Result<Vec<SyncRecord>>;

    /// Every job, newest first
    async fn list_jobs(&self) -> anyhow::Result<Vec<TransferJob>>;
}
