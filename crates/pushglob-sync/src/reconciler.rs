//! Reconciler
//!
//! Polls the transfer service for every job that still has unresolved sync
//! records and applies terminal outcomes to the ledger.
//!
//! ## Per-job State Machine
//!
//! | Reported status | Ledger effect                                   |
//! |-----------------|-------------------------------------------------|
//! | `SUCCEEDED`     | records confirmed and detached from the job     |
//! | `FAILED`        | records deleted; the files are stale again      |
//! | anything else   | cached status updated, job stays open           |
//!
//! Jobs registered without their sync records get them attached before the
//! open jobs are listed, so they are polled like any other.
//!
//! The status update and the ledger effect for one job commit together.
//! A failed poll or a failed write for one job is recorded in the report
//! and the pass moves on to the next job.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use pushglob_core::domain::{JobId, JobStatus, LedgerAction, TaskId};
use pushglob_core::ports::{ILedgerStore, ITransferService, OpenJob, TransferServiceError};

use crate::SyncError;

// ============================================================================
// Report types
// ============================================================================

/// What happened to one job during a pass
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The job succeeded; `records` were confirmed
    Confirmed { records: usize },
    /// The job failed; `records` were deleted
    Discarded { records: usize },
    /// The job is not finished yet
    StillOpen { status: JobStatus },
    /// The job could not be polled or its result could not be stored
    Failed { error: SyncError },
}

/// One line of a reconcile report
#[derive(Debug, Clone)]
pub struct JobReconciliation {
    pub job_id: JobId,
    pub task_id: TaskId,
    /// Unresolved records the job had when the pass started
    pub open_records: usize,
    pub outcome: ReconcileOutcome,
}

/// Result of [`Reconciler::reconcile_all`]
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub jobs: Vec<JobReconciliation>,
}

impl ReconcileReport {
    /// Number of jobs resolved as succeeded
    pub fn confirmed(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Confirmed { .. }))
    }

    /// Number of jobs resolved as failed
    pub fn discarded(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::Discarded { .. }))
    }

    /// Number of jobs still running
    pub fn still_open(&self) -> usize {
        self.count(|o| matches!(o, ReconcileOutcome::StillOpen { .. }))
    }

    /// Jobs that could not be reconciled this pass
    pub fn failures(&self) -> impl Iterator<Item = &JobReconciliation> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, ReconcileOutcome::Failed { .. }))
    }

    /// Returns true if there were no open jobs
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn count(&self, pred: impl Fn(&ReconcileOutcome) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.outcome)).count()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Applies transfer outcomes to the sync ledger
pub struct Reconciler {
    store: Arc<dyn ILedgerStore>,
    transfer: Arc<dyn ITransferService>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ILedgerStore>, transfer: Arc<dyn ITransferService>) -> Self {
        Self { store, transfer }
    }

    /// Polls every open job once and applies what the service reports
    ///
    /// # Errors
    ///
    /// Only [`SyncError::LedgerReadFailed`], when the open jobs cannot be
    /// listed. Per-job problems are collected in the report.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, SyncError> {
        if let Err(e) = self.store.attach_registered_batches().await {
            warn!(error = %format!("{e:#}"), "Could not attach records of registered jobs");
        }

        let open = self
            .store
            .open_jobs()
            .await
            .map_err(|e| SyncError::LedgerReadFailed(format!("{e:#}")))?;

        debug!(count = open.len(), "Reconciling open jobs");

        let mut report = ReconcileReport::default();
        for job in open {
            let outcome = self.reconcile_job(&job).await;
            report.jobs.push(JobReconciliation {
                job_id: job.job.id,
                task_id: job.job.task_id,
                open_records: job.open_records,
                outcome,
            });
        }

        info!(
            jobs = report.jobs.len(),
            confirmed = report.confirmed(),
            discarded = report.discarded(),
            still_open = report.still_open(),
            failed = report.failures().count(),
            "Reconcile pass complete"
        );
        Ok(report)
    }

    async fn reconcile_job(&self, open: &OpenJob) -> ReconcileOutcome {
        let job = &open.job;

        let info = match self.transfer.poll_task(&job.task_id).await {
            Ok(info) => info,
            Err(err) => {
                let error = lookup_error(&job.task_id, err);
                warn!(job_id = %job.id, task_id = %job.task_id, error = %error, "Task lookup failed");
                return ReconcileOutcome::Failed { error };
            }
        };

        let status = info.status;
        let records = match self.store.apply_job_status(job.id, &status).await {
            Ok(records) => records,
            Err(err) => {
                let error = SyncError::LedgerWriteFailed(format!("{err:#}"));
                warn!(job_id = %job.id, task_id = %job.task_id, error = %error, "Could not apply job status");
                return ReconcileOutcome::Failed { error };
            }
        };

        debug!(job_id = %job.id, task_id = %job.task_id, status = %status, records, "Job polled");
        match status.ledger_action() {
            LedgerAction::Confirm => ReconcileOutcome::Confirmed { records },
            LedgerAction::Discard => ReconcileOutcome::Discarded { records },
            LedgerAction::Keep => ReconcileOutcome::StillOpen { status },
        }
    }
}

fn lookup_error(task_id: &TaskId, err: TransferServiceError) -> SyncError {
    let reason = match err {
        TransferServiceError::LookupFailed { reason, .. } => reason,
        other => other.to_string(),
    };
    SyncError::TaskLookupFailed {
        task_id: task_id.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(outcome: ReconcileOutcome) -> JobReconciliation {
        JobReconciliation {
            job_id: JobId::new(1),
            task_id: TaskId::new("t").unwrap(),
            open_records: 1,
            outcome,
        }
    }

    #[test]
    fn report_counts_by_outcome() {
        let report = ReconcileReport {
            jobs: vec![
                line(ReconcileOutcome::Confirmed { records: 2 }),
                line(ReconcileOutcome::Confirmed { records: 1 }),
                line(ReconcileOutcome::Discarded { records: 1 }),
                line(ReconcileOutcome::StillOpen {
                    status: JobStatus::Active,
                }),
                line(ReconcileOutcome::Failed {
                    error: SyncError::LedgerWriteFailed("locked".into()),
                }),
            ],
        };
        assert_eq!(report.confirmed(), 2);
        assert_eq!(report.discarded(), 1);
        assert_eq!(report.still_open(), 1);
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn lookup_error_keeps_reason() {
        let err = lookup_error(
            &TaskId::new("abc").unwrap(),
            TransferServiceError::LookupFailed {
                task_id: "abc".into(),
                reason: "timed out".into(),
            },
        );
        assert_eq!(err.to_string(), "Lookup of task abc failed: timed out");
    }
}
