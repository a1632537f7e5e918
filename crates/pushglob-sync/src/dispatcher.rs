//! Job Dispatcher
//!
//! Turns the stale files of a plan into one batched transfer request and
//! records the resulting job and its pending sync records.
//!
//! ## Dispatch Flow
//!
//! 1. Empty stale list: nothing to do, no request is made
//! 2. One batched request through the transfer service; a rejection writes
//!    nothing to the ledger
//! 3. Job + one unconfirmed record per file, in one transaction, retried
//!    with exponential backoff
//! 4. If that keeps failing, the job row alone is registered (also retried)
//!    with the batch stored on it, so the external task id is never lost and
//!    the next plan or reconcile pass attaches the records; the failure is
//!    still reported

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use pushglob_core::config::Config;
use pushglob_core::domain::{EndpointName, JobId, Plan, SpaceName, TaskId};
use pushglob_core::ports::{
    ILedgerStore, ITransferService, NewDispatch, TransferPair, TransferRequest,
    TransferServiceError,
};

use crate::retry::{with_retry, RetryPolicy};
use crate::SyncError;

// ============================================================================
// Route
// ============================================================================

/// A named endpoint with its opaque service id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: EndpointName,
    pub id: String,
}

/// Where a space's files travel from and to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRoute {
    pub source: Endpoint,
    pub destination: Endpoint,
    /// Space root as seen by the source endpoint
    pub source_root: String,
    /// Space root as seen by the destination endpoint
    pub destination_root: String,
}

impl TransferRoute {
    /// Resolves the route for `space` from the local endpoint to `destination`
    ///
    /// The source root is the space's entry for the local endpoint (the path
    /// the service sees), falling back to the `_local` directory.
    ///
    /// # Errors
    ///
    /// [`SyncError::ConfigInvalid`] if the space, either endpoint or either
    /// root is missing, or if the destination is the local endpoint itself.
    pub fn from_config(
        config: &Config,
        space: &SpaceName,
        destination: &EndpointName,
    ) -> Result<Self, SyncError> {
        let invalid = SyncError::ConfigInvalid;

        if destination == &config.local_endpoint {
            return Err(invalid(format!(
                "destination '{destination}' is the local endpoint"
            )));
        }
        let space_cfg = config
            .space(space)
            .ok_or_else(|| invalid(format!("space '{space}' is not configured")))?;

        let endpoint = |name: &EndpointName| -> Result<Endpoint, SyncError> {
            let id = config
                .endpoint_id(name)
                .ok_or_else(|| invalid(format!("endpoint '{name}' is not configured")))?;
            Ok(Endpoint {
                name: name.clone(),
                id: id.to_string(),
            })
        };

        let source_root = match space_cfg.endpoint_root(&config.local_endpoint) {
            Some(root) => root.to_string(),
            None => space_cfg
                .local_root(&config.local_endpoint)
                .map(|p| p.display().to_string())
                .ok_or_else(|| invalid(format!("space '{space}' has no local root")))?,
        };
        let destination_root = space_cfg
            .endpoint_root(destination)
            .ok_or_else(|| {
                invalid(format!(
                    "space '{space}' has no root on endpoint '{destination}'"
                ))
            })?
            .to_string();

        Ok(Self {
            source: endpoint(&config.local_endpoint)?,
            destination: endpoint(destination)?,
            source_root,
            destination_root,
        })
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// A batch accepted by the service and recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedJob {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub file_count: usize,
}

/// Result of [`JobDispatcher::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The plan had no stale files
    NothingToDo,
    Dispatched(DispatchedJob),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Issues batched transfers for plans
pub struct JobDispatcher {
    store: Arc<dyn ILedgerStore>,
    transfer: Arc<dyn ITransferService>,
    retry: RetryPolicy,
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn ILedgerStore>, transfer: Arc<dyn ITransferService>) -> Self {
        Self {
            store,
            transfer,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry schedule for ledger writes
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Requests one transfer for every stale file in `plan`
    ///
    /// # Errors
    ///
    /// - [`SyncError::ConfigInvalid`] if `route` does not lead to the plan's
    ///   destination
    /// - [`SyncError::TransferRequestFailed`] if the service rejected the
    ///   batch (nothing was recorded)
    /// - [`SyncError::LedgerWriteFailed`] if the batch was accepted but could
    ///   not be fully recorded; the message names the task id
    #[instrument(skip(self, plan, route), fields(space = %plan.space, endpoint = %plan.destination))]
    pub async fn dispatch(
        &self,
        plan: &Plan,
        route: &TransferRoute,
    ) -> Result<DispatchOutcome, SyncError> {
        if plan.stale_files.is_empty() {
            debug!("No stale files, nothing to dispatch");
            return Ok(DispatchOutcome::NothingToDo);
        }
        if route.destination.name != plan.destination {
            return Err(SyncError::ConfigInvalid(format!(
                "route leads to '{}' but the plan is for '{}'",
                route.destination.name, plan.destination
            )));
        }

        let request = TransferRequest {
            source_endpoint_id: route.source.id.clone(),
            destination_endpoint_id: route.destination.id.clone(),
            source_root: route.source_root.clone(),
            destination_root: route.destination_root.clone(),
            pairs: plan
                .stale_files
                .iter()
                .map(|f| TransferPair::mirrored(f.path.clone()))
                .collect(),
        };

        let receipt = self
            .transfer
            .request_batch_transfer(&request)
            .await
            .map_err(request_error)?;
        let task_id = receipt.task_id;
        info!(task_id = %task_id, count = plan.stale_files.len(), "Transfer requested");

        let dispatch = NewDispatch {
            task_id: task_id.clone(),
            endpoint: plan.destination.clone(),
            files: plan.stale_files.clone(),
            requested_at: Utc::now(),
        };

        match with_retry(self.retry, "record_dispatch", || {
            self.store.record_dispatch(&dispatch)
        })
        .await
        {
            Ok(job_id) => {
                info!(job_id = %job_id, task_id = %task_id, "Dispatch recorded");
                Ok(DispatchOutcome::Dispatched(DispatchedJob {
                    job_id,
                    task_id,
                    file_count: dispatch.files.len(),
                }))
            }
            Err(err) => Err(self.register_fallback(&dispatch, err).await),
        }
    }

    /// Records the job row alone after the full dispatch could not be written
    async fn register_fallback(&self, dispatch: &NewDispatch, cause: anyhow::Error) -> SyncError {
        error!(
            task_id = %dispatch.task_id,
            count = dispatch.files.len(),
            error = %format!("{cause:#}"),
            "Transfer accepted but its sync records could not be written"
        );

        match with_retry(self.retry, "register_job", || self.store.register_job(dispatch)).await {
            Ok(job_id) => SyncError::LedgerWriteFailed(format!(
                "task {} was submitted and registered as job {} without its {} sync records: {:#}",
                dispatch.task_id,
                job_id,
                dispatch.files.len(),
                cause
            )),
            Err(second) => {
                error!(
                    task_id = %dispatch.task_id,
                    error = %format!("{second:#}"),
                    "Transfer accepted but could not be recorded at all"
                );
                SyncError::LedgerWriteFailed(format!(
                    "task {} was submitted but could not be recorded: {:#}",
                    dispatch.task_id, second
                ))
            }
        }
    }
}

fn request_error(err: TransferServiceError) -> SyncError {
    match err {
        TransferServiceError::RequestFailed { exit_code, stderr } => {
            SyncError::TransferRequestFailed { exit_code, stderr }
        }
        other => SyncError::TransferRequestFailed {
            exit_code: None,
            stderr: other.to_string(),
        },
    }
}
