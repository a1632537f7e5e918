//! [`ITransferService`] backed by the `globus` client
//!
//! | Operation                | Command                                      |
//! |--------------------------|----------------------------------------------|
//! | `request_batch_transfer` | `globus -F json transfer --batch - SRC: DST:` |
//! | `poll_task`              | `globus api transfer GET /task/{id}`         |
//! | `list_endpoint_root`     | `globus ls {id}: -F json`                    |

use tracing::{debug, info, instrument, warn};

use pushglob_core::domain::TaskId;
use pushglob_core::ports::{
    EndpointListing, ITransferService, TaskInfo, TaskReceipt, TransferRequest,
    TransferServiceError,
};

use crate::cli::GlobusCli;
use crate::response;

/// Transfer service that shells out to the Globus CLI
#[derive(Debug, Clone)]
pub struct GlobusTransferService {
    cli: GlobusCli,
}

impl GlobusTransferService {
    pub fn new(cli: GlobusCli) -> Self {
        Self { cli }
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

#[async_trait::async_trait]
impl ITransferService for GlobusTransferService {
    #[instrument(skip(self, request), fields(count = request.pairs.len()))]
    async fn request_batch_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TaskReceipt, TransferServiceError> {
        let source = format!("{}:", request.source_endpoint_id);
        let destination = format!("{}:", request.destination_endpoint_id);
        let argv = args([
            "-F",
            "json",
            "transfer",
            "--batch",
            "-",
            source.as_str(),
            destination.as_str(),
        ]);
        let batch = request.batch_input();

        let output = self
            .cli
            .run(&argv, Some(&batch))
            .await
            .map_err(|e| TransferServiceError::RequestFailed {
                exit_code: None,
                stderr: e.to_string(),
            })?;

        if !output.success() {
            warn!(exit_code = ?output.exit_code, stderr = %output.stderr, "Transfer submission rejected");
            return Err(TransferServiceError::RequestFailed {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        let task_id = response::parse_submit(&output.stdout)
            .map_err(|e| TransferServiceError::InvalidResponse(e.to_string()))?;
        info!(task_id = %task_id, "Transfer submitted");
        Ok(TaskReceipt { task_id })
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn poll_task(&self, task_id: &TaskId) -> Result<TaskInfo, TransferServiceError> {
        let path = format!("/task/{task_id}");
        let lookup_failed = |reason: String| TransferServiceError::LookupFailed {
            task_id: task_id.to_string(),
            reason,
        };

        let output = self
            .cli
            .run(&args(["api", "transfer", "GET", path.as_str()]), None)
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        if !output.success() {
            return Err(lookup_failed(format!(
                "exit code {:?}: {}",
                output.exit_code, output.stderr
            )));
        }

        let info = response::parse_task(&output.stdout, task_id)
            .map_err(|e| TransferServiceError::InvalidResponse(e.to_string()))?;
        debug!(status = %info.status, "Task polled");
        Ok(info)
    }

    #[instrument(skip(self))]
    async fn list_endpoint_root(
        &self,
        endpoint_id: &str,
    ) -> Result<EndpointListing, TransferServiceError> {
        let target = format!("{endpoint_id}:");
        let list_failed = |reason: String| TransferServiceError::ListFailed {
            endpoint_id: endpoint_id.to_string(),
            reason,
        };

        let output = self
            .cli
            .run(&args(["ls", target.as_str(), "-F", "json"]), None)
            .await
            .map_err(|e| list_failed(e.to_string()))?;

        if !output.success() {
            return Err(list_failed(output.stderr));
        }

        response::parse_listing(&output.stdout)
            .map_err(|e| TransferServiceError::InvalidResponse(e.to_string()))
    }
}
