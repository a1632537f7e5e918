//! Globus JSON documents
//!
//! Only the fields pushglob reads are modelled; everything else in the
//! documents is ignored.

use serde::Deserialize;

use pushglob_core::domain::{JobStatus, TaskId};
use pushglob_core::ports::{EndpointListing, TaskInfo};

use crate::GlobusError;

/// Output of `globus -F json transfer`
#[derive(Debug, Deserialize)]
struct SubmitResult {
    task_id: String,
}

/// Output of `globus api transfer GET /task/{id}`
#[derive(Debug, Deserialize)]
struct TaskDocument {
    task_id: Option<String>,
    status: String,
    files: Option<u64>,
    files_transferred: Option<u64>,
}

/// Output of `globus ls -F json`
#[derive(Debug, Deserialize)]
struct ListingDocument {
    #[serde(rename = "DATA")]
    data: Vec<serde_json::Value>,
}

/// Extracts the task id of an accepted submission
pub fn parse_submit(json: &str) -> Result<TaskId, GlobusError> {
    let doc: SubmitResult = serde_json::from_str(json)?;
    TaskId::new(doc.task_id).map_err(|e| GlobusError::InvalidResponse(e.to_string()))
}

/// Parses a task document; `requested` is used when the document omits its id
pub fn parse_task(json: &str, requested: &TaskId) -> Result<TaskInfo, GlobusError> {
    let doc: TaskDocument = serde_json::from_str(json)?;
    let task_id = match doc.task_id {
        Some(id) => TaskId::new(id).map_err(|e| GlobusError::InvalidResponse(e.to_string()))?,
        None => requested.clone(),
    };
    Ok(TaskInfo {
        task_id,
        status: JobStatus::from_external(&doc.status),
        files: doc.files,
        files_transferred: doc.files_transferred,
    })
}

/// Counts the entries of a directory listing
pub fn parse_listing(json: &str) -> Result<EndpointListing, GlobusError> {
    let doc: ListingDocument = serde_json::from_str(json)?;
    Ok(EndpointListing {
        file_count: doc.data.len(),
    })
}
