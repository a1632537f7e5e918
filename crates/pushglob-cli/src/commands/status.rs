//! Status command - List transfer jobs
//!
//! Shows every job in the ledger with its cached status. `--refresh` polls
//! jobs that have not finished yet and shows the live status and progress
//! next to the cached one; the ledger itself is not changed (use `auto` for
//! that).

use anyhow::Result;
use chrono::Local;
use clap::Args;

use pushglob_core::domain::TransferJob;
use pushglob_core::ports::{ILedgerStore, ITransferService, TaskInfo};

use super::{open_store, transfer_service, CliContext};
use crate::output::plural;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Ask Globus for the current status of unfinished jobs
    #[arg(long)]
    pub refresh: bool,
}

/// A job with its optionally refreshed status
struct JobLine {
    job: TransferJob,
    live: Option<Result<TaskInfo, String>>,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let store = open_store(&config).await?;

        let jobs = store.list_jobs().await?;
        let transfer = transfer_service(&config);

        let mut lines = Vec::with_capacity(jobs.len());
        for job in jobs {
            let live = if self.refresh && !job.status.is_terminal() {
                Some(
                    transfer
                        .poll_task(&job.task_id)
                        .await
                        .map_err(|e| e.to_string()),
                )
            } else {
                None
            };
            lines.push(JobLine { job, live });
        }

        if ctx.is_json() {
            let jobs: Vec<_> = lines
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "job_id": l.job.id.get(),
                        "task_id": l.job.task_id.as_str(),
                        "endpoint": l.job.endpoint.as_str(),
                        "file_count": l.job.file_count,
                        "status": l.job.status.as_str(),
                        "created_at": l.job.created_at.to_rfc3339(),
                        "updated_at": l.job.updated_at.to_rfc3339(),
                        "live_status": l.live.as_ref().map(|r| match r {
                            Ok(info) => serde_json::json!({
                                "status": info.status.as_str(),
                                "files": info.files,
                                "files_transferred": info.files_transferred,
                            }),
                            Err(e) => serde_json::json!({ "error": e }),
                        }),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "jobs": jobs }));
            return Ok(());
        }

        if lines.is_empty() {
            formatter.success("No transfer jobs recorded");
            return Ok(());
        }

        formatter.success(&format!("{} recorded", plural(lines.len(), "transfer job")));
        for line in &lines {
            formatter.info(&describe(line));
        }
        Ok(())
    }
}

fn describe(line: &JobLine) -> String {
    let job = &line.job;
    let mut text = format!(
        "#{:<4} {}  {:<12} {:>9}  {}  {}",
        job.id.to_string(),
        job.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        job.endpoint.as_str(),
        plural(job.file_count as usize, "file"),
        job.task_id,
        job.status
    );
    match &line.live {
        Some(Ok(info)) => {
            if info.status != job.status {
                text.push_str(&format!(" -> {}", info.status));
            }
            if let (Some(done), Some(total)) = (info.files_transferred, info.files) {
                text.push_str(&format!(" [{done}/{total} transferred]"));
            }
        }
        Some(Err(e)) => text.push_str(&format!(" (lookup failed: {e})")),
        None => {}
    }
    text
}
