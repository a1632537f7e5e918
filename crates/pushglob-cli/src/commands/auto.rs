//! Auto command - Reconcile open transfer jobs
//!
//! One pass by default. With `--watch`, passes repeat on an interval until
//! Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pushglob_sync::reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
use pushglob_sync::scheduler::ReconcileScheduler;

use super::{open_store, transfer_service, CliContext};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct AutoCommand {
    /// Keep reconciling until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Seconds between passes with --watch [default: reconcile.interval_secs]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

impl AutoCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;

        let store = open_store(&config).await?;
        let reconciler = Arc::new(Reconciler::new(store, transfer_service(&config)));

        if !self.watch {
            formatter.info("Querying globus transfer jobs status ...");
            let report = reconciler.reconcile_all().await?;
            show_report(&report, ctx.is_json(), &*formatter);
            return Ok(());
        }

        let interval =
            Duration::from_secs(self.interval.unwrap_or(config.reconcile.interval_secs));
        formatter.info(&format!(
            "Reconciling every {}s, press Ctrl+C to stop",
            interval.as_secs()
        ));

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        let scheduler = ReconcileScheduler::new(reconciler, interval);
        let passes = scheduler
            .run(shutdown, |report| {
                show_report(report, ctx.is_json(), &*formatter)
            })
            .await;

        formatter.success(&format!("Stopped after {}", plural(passes as usize, "pass")));
        Ok(())
    }
}

/// Cancels `token` on SIGINT or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}

fn show_report(report: &ReconcileReport, json: bool, formatter: &dyn OutputFormatter) {
    if json {
        let jobs: Vec<_> = report
            .jobs
            .iter()
            .map(|j| {
                let (outcome, detail) = match &j.outcome {
                    ReconcileOutcome::Confirmed { records } => ("confirmed", records.to_string()),
                    ReconcileOutcome::Discarded { records } => ("discarded", records.to_string()),
                    ReconcileOutcome::StillOpen { status } => ("open", status.to_string()),
                    ReconcileOutcome::Failed { error } => ("error", error.to_string()),
                };
                serde_json::json!({
                    "job_id": j.job_id.get(),
                    "task_id": j.task_id.as_str(),
                    "open_records": j.open_records,
                    "outcome": outcome,
                    "detail": detail,
                })
            })
            .collect();
        formatter.print_json(&serde_json::json!({
            "confirmed": report.confirmed(),
            "discarded": report.discarded(),
            "still_open": report.still_open(),
            "failed": report.failures().count(),
            "jobs": jobs,
        }));
        return;
    }

    if report.is_empty() {
        formatter.success("No open transfer jobs");
        return;
    }

    for j in &report.jobs {
        match &j.outcome {
            ReconcileOutcome::Confirmed { records } => formatter.info(&format!(
                "{}: SUCCEEDED, {} confirmed",
                j.task_id,
                plural(*records, "file")
            )),
            ReconcileOutcome::Discarded { records } => formatter.warn(&format!(
                "{}: FAILED, {} will be retried on the next sync",
                j.task_id,
                plural(*records, "file")
            )),
            ReconcileOutcome::StillOpen { status } => formatter.info(&format!(
                "{}: {} ({} pending)",
                j.task_id,
                status,
                plural(j.open_records, "file")
            )),
            ReconcileOutcome::Failed { error } => {
                formatter.error(&format!("{}: {}", j.task_id, error))
            }
        }
    }
    formatter.success(&format!(
        "{} confirmed, {} failed, {} still open",
        plural(report.confirmed(), "job"),
        report.discarded(),
        report.still_open()
    ));
}
