//! Sync command - Push stale files of a space to an endpoint
//!
//! Provides the `pushglob sync` CLI command which:
//! 1. Resolves the space and subtree from `--space`, `SOURCE_PATH` or the
//!    current directory
//! 2. Rescans the subtree and classifies the space against the destination
//! 3. Submits one batched transfer for the stale files (unless `--dry-run`)

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::info;

use pushglob_core::config::Config;
use pushglob_core::domain::{EndpointName, Plan, RelativePath, SpaceName};
use pushglob_sync::dispatcher::{DispatchOutcome, JobDispatcher, TransferRoute};
use pushglob_sync::planner::SyncPlanner;
use pushglob_sync::walker::WalkdirWalker;

use super::{open_store, transfer_service, CliContext};
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Destination endpoint name
    pub destination: String,

    /// Directory to sync [default: the space root with --space, otherwise
    /// the current directory]
    pub source_path: Option<PathBuf>,

    /// Space to sync
    #[arg(short, long)]
    pub space: Option<String>,

    /// Only count and transfer files under the source path
    #[arg(long)]
    pub subtree_only: bool,

    /// Show the plan without submitting a transfer
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let (space, subtree) = resolve_target(
            &config,
            self.space.as_deref(),
            self.source_path.as_deref(),
            &cwd,
        )?;
        let destination = EndpointName::new(self.destination.as_str())?;
        // Resolve the route first so a bad endpoint fails before scanning
        let route = TransferRoute::from_config(&config, &space, &destination)?;

        info!(space = %space, subtree = %subtree, endpoint = %destination, "Planning sync");
        formatter.info(&format!(
            "Scanning space '{space}' at '{subtree}' for endpoint '{destination}' ..."
        ));

        let store = open_store(&config).await?;
        let planner =
            SyncPlanner::from_config(store.clone(), Arc::new(WalkdirWalker::new()), &config);
        let mut plan = planner.plan(&space, &subtree, &destination).await?;
        if self.subtree_only {
            plan = plan.restrict_to_subtree();
        }

        report_plan(&plan, &*formatter);

        let mut job = None;
        if self.dry_run {
            if plan.needs_transfer() {
                formatter.success(&format!(
                    "Dry run: would transfer {}",
                    plural(plan.counts.stale, "file")
                ));
            } else {
                formatter.success("Dry run: nothing to transfer");
            }
        } else {
            let dispatcher = JobDispatcher::new(store, transfer_service(&config));
            match dispatcher.dispatch(&plan, &route).await? {
                DispatchOutcome::Dispatched(dispatched) => {
                    formatter.success(&format!(
                        "Submitted task {} (job {}) for {}",
                        dispatched.task_id,
                        dispatched.job_id,
                        plural(dispatched.file_count, "file")
                    ));
                    job = Some(dispatched);
                }
                DispatchOutcome::NothingToDo => {
                    formatter.success(&format!(
                        "No new sync job; {} ok and {} pending",
                        plural(plan.counts.ok, "file"),
                        plan.counts.pending
                    ));
                }
            }
        }

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "space": plan.space.as_str(),
                "subtree": plan.subtree.to_string(),
                "destination": plan.destination.as_str(),
                "counts": {
                    "ok": plan.counts.ok,
                    "pending": plan.counts.pending,
                    "stale": plan.counts.stale,
                },
                "stale_files": plan
                    .stale_files
                    .iter()
                    .map(|f| f.path.as_str())
                    .collect::<Vec<_>>(),
                "dry_run": self.dry_run,
                "job": job.map(|j| serde_json::json!({
                    "job_id": j.job_id.get(),
                    "task_id": j.task_id.as_str(),
                    "file_count": j.file_count,
                })),
            }));
        }

        Ok(())
    }
}

fn report_plan(plan: &Plan, formatter: &dyn OutputFormatter) {
    formatter.info(&format!(
        "ok: {}  pending: {}  stale: {}",
        plan.counts.ok, plan.counts.pending, plan.counts.stale
    ));
    if plan.counts.pending > 0 {
        formatter.warn(&format!(
            "{} already pending in an open transfer",
            plural(plan.counts.pending, "file")
        ));
    }
    for file in &plan.stale_files {
        formatter.info(&format!("  stale: {}", file.path));
    }
}

/// Works out which space and subtree a sync applies to
///
/// - `--space` alone: the whole space
/// - `--space` and a path: the path, which must lie under that space
/// - a path alone, or nothing (the current directory): the configured space
///   whose local root contains it
fn resolve_target(
    config: &Config,
    space: Option<&str>,
    source: Option<&Path>,
    cwd: &Path,
) -> Result<(SpaceName, RelativePath)> {
    let source = source.map(|p| normalize_path(&cwd.join(p)));

    if let Some(name) = space {
        let space = SpaceName::new(name)?;
        let root = config
            .space(&space)
            .and_then(|s| s.local_root(&config.local_endpoint))
            .ok_or_else(|| anyhow!("Space '{space}' has no local root configured"))?;

        let subtree = match source {
            None => RelativePath::root(),
            Some(path) => {
                let rest = path.strip_prefix(&root).map_err(|_| {
                    anyhow!(
                        "{} is not inside space '{space}' ({})",
                        path.display(),
                        root.display()
                    )
                })?;
                RelativePath::from_path(rest)?
            }
        };
        return Ok((space, subtree));
    }

    let path = source.unwrap_or_else(|| normalize_path(cwd));
    config.space_for_path(&path).ok_or_else(|| {
        anyhow!(
            "The source directory {} does not appear to be in a syncable space",
            path.display()
        )
    })
}

/// Lexically resolves `.` and `..` components, without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => normalized.push(p.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(c) => normalized.push(c),
        }
    }
    normalized
}
