//! Reconcile scheduler - runs reconcile passes on a fixed interval
//!
//! ## Flow
//!
//! ```text
//! interval tick ──→ Reconciler::reconcile_all ──→ on_report callback
//!       ▲                                              │
//!       └──────────────── until cancelled ─────────────┘
//! ```
//!
//! The first pass runs immediately. A pass that fails outright (the open
//! jobs cannot be listed) is logged and the loop keeps going.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::reconciler::{ReconcileReport, Reconciler};

/// Periodically reconciles open transfer jobs
pub struct ReconcileScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Runs until `shutdown` is cancelled, handing every report to `on_report`
    ///
    /// Returns the number of passes that completed. A pass in progress is
    /// allowed to finish before the loop exits.
    pub async fn run<F>(&self, shutdown: CancellationToken, mut on_report: F) -> u64
    where
        F: FnMut(&ReconcileReport),
    {
        info!(interval_secs = self.interval.as_secs(), "Reconcile scheduler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = ticker.tick() => {
                    match self.reconciler.reconcile_all().await {
                        Ok(report) => {
                            passes += 1;
                            on_report(&report);
                        }
                        Err(e) => error!(error = %e, "Reconcile pass failed"),
                    }
                }
            }
        }

        info!(passes, "Reconcile scheduler stopped");
        passes
    }
}
