use std::sync::Arc;
use std::time::Duration;

use prov_ledger::CancellationToken;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::coordinator::AnchorCoordinator;
use crate::error::{AnchorError, AnchorResult};

/// Counts from one scheduler run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerSummary {
    pub runs: u32,
    pub succeeded: u32,
    pub dry_runs: u32,
    /// Cycles whose ledger submission failed or that errored before submitting.
    pub failed: u32,
    pub cancelled: bool,
}

/// Runs anchoring cycles on a fixed interval.
///
/// A failing cycle is logged and the next one still runs. Cancellation stops
/// the scheduler between cycles and aborts a cycle's pending retry wait.
#[derive(Debug)]
pub struct AnchorScheduler {
    coordinator: Arc<AnchorCoordinator>,
    interval: Duration,
    max_runs: Option<u32>,
}

impl AnchorScheduler {
    pub fn new(
        coordinator: Arc<AnchorCoordinator>,
        interval: Duration,
        max_runs: Option<u32>,
    ) -> AnchorResult<Self> {
        if interval.is_zero() {
            return Err(AnchorError::Config("scheduler interval must be non-zero".into()));
        }
        Ok(Self {
            coordinator,
            interval,
            max_runs,
        })
    }

    /// Run until `max_runs` cycles have completed or `cancel` fires.
    ///
    /// The first cycle runs immediately; later cycles start `interval` after
    /// the previous one finished.
    pub async fn run(&self, cancel: CancellationToken) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();
        info!(
            interval_ms = self.interval.as_millis() as u64,
            max_runs = ?self.max_runs,
            "anchor scheduler started"
        );

        loop {
            if self.max_runs.is_some_and(|max| summary.runs >= max) {
                break;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            summary.runs += 1;
            match self.coordinator.run_cycle(&cancel).await {
                Ok(report) if report.result.is_success() => summary.succeeded += 1,
                Ok(report) if report.result.is_dry_run() => summary.dry_runs += 1,
                Ok(report) => {
                    summary.failed += 1;
                    warn!(run = summary.runs, result = %report.result, "anchor cycle failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(run = summary.runs, error = %e, "anchor cycle errored");
                }
            }

            if self.max_runs.is_some_and(|max| summary.runs >= max) {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            runs = summary.runs,
            succeeded = summary.succeeded,
            dry_runs = summary.dry_runs,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "anchor scheduler stopped"
        );
        summary
    }
}
