//! Periodic usage report worker.
//!
//! Each cycle fetches usage from the monitor API, records it, reads the
//! latest snapshot back and sends it to the configured chat. A failed cycle
//! is logged and skipped; the next one runs after the usual interval.

use std::{sync::Arc, time::Instant};

use tokio_util::sync::CancellationToken;

use crate::{
    config::SchedulerConfig,
    notify::Notifier,
    services::{CycleOutcome, UsageReportService},
};

/// Starts the periodic report worker.
///
/// Runs the first cycle immediately, then waits `interval_secs` after each
/// cycle finishes. Returns once `cancel` fires.
pub async fn start_usage_report_worker(
    service: Arc<UsageReportService>,
    notifier: Arc<dyn Notifier>,
    chat_id: String,
    config: SchedulerConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Usage report worker disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.interval_secs,
        chat_id = %chat_id,
        "Starting usage report worker"
    );

    let interval = config.interval();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = run_cycle(&service, notifier.as_ref(), &chat_id) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!("Usage report worker stopped");
}

/// Run a single cycle and log how it went. Returns whether a report was sent.
pub async fn run_cycle(service: &UsageReportService, notifier: &dyn Notifier, chat_id: &str) -> bool {
    let start = Instant::now();

    match service.collect_and_report(notifier, chat_id).await {
        Ok(CycleOutcome::Sent { snapshot }) => {
            tracing::info!(
                model_usage_id = snapshot.model_usage_id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Usage report sent"
            );
            true
        }
        Ok(CycleOutcome::NoData) => {
            tracing::info!("No usage data available, skipping report");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Usage report cycle failed");
            false
        }
    }
}
