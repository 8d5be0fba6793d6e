use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::orchestrator::{Orchestrator, RunOutcome, RunRequest, TriggerSource};

/// Spawn a periodic run loop. The first tick fires immediately.
pub fn spawn_scheduler(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    request: RunRequest,
) -> JoinHandle<()> {
    let request = RunRequest {
        source: TriggerSource::Scheduler,
        ..request
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_secs = period.as_secs(), "Scheduler started");

        loop {
            ticker.tick().await;
            match orchestrator.trigger(request.clone()).await {
                Ok(RunOutcome::Completed(summary)) => {
                    info!(
                        run_id = %summary.run_id,
                        posters = summary.total_posters,
                        "Scheduled run finished"
                    );
                }
                Ok(RunOutcome::Skipped) => warn!("Scheduled run skipped, previous run still active"),
                Ok(RunOutcome::Failed { run_id, error }) => {
                    error!(run_id = %run_id, error = %error, "Scheduled run failed");
                }
                Err(e) => error!(error = %e, "Scheduled run rejected"),
            }
        }
    })
}
