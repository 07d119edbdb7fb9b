use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::context::Deadline;
use crate::engine::tracker::LocationTracker;

/// Periodically purges position reports older than the retention window.
/// A failed sweep is logged and retried on the next tick.
pub async fn run_retention_sweeper(
    tracker: Arc<LocationTracker>,
    every: Duration,
    sweep_timeout: Duration,
) {
    info!(
        interval_secs = every.as_secs(),
        timeout_secs = sweep_timeout.as_secs(),
        "retention sweeper started"
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let cutoff = tracker.retention_cutoff(Utc::now());
        match tracker.cleanup(cutoff, Deadline::after(sweep_timeout)).await {
            Ok(deleted) => info!(deleted, cutoff = %cutoff, "retention sweep finished"),
            Err(err) => error!(error = %err, cutoff = %cutoff, "retention sweep failed"),
        }
    }
}
