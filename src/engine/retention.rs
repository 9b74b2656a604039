use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use crate::state::AppState;

/// Purges location history older than the retention window, forever, on a
/// fixed interval.
pub async fn run_retention_sweeper(state: Arc<AppState>) {
    let every = Duration::from_secs(state.config.retention_sweep_secs.max(1));
    let retention = ChronoDuration::days(state.config.history_retention_days);

    info!(
        retention_days = state.config.history_retention_days,
        interval_secs = every.as_secs(),
        "history retention sweeper started"
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&state, retention);
    }
}

pub fn sweep_once(state: &AppState, retention: ChronoDuration) -> usize {
    let cutoff = Utc::now() - retention;
    let removed = state.locations.purge_history_before(cutoff);
    if removed > 0 {
        info!(removed, cutoff = %cutoff, "location history purged");
    }
    removed
}
