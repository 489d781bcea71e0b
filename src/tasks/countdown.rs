//! Per-timer countdown task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::{AppState, TickOutcome};

/// Tick timer `index` once per `period` until it expires or the
/// registration `ticker_id` is cancelled
pub async fn countdown_task(state: Arc<AppState>, index: usize, ticker_id: u64, period: Duration) {
    debug!("Countdown task {} started for timer {}", ticker_id, index);

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match state.tick(index, ticker_id) {
            Ok(TickOutcome::Ticked { seconds_left }) => {
                debug!("Timer {}: {}s left", index, seconds_left);
            }
            Ok(TickOutcome::Expired) => {
                info!("Timer {} countdown finished", index);
                break;
            }
            Ok(TickOutcome::Stale) => {
                debug!("Countdown task {} for timer {} cancelled", ticker_id, index);
                break;
            }
            Err(e) => {
                error!("Countdown task {} for timer {} failed: {}", ticker_id, index, e);
                break;
            }
        }
    }
}
