use std::sync::Arc;

use chrono::Local;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::AlarmEngine;

// Set to false to silence this module's periodic chatter.
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Drive periodic alarm evaluation until an alarm triggers or the engine
/// shuts down.
///
/// The first tick is a full interval away; the mount-time and foreground
/// checks arrive through `wake` instead. That spacing matters after a
/// dismissal: an immediate re-check could re-trigger a repeating alarm
/// inside the same one-minute match window.
pub(crate) async fn poll_loop(engine: AlarmEngine, wake: Arc<Notify>, cancel: CancellationToken) {
    let period = engine.poll_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if engine.evaluate_pass(Local::now()).await {
                    log_info!("alarm triggered, poll loop pausing until dismissal");
                    break;
                }
            }
            _ = wake.notified() => {
                log_info!("wake requested, checking alarms now");
                if engine.evaluate_pass(Local::now()).await {
                    log_info!("alarm triggered, poll loop pausing until dismissal");
                    break;
                }
            }
            _ = cancel.cancelled() => {
                log_info!("alarm poll loop shutting down");
                break;
            }
        }
    }
}
