//! Background task that advances the world on a wall-clock frame timer.

use crate::api::{AppState, Clock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, trace};

/// Simulated time covered by one frame. Paused clocks yield zero.
pub fn frame_delta(clock: Clock, frame_millis: u64) -> f32 {
    if clock.paused {
        return 0.0;
    }
    frame_millis as f32 / 1000.0 * clock.time_scale
}

pub async fn run_tick_loop(state: AppState, frame_millis: u64) {
    let mut interval = interval(Duration::from_millis(frame_millis.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let delta = frame_delta(*state.clock.read(), frame_millis);
        if delta <= 0.0 {
            continue;
        }

        let report = state.world.write().tick(delta);
        if !report.births.is_empty() || !report.deaths.is_empty() {
            trace!(
                tick = report.tick,
                births = report.births.len(),
                deaths = report.deaths.len(),
                meals = report.predations.len(),
                removed = report.removed.len(),
                "Frame advanced"
            );
        }
        if report.tick % 1000 == 0 {
            debug!(tick = report.tick, "Tick loop alive");
        }
    }
}
