//! Cron-driven cycle trigger.
//!
//! One eager cycle at start, then one per schedule fire. Each fire runs on its
//! own task so a slow cycle shows up as a skipped tick instead of a late one.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::AppState;

/// Parse a cron expression. Five fields (minute precision) get a leading
/// seconds field of `0`; six or seven fields are passed through.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        6 | 7 => expr.to_string(),
        n => bail!("SCHEDULE_INVALID: '{expr}' has {n} fields; expected 5, 6 or 7"),
    };
    Schedule::from_str(&normalized).with_context(|| format!("SCHEDULE_INVALID: '{expr}'"))
}

/// First fire strictly after `after`.
pub fn next_fire(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Fire after `previous`, or after `now` if the clock has already moved past
/// later fires. Never returns `previous` again.
pub fn following_fire(
    schedule: &Schedule,
    previous: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    next_fire(schedule, previous.max(now))
}

/// Run the eager cycle and then follow `schedule` until the task is aborted.
pub fn spawn_scheduler(state: Arc<AppState>, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        spawn_cycle(Arc::clone(&state));

        let mut next = next_fire(&schedule, Utc::now());
        while let Some(fire) = next {
            let wait = (fire - Utc::now()).to_std().unwrap_or_default();
            debug!(next = %fire, wait_ms = wait.as_millis() as u64, "next cycle scheduled");
            tokio::time::sleep(wait).await;
            spawn_cycle(Arc::clone(&state));
            next = following_fire(&schedule, fire, Utc::now());
        }
        info!("schedule has no further fire times; scheduler stopping");
    })
}

fn spawn_cycle(state: Arc<AppState>) {
    tokio::spawn(async move {
        // Outcome is recorded and logged by AppState::run_cycle.
        let _ = state.run_cycle().await;
    });
}
