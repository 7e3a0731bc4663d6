//! Background tasks for the skill.
//!
//! Includes:
//! - Periodic health checks of the voice identification plugin.

use crate::lock_health;
use chrono::Utc;
use omva_bus::{Inbound, MessageBus, Outbound};
use omva_dialog::HealthMonitor;
use omva_types::events;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Starts the plugin health check task.
///
/// The first check is sent immediately. One timer drives the cycle: it
/// fires either for the next check or for the pending check's timeout, and
/// a stats response re-arms it for the next regular check. The task ends
/// when the bus subscription closes.
pub async fn run_health_monitor<B: MessageBus>(bus: Arc<B>, monitor: Arc<Mutex<HealthMonitor>>) {
    let mut responses = bus.subscribe(&[events::STATS_RESPONSE]);
    let config = *lock_health(&monitor).config();
    tracing::info!(
        interval_secs = config.interval.as_secs(),
        timeout_secs = config.timeout.as_secs(),
        retry_secs = config.retry.as_secs(),
        "starting plugin health monitor"
    );

    let wake = sleep(Duration::ZERO);
    tokio::pin!(wake);

    loop {
        tokio::select! {
            () = &mut wake => {
                let (request, delay) = on_wake(&monitor);
                if let Some(request) = request {
                    if let Err(e) = bus.emit_outbound(&request) {
                        tracing::warn!(error = %e, "failed to send health check");
                    }
                }
                wake.as_mut().reset(Instant::now() + delay);
            }
            message = responses.recv() => {
                let Some(message) = message else {
                    tracing::warn!("bus closed, stopping health monitor");
                    return;
                };
                let stats = match Inbound::decode(&message) {
                    Ok(Inbound::StatsResponse(stats)) => stats,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed stats response");
                        continue;
                    }
                };
                let next = lock_health(&monitor).on_stats_response(&stats, Utc::now());
                match next {
                    Some(delay) => wake.as_mut().reset(Instant::now() + delay),
                    None => tracing::debug!("ignoring stats response with no check pending"),
                }
            }
        }
    }
}

/// Times out a pending check, or starts a new one. Returns the request to
/// send, if any, and how long to sleep.
fn on_wake(monitor: &Mutex<HealthMonitor>) -> (Option<Outbound>, Duration) {
    let mut monitor = lock_health(monitor);
    let now = Utc::now();
    if monitor.status().pending_check {
        let retry = monitor.config().retry;
        return (None, monitor.on_timeout(now).unwrap_or(retry));
    }
    let timeout = monitor.config().timeout;
    (monitor.begin_check(now), timeout)
}
