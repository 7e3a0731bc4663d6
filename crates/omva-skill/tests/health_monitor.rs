//! Tests for the background plugin health monitor, on paused time.

use omva_bus::{BusMessage, MemoryBus};
use omva_dialog::{HealthConfig, HealthMonitor};
use omva_skill::{background::run_health_monitor, lock_health};
use omva_types::events;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn stats_response() -> BusMessage {
    BusMessage::new(
        events::STATS_RESPONSE,
        json!({"plugin_version": "0.3.1", "enrolled_users": 2, "total_processed": 40}),
    )
}

/// Lets the monitor task run without reaching any of its timers.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn start() -> (MemoryBus, Arc<Mutex<HealthMonitor>>) {
    let bus = MemoryBus::new();
    let monitor = Arc::new(Mutex::new(HealthMonitor::new(HealthConfig::default())));
    tokio::spawn(run_health_monitor(Arc::new(bus.clone()), monitor.clone()));
    (bus, monitor)
}

#[tokio::test(start_paused = true)]
async fn check_cycle_with_timeout_and_retry() {
    let (bus, monitor) = start();

    // First check goes out immediately.
    settle().await;
    let checks = bus.emitted_named(events::GET_STATS);
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].data["health_check"], true);
    assert!(lock_health(&monitor).status().pending_check);

    bus.inject(stats_response());
    settle().await;
    {
        let monitor = lock_health(&monitor);
        assert!(monitor.status().healthy);
        assert!(!monitor.status().pending_check);
    }

    // The answered check's timeout never fires; the next check comes after
    // the regular interval.
    tokio::time::sleep(Duration::from_secs(290)).await;
    assert_eq!(bus.emitted_named(events::GET_STATS).len(), 1);
    assert!(lock_health(&monitor).status().healthy);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(bus.emitted_named(events::GET_STATS).len(), 2);

    // No answer: the check times out.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(lock_health(&monitor).is_degraded());
    assert!(!lock_health(&monitor).status().pending_check);

    // A late answer is ignored.
    bus.inject(stats_response());
    settle().await;
    assert!(!lock_health(&monitor).status().healthy);

    // Retry follows after the short delay, not the regular interval.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(bus.emitted_named(events::GET_STATS).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn recovery_after_failed_check() {
    let (bus, monitor) = start();
    settle().await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(lock_health(&monitor).is_degraded());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(bus.emitted_named(events::GET_STATS).len(), 2);
    bus.inject(stats_response());
    settle().await;
    assert!(lock_health(&monitor).status().healthy);
    assert!(!lock_health(&monitor).is_degraded());
}
