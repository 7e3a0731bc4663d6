//! Plugin health monitor.
//!
//! A plain state machine: the caller sends the request [`HealthMonitor::begin_check`]
//! returns, then reports either the stats response or the timeout. Each
//! report returns how long to wait before the next check. At most one check
//! is outstanding; reports arriving with no check pending are ignored.

use chrono::{DateTime, Utc};
use omva_bus::payload::{StatsRequest, StatsResponse};
use omva_bus::Outbound;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub retry: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(5),
            retry: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub pending_check: bool,
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    config: HealthConfig,
    status: HealthStatus,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            status: HealthStatus::default(),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    /// True once a check has failed and none has succeeded since.
    pub fn is_degraded(&self) -> bool {
        self.status.last_checked_at.is_some() && !self.status.healthy
    }

    /// Starts a check, returning the stats request to send. Returns `None`
    /// while another check is outstanding.
    pub fn begin_check(&mut self, now: DateTime<Utc>) -> Option<Outbound> {
        if self.status.pending_check {
            return None;
        }
        self.status.pending_check = true;
        Some(Outbound::GetStats(StatsRequest {
            health_check: true,
            timestamp: now.to_rfc3339(),
        }))
    }

    /// Records a stats response. Returns the delay until the next check, or
    /// `None` if no check was pending.
    pub fn on_stats_response(&mut self, stats: &StatsResponse, now: DateTime<Utc>) -> Option<Duration> {
        if !self.status.pending_check {
            return None;
        }
        self.status.pending_check = false;
        if !self.status.healthy {
            tracing::info!(
                plugin_version = ?stats.plugin_version,
                enrolled_users = stats.enrolled_users,
                "voice plugin healthy"
            );
        }
        self.status.healthy = true;
        self.status.last_checked_at = Some(now);
        Some(self.config.interval)
    }

    /// Records a timed-out check. Returns the retry delay, or `None` if the
    /// check was already answered.
    pub fn on_timeout(&mut self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.status.pending_check {
            return None;
        }
        self.status.pending_check = false;
        self.status.healthy = false;
        self.status.last_checked_at = Some(now);
        tracing::warn!(
            retry_secs = self.config.retry.as_secs(),
            "voice plugin did not answer health check"
        );
        Some(self.config.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> StatsResponse {
        StatsResponse {
            plugin_version: Some("1.0.0".to_string()),
            enrolled_users: 2,
            total_processed: 10,
        }
    }

    #[test]
    fn response_marks_healthy_and_schedules_interval() {
        let mut monitor = HealthMonitor::new(HealthConfig::default());
        let request = monitor.begin_check(Utc::now()).unwrap();
        let Outbound::GetStats(req) = request else {
            panic!("expected stats request");
        };
        assert!(req.health_check);
        assert!(monitor.status().pending_check);

        let next = monitor.on_stats_response(&stats(), Utc::now());
        assert_eq!(next, Some(Duration::from_secs(300)));
        assert!(monitor.status().healthy);
        assert!(!monitor.status().pending_check);
        assert!(!monitor.is_degraded());
    }

    #[test]
    fn only_one_check_outstanding() {
        let mut monitor = HealthMonitor::new(HealthConfig::default());
        assert!(monitor.begin_check(Utc::now()).is_some());
        assert!(monitor.begin_check(Utc::now()).is_none());
    }

    #[test]
    fn timeout_marks_unhealthy_and_schedules_retry() {
        let mut monitor = HealthMonitor::new(HealthConfig::default());
        monitor.begin_check(Utc::now());
        assert_eq!(monitor.on_timeout(Utc::now()), Some(Duration::from_secs(60)));
        assert!(!monitor.status().healthy);
        assert!(monitor.is_degraded());
    }

    #[test]
    fn late_response_after_timeout_is_ignored() {
        let mut monitor = HealthMonitor::new(HealthConfig::default());
        monitor.begin_check(Utc::now());
        monitor.on_timeout(Utc::now());
        assert_eq!(monitor.on_stats_response(&stats(), Utc::now()), None);
        assert!(!monitor.status().healthy);
    }

    #[test]
    fn timeout_after_response_is_ignored() {
        let mut monitor = HealthMonitor::new(HealthConfig::default());
        monitor.begin_check(Utc::now());
        monitor.on_stats_response(&stats(), Utc::now());
        assert_eq!(monitor.on_timeout(Utc::now()), None);
        assert!(monitor.status().healthy);
    }

    #[test]
    fn not_degraded_before_first_check() {
        let monitor = HealthMonitor::new(HealthConfig::default());
        assert!(!monitor.is_degraded());
        assert!(!monitor.status().healthy);
    }
}
