//! Per-path health tracking
//!
//! Each path keeps mutually exclusive consecutive counters: a success clears
//! the failure streak and a failure clears the success streak. Status is
//! derived from those streaks:
//!
//! - `consecutive_failures >= failover_threshold` → `Down`
//! - `0 < consecutive_failures < failover_threshold` → `Degraded`
//! - `consecutive_successes >= recovery_threshold` → `Healthy`
//!
//! A success streak below the recovery threshold leaves the status where it
//! was, so a path that went down has to prove itself before it is healthy.

use crate::types::{CommunicationPath, PathStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Health metrics for one communication path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathHealthMetrics {
    /// Path these metrics describe
    pub path: CommunicationPath,
    /// Derived status
    pub status: PathStatus,
    /// Last successful send or probe
    pub last_success_time: Option<DateTime<Utc>>,
    /// Last failed send or probe
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Current failure streak
    pub consecutive_failures: u32,
    /// Current success streak
    pub consecutive_successes: u32,
    /// Successful samples
    pub total_sent: u64,
    /// Failed samples
    pub total_failed: u64,
}

impl PathHealthMetrics {
    /// Fresh metrics; a path starts `Down` until it reaches the recovery threshold
    pub fn new(path: CommunicationPath) -> Self {
        Self {
            path,
            status: PathStatus::Down,
            last_success_time: None,
            last_failure_time: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_sent: 0,
            total_failed: 0,
        }
    }
}

/// Success/failure bookkeeping for both paths
#[derive(Debug, Clone)]
pub struct PathHealthTracker {
    primary: PathHealthMetrics,
    fallback: PathHealthMetrics,
    failover_threshold: u32,
    recovery_threshold: u32,
}

impl PathHealthTracker {
    /// Create new tracker
    pub fn new(failover_threshold: u32, recovery_threshold: u32) -> Self {
        Self {
            primary: PathHealthMetrics::new(CommunicationPath::Primary),
            fallback: PathHealthMetrics::new(CommunicationPath::Fallback),
            failover_threshold,
            recovery_threshold,
        }
    }

    /// Record one sample for `path` and return the resulting status
    pub fn record(&mut self, path: CommunicationPath, success: bool) -> PathStatus {
        let failover_threshold = self.failover_threshold;
        let recovery_threshold = self.recovery_threshold;
        let metrics = self.metrics_mut(path);
        let now = Utc::now();

        if success {
            metrics.consecutive_successes = metrics.consecutive_successes.saturating_add(1);
            metrics.consecutive_failures = 0;
            metrics.last_success_time = Some(now);
            metrics.total_sent += 1;

            if metrics.consecutive_successes >= recovery_threshold
                && metrics.status != PathStatus::Healthy
            {
                metrics.status = PathStatus::Healthy;
                info!("{} path recovered to HEALTHY", path);
            }
        } else {
            metrics.consecutive_failures = metrics.consecutive_failures.saturating_add(1);
            metrics.consecutive_successes = 0;
            metrics.last_failure_time = Some(now);
            metrics.total_failed += 1;

            if metrics.consecutive_failures >= failover_threshold {
                if metrics.status != PathStatus::Down {
                    metrics.status = PathStatus::Down;
                    warn!(
                        "{} path marked as DOWN after {} consecutive failures",
                        path, metrics.consecutive_failures
                    );
                }
            } else {
                metrics.status = PathStatus::Degraded;
            }
        }

        metrics.status
    }

    /// Current status of `path`
    pub fn status(&self, path: CommunicationPath) -> PathStatus {
        self.metrics(path).status
    }

    /// Current success streak of `path`
    pub fn consecutive_successes(&self, path: CommunicationPath) -> u32 {
        self.metrics(path).consecutive_successes
    }

    /// Metrics for `path`
    pub fn metrics(&self, path: CommunicationPath) -> &PathHealthMetrics {
        match path {
            CommunicationPath::Primary => &self.primary,
            CommunicationPath::Fallback => &self.fallback,
        }
    }

    fn metrics_mut(&mut self, path: CommunicationPath) -> &mut PathHealthMetrics {
        match path {
            CommunicationPath::Primary => &mut self.primary,
            CommunicationPath::Fallback => &mut self.fallback,
        }
    }
}
