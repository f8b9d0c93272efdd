//! Active path selection with hysteresis

use crate::health::PathHealthTracker;
use crate::types::{CommunicationPath, PathStatus};
use serde::Serialize;
use tracing::{info, warn};

/// A switch of the active path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailoverEvent {
    /// Previously active path
    pub from: CommunicationPath,
    /// Newly active path
    pub to: CommunicationPath,
}

/// Owner of the active path
#[derive(Debug, Clone)]
pub struct FailoverController {
    active_path: CommunicationPath,
    recovery_threshold: u32,
}

impl FailoverController {
    /// Create controller; Primary starts active
    pub fn new(recovery_threshold: u32) -> Self {
        Self {
            active_path: CommunicationPath::Primary,
            recovery_threshold,
        }
    }

    /// Currently active path
    pub fn active_path(&self) -> CommunicationPath {
        self.active_path
    }

    /// Re-evaluate the active path against current health.
    ///
    /// Fails over when the active path is Down and the other is not. While on
    /// Fallback, returns to Primary as soon as Primary is Healthy with a full
    /// recovery streak.
    pub fn evaluate(&mut self, health: &PathHealthTracker) -> Option<FailoverEvent> {
        let current = self.active_path;
        let other = current.other();

        if health.status(current) == PathStatus::Down {
            if health.status(other) != PathStatus::Down {
                return self.switch_to(other);
            }
            return None;
        }

        if current == CommunicationPath::Fallback
            && health.status(CommunicationPath::Primary) == PathStatus::Healthy
            && health.consecutive_successes(CommunicationPath::Primary) >= self.recovery_threshold
        {
            info!("PRIMARY path fully recovered, switching back");
            return self.switch_to(CommunicationPath::Primary);
        }

        None
    }

    fn switch_to(&mut self, path: CommunicationPath) -> Option<FailoverEvent> {
        let from = self.active_path;
        if from == path {
            return None;
        }

        warn!("FAILOVER: switching from {} to {}", from, path);
        self.active_path = path;

        Some(FailoverEvent { from, to: path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: CommunicationPath = CommunicationPath::Primary;
    const FALLBACK: CommunicationPath = CommunicationPath::Fallback;

    fn healthy_tracker(failover: u32, recovery: u32) -> PathHealthTracker {
        let mut tracker = PathHealthTracker::new(failover, recovery);
        for _ in 0..recovery {
            tracker.record(PRIMARY, true);
            tracker.record(FALLBACK, true);
        }
        tracker
    }

    #[test]
    fn test_starts_on_primary() {
        let controller = FailoverController::new(5);
        assert_eq!(controller.active_path(), PRIMARY);
    }

    #[test]
    fn test_fails_over_when_active_down() {
        let mut tracker = healthy_tracker(3, 5);
        let mut controller = FailoverController::new(5);

        tracker.record(PRIMARY, false);
        tracker.record(PRIMARY, false);
        assert_eq!(controller.evaluate(&tracker), None);

        tracker.record(PRIMARY, false);
        assert_eq!(
            controller.evaluate(&tracker),
            Some(FailoverEvent { from: PRIMARY, to: FALLBACK })
        );
        assert_eq!(controller.active_path(), FALLBACK);

        // Already switched; nothing further while Primary stays down
        assert_eq!(controller.evaluate(&tracker), None);
    }

    #[test]
    fn test_no_failover_when_both_down() {
        let mut tracker = PathHealthTracker::new(1, 5);
        let mut controller = FailoverController::new(5);
        tracker.record(PRIMARY, false);
        tracker.record(FALLBACK, false);

        assert_eq!(controller.evaluate(&tracker), None);
        assert_eq!(controller.active_path(), PRIMARY);
    }

    #[test]
    fn test_degraded_target_accepted() {
        let mut tracker = PathHealthTracker::new(3, 5);
        let mut controller = FailoverController::new(5);
        tracker.record(FALLBACK, false);
        for _ in 0..3 {
            tracker.record(PRIMARY, false);
        }

        assert_eq!(tracker.status(FALLBACK), PathStatus::Degraded);
        assert!(controller.evaluate(&tracker).is_some());
        assert_eq!(controller.active_path(), FALLBACK);
    }

    #[test]
    fn test_recovers_to_primary() {
        let mut tracker = healthy_tracker(3, 5);
        let mut controller = FailoverController::new(5);
        for _ in 0..3 {
            tracker.record(PRIMARY, false);
        }
        controller.evaluate(&tracker);
        assert_eq!(controller.active_path(), FALLBACK);

        for _ in 0..4 {
            tracker.record(PRIMARY, true);
            assert_eq!(controller.evaluate(&tracker), None);
        }

        tracker.record(PRIMARY, true);
        assert_eq!(
            controller.evaluate(&tracker),
            Some(FailoverEvent { from: FALLBACK, to: PRIMARY })
        );
        assert_eq!(controller.active_path(), PRIMARY);
    }

    #[test]
    fn test_fallback_down_returns_to_non_down_primary() {
        let mut tracker = healthy_tracker(2, 5);
        let mut controller = FailoverController::new(5);
        tracker.record(PRIMARY, false);
        tracker.record(PRIMARY, false);
        controller.evaluate(&tracker);
        assert_eq!(controller.active_path(), FALLBACK);

        // A short success streak keeps Primary Down
        tracker.record(PRIMARY, true);
        tracker.record(FALLBACK, false);
        tracker.record(FALLBACK, false);
        assert_eq!(controller.evaluate(&tracker), None);

        tracker.record(PRIMARY, false);
        assert_eq!(tracker.status(PRIMARY), PathStatus::Degraded);
        assert_eq!(
            controller.evaluate(&tracker),
            Some(FailoverEvent { from: FALLBACK, to: PRIMARY })
        );
    }
}
