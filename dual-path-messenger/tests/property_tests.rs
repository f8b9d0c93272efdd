//! Property-based tests for health tracking and failover
//!
//! Tests invariants:
//! - Failure and success streaks are mutually exclusive
//! - Status follows the streaks and thresholds
//! - A failure run on the active path switches exactly once, at the threshold

use dual_path_messenger::{CommunicationPath, FailoverController, PathHealthTracker, PathStatus};
use proptest::prelude::*;

fn path_strategy() -> impl Strategy<Value = CommunicationPath> {
    prop_oneof![
        Just(CommunicationPath::Primary),
        Just(CommunicationPath::Fallback),
    ]
}

fn samples_strategy() -> impl Strategy<Value = Vec<(CommunicationPath, bool)>> {
    prop::collection::vec((path_strategy(), any::<bool>()), 0..200)
}

proptest! {
    /// Property: streaks never overlap, whatever the sample order
    #[test]
    fn prop_streaks_mutually_exclusive(
        failover in 1u32..6,
        recovery in 1u32..8,
        samples in samples_strategy(),
    ) {
        let mut tracker = PathHealthTracker::new(failover, recovery);
        let mut recorded = [0u64; 2];

        for (path, success) in samples {
            tracker.record(path, success);
            recorded[path as usize] += 1;

            for path in [CommunicationPath::Primary, CommunicationPath::Fallback] {
                let metrics = tracker.metrics(path);
                prop_assert!(
                    metrics.consecutive_failures == 0 || metrics.consecutive_successes == 0
                );
                prop_assert_eq!(metrics.total_sent + metrics.total_failed, recorded[path as usize]);
            }
        }
    }

    /// Property: status is determined by the current streak once a threshold is met
    #[test]
    fn prop_status_follows_thresholds(
        failover in 1u32..6,
        recovery in 1u32..8,
        samples in samples_strategy(),
    ) {
        let mut tracker = PathHealthTracker::new(failover, recovery);

        for (path, success) in samples {
            let status = tracker.record(path, success);
            let metrics = tracker.metrics(path);

            if metrics.consecutive_failures >= failover {
                prop_assert_eq!(status, PathStatus::Down);
            } else if metrics.consecutive_failures > 0 {
                prop_assert_eq!(status, PathStatus::Degraded);
            } else if metrics.consecutive_successes >= recovery {
                prop_assert_eq!(status, PathStatus::Healthy);
            }
        }
    }

    /// Property: with a healthy fallback, a failure run on Primary switches
    /// exactly once, on the threshold-crossing sample
    #[test]
    fn prop_single_switch_at_threshold(
        failover in 1u32..6,
        recovery in 1u32..8,
        extra_failures in 0u32..10,
    ) {
        let mut tracker = PathHealthTracker::new(failover, recovery);
        let mut controller = FailoverController::new(recovery);

        for _ in 0..recovery {
            tracker.record(CommunicationPath::Primary, true);
            tracker.record(CommunicationPath::Fallback, true);
        }
        prop_assert!(controller.evaluate(&tracker).is_none());

        let mut switches = Vec::new();
        for failure in 1..=(failover + extra_failures) {
            tracker.record(CommunicationPath::Primary, false);
            if let Some(event) = controller.evaluate(&tracker) {
                switches.push((failure, event));
            }
        }

        prop_assert_eq!(switches.len(), 1);
        let (at, event) = switches[0];
        prop_assert_eq!(at, failover);
        prop_assert_eq!(event.from, CommunicationPath::Primary);
        prop_assert_eq!(event.to, CommunicationPath::Fallback);
        prop_assert_eq!(controller.active_path(), CommunicationPath::Fallback);
    }

    /// Property: after failing over, a full recovery streak on Primary
    /// returns to it, and not a sample earlier
    #[test]
    fn prop_recovery_after_full_streak(
        failover in 1u32..6,
        recovery in 1u32..8,
    ) {
        let mut tracker = PathHealthTracker::new(failover, recovery);
        let mut controller = FailoverController::new(recovery);

        for _ in 0..recovery {
            tracker.record(CommunicationPath::Fallback, true);
        }
        for _ in 0..failover {
            tracker.record(CommunicationPath::Primary, false);
        }
        controller.evaluate(&tracker);
        prop_assert_eq!(controller.active_path(), CommunicationPath::Fallback);

        for success in 1..=recovery {
            tracker.record(CommunicationPath::Primary, true);
            let event = controller.evaluate(&tracker);
            if success < recovery {
                prop_assert!(event.is_none());
            } else {
                prop_assert!(event.is_some());
            }
        }
        prop_assert_eq!(controller.active_path(), CommunicationPath::Primary);
    }
}
