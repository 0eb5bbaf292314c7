//! Reconnection backoff policy.
//!
//! When the connection drops, each consecutive failed attempt widens the
//! wait before the next one by a fixed step up to a ceiling; the first
//! success snaps the wait back to the minimum.

use std::time::Duration;

/// Wait intervals between reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Wait before the first retry.
    pub min: Duration,
    /// Added per further consecutive failure.
    pub step: Duration,
    /// Ceiling on the wait.
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_micros(1_000),
            step: Duration::from_micros(500_000),
            max: Duration::from_micros(60_000_000), // one minute
        }
    }
}

impl ReconnectPolicy {
    /// Wait before the next attempt after `consecutive_failures`.
    pub fn wait_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let wait = self.min + self.step * (consecutive_failures - 1);
        wait.min(self.max)
    }
}

/// Running failure count the policy is applied to.
#[derive(Debug, Default)]
pub struct ReconnectState {
    consecutive_failures: u32,
}

impl ReconnectState {
    /// Creates a fresh state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of consecutive failed attempts.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Records a failed attempt.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Records a successful attempt.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_sequence_from_fresh_state() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.wait_for(1), Duration::from_micros(1_000));
        assert_eq!(policy.wait_for(2), Duration::from_micros(501_000));
        assert_eq!(policy.wait_for(3), Duration::from_micros(1_001_000));
    }

    #[test]
    fn wait_is_zero_without_failures() {
        assert_eq!(ReconnectPolicy::default().wait_for(0), Duration::ZERO);
    }

    #[test]
    fn wait_is_capped_at_the_maximum() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.wait_for(1_000), policy.max);
        assert_eq!(policy.wait_for(u32::MAX), policy.max);
    }

    #[test]
    fn state_counts_failures_and_resets() {
        let mut state = ReconnectState::new();
        assert_eq!(state.consecutive_failures(), 0);

        state.record_failure();
        state.record_failure();
        assert_eq!(state.consecutive_failures(), 2);

        state.record_success();
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn state_and_policy_replay_the_sequence_after_reset() {
        let policy = ReconnectPolicy::default();
        let mut state = ReconnectState::new();

        let mut waits = Vec::new();
        for _ in 0..3 {
            state.record_failure();
            waits.push(policy.wait_for(state.consecutive_failures()));
        }
        assert_eq!(
            waits,
            vec![
                Duration::from_micros(1_000),
                Duration::from_micros(501_000),
                Duration::from_micros(1_001_000),
            ]
        );

        state.record_success();
        state.record_failure();
        assert_eq!(
            policy.wait_for(state.consecutive_failures()),
            Duration::from_micros(1_000)
        );
    }
}
