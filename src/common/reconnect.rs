//! Linear backoff reconnection logic.
//!
//! The delay before attempt `n` is `base_delay * n`. Once more than
//! `max_attempts` consecutive attempts have failed the reconnector gives up
//! and stays there until [`Reconnector::cancel_retry`] is called.

use std::time::Duration;

/// Configuration for linear backoff reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay unit; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Maximum number of scheduled attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5000),
            max_attempts: 10,
        }
    }
}

/// Connection lifecycle as seen by the reconnector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    RetryScheduled { attempt: u32, delay: Duration },
    GivenUp,
}

/// What the caller should do after a drop or failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then connect again.
    Retry { attempt: u32, delay: Duration },
    /// Stop retrying; wait for an external trigger.
    GiveUp,
}

/// Tracks reconnection state and calculates delays.
#[derive(Debug)]
pub struct Reconnector {
    config: ReconnectConfig,
    attempts: u32,
    state: ConnectionState,
}

impl Reconnector {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            state: ConnectionState::Idle,
        }
    }

    /// Mark the start of a connection attempt.
    pub fn begin_attempt(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Reset state after a successful connection.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Connected;
    }

    /// Schedule the next retry after a drop or failed attempt.
    pub fn schedule_retry(&mut self) -> RetryDecision {
        if self.state == ConnectionState::GivenUp {
            return RetryDecision::GiveUp;
        }

        if self.attempts >= self.config.max_attempts {
            self.state = ConnectionState::GivenUp;
            return RetryDecision::GiveUp;
        }

        self.attempts += 1;
        let delay = self.config.base_delay * self.attempts;
        self.state = ConnectionState::RetryScheduled {
            attempt: self.attempts,
            delay,
        };

        RetryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Clear any scheduled retry and reset the counter. Does not connect.
    pub fn cancel_retry(&mut self) {
        self.attempts = 0;
        self.state = ConnectionState::Idle;
    }

    /// Get current attempt count.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_given_up(&self) -> bool {
        self.state == ConnectionState::GivenUp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconnector(max_attempts: u32) -> Reconnector {
        Reconnector::new(ReconnectConfig {
            base_delay: Duration::from_millis(100),
            max_attempts,
        })
    }

    #[test]
    fn test_delay_scales_linearly_with_attempt() {
        let mut r = reconnector(5);

        assert_eq!(
            r.schedule_retry(),
            RetryDecision::Retry { attempt: 1, delay: Duration::from_millis(100) }
        );
        assert_eq!(
            r.schedule_retry(),
            RetryDecision::Retry { attempt: 2, delay: Duration::from_millis(200) }
        );
        assert_eq!(
            r.schedule_retry(),
            RetryDecision::Retry { attempt: 3, delay: Duration::from_millis(300) }
        );
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut r = reconnector(2);
        assert!(matches!(r.schedule_retry(), RetryDecision::Retry { attempt: 1, .. }));
        assert!(matches!(r.schedule_retry(), RetryDecision::Retry { attempt: 2, .. }));

        // Attempt max_attempts + 1 is never scheduled
        assert_eq!(r.schedule_retry(), RetryDecision::GiveUp);
        assert!(r.is_given_up());
        assert_eq!(r.schedule_retry(), RetryDecision::GiveUp);
        assert_eq!(r.attempts(), 2);
    }

    #[test]
    fn test_connected_resets_counter() {
        let mut r = reconnector(3);
        r.schedule_retry();
        r.schedule_retry();
        r.begin_attempt();
        r.on_connected();

        assert_eq!(r.attempts(), 0);
        assert_eq!(r.state(), ConnectionState::Connected);
        assert_eq!(
            r.schedule_retry(),
            RetryDecision::Retry { attempt: 1, delay: Duration::from_millis(100) }
        );
    }

    #[test]
    fn test_cancel_retry_clears_given_up() {
        let mut r = reconnector(1);
        r.schedule_retry();
        assert_eq!(r.schedule_retry(), RetryDecision::GiveUp);

        r.cancel_retry();
        assert_eq!(r.state(), ConnectionState::Idle);
        assert_eq!(r.attempts(), 0);
        assert!(matches!(r.schedule_retry(), RetryDecision::Retry { attempt: 1, .. }));
    }

    #[test]
    fn test_zero_max_attempts_gives_up_immediately() {
        let mut r = reconnector(0);
        assert_eq!(r.schedule_retry(), RetryDecision::GiveUp);
    }
}
