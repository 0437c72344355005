//! Tracker configuration.

use std::time::Duration;

use tracing::warn;

use crate::retry::PollPolicy;

/// Shortest poll interval accepted from the environment.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Poll scheduling and optional ceilings
    pub poll: PollPolicy,
    /// Retries for recording a completed artifact in the store
    pub store_retries: u32,
    /// Consecutive transient poll failures logged before suppression
    pub max_logged_poll_failures: u32,
    /// Capacity of broadcast event channels
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            store_retries: 2,
            max_logged_poll_failures: 5,
            event_capacity: 64,
        }
    }
}

impl TrackerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll = PollPolicy {
            interval: env_parse("VSTUDIO_POLL_INTERVAL_MS")
                .map(poll_interval_from_ms)
                .unwrap_or(defaults.poll.interval),
            backoff_factor: env_parse("VSTUDIO_POLL_BACKOFF_FACTOR")
                .unwrap_or(defaults.poll.backoff_factor),
            max_interval: env_parse("VSTUDIO_POLL_MAX_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.max_interval),
            max_attempts: env_parse("VSTUDIO_POLL_MAX_ATTEMPTS"),
            max_elapsed: env_parse("VSTUDIO_POLL_MAX_ELAPSED_SECS").map(Duration::from_secs),
        };

        Self {
            poll,
            store_retries: env_parse("VSTUDIO_STORE_RETRIES").unwrap_or(defaults.store_retries),
            max_logged_poll_failures: defaults.max_logged_poll_failures,
            event_capacity: defaults.event_capacity,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self
    }
}

fn poll_interval_from_ms(ms: u64) -> Duration {
    let interval = Duration::from_millis(ms);
    if interval < MIN_POLL_INTERVAL {
        warn!(
            requested_ms = ms,
            "Poll interval too short, using {:?}", MIN_POLL_INTERVAL
        );
        return MIN_POLL_INTERVAL;
    }
    interval
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll.interval, Duration::from_millis(5000));
        assert!(config.poll.is_unbounded());
        assert_eq!(config.store_retries, 2);
    }

    #[test]
    fn test_env_poll_interval_has_floor() {
        assert_eq!(poll_interval_from_ms(0), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval_from_ms(10), MIN_POLL_INTERVAL);
        assert_eq!(poll_interval_from_ms(5000), Duration::from_millis(5000));
    }

    #[test]
    fn test_with_poll_interval_keeps_other_settings() {
        let config = TrackerConfig::default()
            .with_poll_policy(PollPolicy::default().with_max_attempts(4))
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(config.poll.interval, Duration::from_millis(10));
        assert_eq!(config.poll.max_attempts, Some(4));
    }
}
