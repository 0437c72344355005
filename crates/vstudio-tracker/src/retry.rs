//! Poll scheduling and retry utilities.
//!
//! `PollPolicy` decides how long to wait between status polls and when (if
//! ever) to give up. `retry_async` wraps one-shot side effects such as store
//! writes, and `FailureTracker` keeps repeated transient poll failures from
//! flooding the logs.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};
use vstudio_store::StoreError;

use crate::error::TrackerError;

/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// When to poll and when to stop.
///
/// The default polls every five seconds forever: no attempt ceiling, no
/// deadline, no backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first poll and between polls
    pub interval: Duration,
    /// Multiplier applied per completed poll; 1.0 keeps the interval fixed
    pub backoff_factor: f64,
    /// Upper bound for a backed-off delay
    pub max_interval: Duration,
    /// Give up after this many polls
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since polling began
    pub max_elapsed: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(60),
            max_attempts: None,
            max_elapsed: None,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy with no ceiling.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    /// Delay before poll number `completed + 1`.
    pub fn delay_after(&self, completed: u32) -> Duration {
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor > 1.0 {
            self.backoff_factor
        } else {
            return self.interval;
        };

        let exponent = i32::try_from(completed).unwrap_or(i32::MAX);
        let secs = self.interval.as_secs_f64() * factor.powi(exponent);
        let cap = self.max_interval.max(self.interval);

        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether another poll is still allowed.
    pub fn allows(&self, completed: u32, elapsed: Duration) -> bool {
        let under_attempts = self.max_attempts.map_or(true, |max| completed < max);
        let under_deadline = self.max_elapsed.map_or(true, |max| elapsed < max);
        under_attempts && under_deadline
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts.is_none() && self.max_elapsed.is_none()
    }
}

/// Errors that say whether asking again could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        StoreError::is_retryable(self)
    }
}

impl Retryable for TrackerError {
    fn is_retryable(&self) -> bool {
        TrackerError::is_retryable(self)
    }
}

/// Retry schedule for a one-shot side effect.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each one after
    pub initial_delay: Duration,
    pub delay_cap: Duration,
    /// Name used in log lines
    pub label: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            delay_cap: Duration::from_secs(5),
            label: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Wait before retry number `retry` (1-based).
    fn delay_before(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.delay_cap)
    }
}

/// Outcome of [`retry_async`].
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Last error seen, and how many attempts were made in total
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retries in `config` are used up.
///
/// ```ignore
/// let config = RetryConfig::new("artifact_store_record").with_max_retries(2);
/// let result = retry_async(&config, || store.record(&artifact, &origin, now)).await;
/// ```
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, operation: F) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let error = match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) => e,
        };

        if attempts > config.max_retries || !error.is_retryable() {
            return RetryResult::Failed { error, attempts };
        }

        let delay = config.delay_before(attempts);
        debug!(
            label = %config.label,
            attempt = attempts,
            ?delay,
            "Retrying after error: {}", error
        );
        tokio::time::sleep(delay).await;
    }
}

/// Counts consecutive transient poll failures and decides which of them get
/// a log line.
///
/// The first `log_limit` failures in a row are logged; after that a single
/// notice is emitted and the rest stay quiet until a success resets the run.
#[derive(Debug, Default, Clone)]
pub struct FailureTracker {
    consecutive: u32,
    log_limit: u32,
    muted: bool,
}

impl FailureTracker {
    pub fn new(log_limit: u32) -> Self {
        Self {
            log_limit,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        if self.muted {
            info!(
                failures = self.consecutive,
                "Polling recovered after a run of failures"
            );
        }
        *self = Self::new(self.log_limit);
    }

    /// Count a failure; `true` when it should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        if self.consecutive <= self.log_limit {
            return true;
        }
        if !self.muted {
            self.muted = true;
            warn!(
                limit = self.log_limit,
                "Muting poll failure logs until the next success"
            );
        }
        false
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy_is_fixed_and_unbounded() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_after(0), Duration::from_millis(5000));
        assert_eq!(policy.delay_after(50), Duration::from_millis(5000));
        assert!(policy.is_unbounded());
        assert!(policy.allows(10_000, Duration::from_secs(86_400)));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = PollPolicy::fixed(Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(10));

        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
        assert_eq!(policy.delay_after(1000), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_factor_below_one_is_fixed() {
        let policy = PollPolicy::fixed(Duration::from_secs(3))
            .with_backoff(0.5, Duration::from_secs(10));
        assert_eq!(policy.delay_after(5), Duration::from_secs(3));
    }

    #[test]
    fn test_ceilings() {
        let policy = PollPolicy::default()
            .with_max_attempts(3)
            .with_max_elapsed(Duration::from_secs(60));

        assert!(policy.allows(2, Duration::from_secs(10)));
        assert!(!policy.allows(3, Duration::from_secs(10)));
        assert!(!policy.allows(0, Duration::from_secs(60)));
    }

    #[test]
    fn test_retry_delay_doubles_up_to_cap() {
        let config = RetryConfig::new("test").with_initial_delay(Duration::from_millis(100));

        assert_eq!(config.delay_before(1), Duration::from_millis(100));
        assert_eq!(config.delay_before(2), Duration::from_millis(200));
        assert_eq!(config.delay_before(3), Duration::from_millis(400));
        assert_eq!(config.delay_before(40), Duration::from_secs(5));
    }

    #[test]
    fn test_failure_tracker_mutes_after_limit() {
        let mut tracker = FailureTracker::new(2);

        assert!(tracker.record_failure());
        assert!(tracker.record_failure());
        assert!(!tracker.record_failure());
        assert!(!tracker.record_failure());
        assert_eq!(tracker.failure_count(), 4);

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_succeeds_after_failures() {
        let config = RetryConfig::new("test").with_max_retries(3);
        let calls = AtomicU32::new(0);

        let result: RetryResult<u32, StoreError> = retry_async(&config, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StoreError::write_failed("busy"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_gives_up() {
        let config = RetryConfig::new("test").with_max_retries(2);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), StoreError> = retry_async(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::write_failed("disk full"))
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 3),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_async_stops_on_permanent_error() {
        let config = RetryConfig::new("test").with_max_retries(5);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), TrackerError> = retry_async(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TrackerError::download("expired link"))
        })
        .await;

        assert!(matches!(result, RetryResult::Failed { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
