//! Retry policy types and per-call retry state.

use std::fmt;
use std::time::Duration;

use crate::request::{RequestDescriptor, DEFAULT_RETRY_BACKOFF};

/// A retry policy describing how a request is retried.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// The executor reads one from the request at the start of every call, so the
/// budget is fixed before the first attempt runs.
///
/// The only supported strategy is exponential backoff: the first retry waits
/// `initial_backoff`, and every retry after that waits twice as long as the
/// previous one. There is no cap on the delay and no wall-clock limit; the
/// retry count is the only bound.
///
/// # Examples
///
/// ```rust
/// use undertow::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(100))
///     .with_max_retries(3);
///
/// assert_eq!(policy.max_retries(), 3);
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
/// assert_eq!(policy.delay_for_attempt(3), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
}

/// Information about a retry, passed to hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Why the executor stopped and handed a failure back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUp {
    /// The request is neither `GET` nor marked idempotent.
    NotIdempotent,
    /// The failure kind is on the ignore-list.
    Ignored,
    /// The retry budget is spent.
    Exhausted,
}

impl fmt::Display for GiveUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUp::NotIdempotent => f.write_str("request is not idempotent"),
            GiveUp::Ignored => f.write_str("failure kind is ignored"),
            GiveUp::Exhausted => f.write_str("retries exhausted"),
        }
    }
}

impl Default for RetryPolicy {
    /// No retries, 50ms initial backoff.
    fn default() -> Self {
        Self::exponential(DEFAULT_RETRY_BACKOFF)
    }
}

impl RetryPolicy {
    /// Create a policy with exponentially increasing delay and no retries.
    ///
    /// Delay = initial_backoff * 2^attempt
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(50))
    ///     .with_max_retries(5);
    ///
    /// // Delay doubles: 50ms, 100ms, 200ms, 400ms, 800ms
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(50)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(4), Some(Duration::from_millis(800)));
    /// ```
    pub fn exponential(initial_backoff: Duration) -> Self {
        Self {
            max_retries: 0,
            initial_backoff,
        }
    }

    /// Read the policy from a request's options, applying defaults.
    ///
    /// ```rust
    /// use undertow::{RequestDescriptor, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::from_request(&RequestDescriptor::get("/"));
    /// assert_eq!(policy, RetryPolicy::default());
    ///
    /// let request = RequestDescriptor::get("/").with_retries(2);
    /// assert_eq!(RetryPolicy::from_request(&request).max_retries(), 2);
    /// ```
    pub fn from_request(request: &RequestDescriptor) -> Self {
        Self::exponential(request.options.retry_backoff())
            .with_max_retries(request.options.num_retries())
    }

    /// Set the maximum number of retry attempts.
    ///
    /// This does not include the initial attempt. For example, `max_retries(3)`
    /// means up to 4 total attempts (1 initial + 3 retries).
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Get the delay before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Calculate the delay before retry N (0-indexed).
    ///
    /// Returns None if no more retries should be attempted.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(
            self.initial_backoff
                .saturating_mul(2u32.saturating_pow(attempt)),
        )
    }

    /// Total time spent sleeping if every attempt fails.
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(50))
    ///     .with_max_retries(3);
    ///
    /// // 50ms + 100ms + 200ms
    /// assert_eq!(policy.total_backoff(), Duration::from_millis(350));
    /// ```
    pub fn total_backoff(&self) -> Duration {
        let mut state = self.start();
        let mut total = Duration::ZERO;
        while let Some(delay) = state.next_delay() {
            total = total.saturating_add(delay);
        }
        total
    }

    /// Begin a call: fresh state with the full budget.
    pub fn start(&self) -> RetryState {
        RetryState {
            remaining: self.max_retries,
            backoff: self.initial_backoff,
        }
    }
}

/// Mutable retry state scoped to a single call.
///
/// Holds the remaining budget and the backoff to use for the next retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    remaining: u32,
    backoff: Duration,
}

impl RetryState {
    /// Consume one retry.
    ///
    /// Returns the delay to wait before the next attempt and doubles the
    /// backoff for the one after, or `None` once the budget is spent.
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let mut state = RetryPolicy::exponential(Duration::from_millis(10))
    ///     .with_max_retries(2)
    ///     .start();
    ///
    /// assert_eq!(state.next_delay(), Some(Duration::from_millis(10)));
    /// assert_eq!(state.next_delay(), Some(Duration::from_millis(20)));
    /// assert_eq!(state.next_delay(), None);
    /// ```
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.backoff;
        self.backoff = self.backoff.saturating_mul(2);
        Some(delay)
    }

    /// Retries left.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// The delay the next retry would wait.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.initial_backoff(), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(0), None);
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(5);

        assert_eq!(
            policy.delay_for_attempt(0),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy.delay_for_attempt(1),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            policy.delay_for_attempt(2),
            Some(Duration::from_millis(400))
        );
        assert_eq!(
            policy.delay_for_attempt(3),
            Some(Duration::from_millis(800))
        );
    }

    #[test]
    fn test_max_retries_limit() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(2);

        assert!(policy.delay_for_attempt(0).is_some());
        assert!(policy.delay_for_attempt(1).is_some());
        assert!(policy.delay_for_attempt(2).is_none());
    }

    #[test]
    fn test_from_request_reads_options() {
        let request = RequestDescriptor::post("/")
            .with_retries(4)
            .with_retry_backoff(Duration::from_millis(5));
        let policy = RetryPolicy::from_request(&request);

        assert_eq!(policy.max_retries(), 4);
        assert_eq!(policy.initial_backoff(), Duration::from_millis(5));
    }

    #[test]
    fn test_state_matches_policy_delays() {
        let policy = RetryPolicy::exponential(Duration::from_millis(7)).with_max_retries(6);
        let mut state = policy.start();

        for attempt in 0..6 {
            assert_eq!(state.next_delay(), policy.delay_for_attempt(attempt));
        }
        assert_eq!(state.next_delay(), None);
        assert_eq!(state.remaining(), 0);
    }

    #[test]
    fn test_state_zero_backoff_stays_zero() {
        let mut state = RetryPolicy::exponential(Duration::ZERO)
            .with_max_retries(3)
            .start();

        assert_eq!(state.next_delay(), Some(Duration::ZERO));
        assert_eq!(state.next_delay(), Some(Duration::ZERO));
        assert_eq!(state.backoff(), Duration::ZERO);
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::exponential(Duration::MAX).with_max_retries(3);
        let mut state = policy.start();

        assert_eq!(state.next_delay(), Some(Duration::MAX));
        assert_eq!(state.next_delay(), Some(Duration::MAX));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::MAX));
        assert_eq!(policy.total_backoff(), Duration::MAX);
    }

    #[test]
    fn test_total_backoff() {
        let policy = RetryPolicy::exponential(Duration::from_millis(50)).with_max_retries(3);
        assert_eq!(policy.total_backoff(), Duration::from_millis(350));
        assert_eq!(RetryPolicy::default().total_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_give_up_display() {
        assert_eq!(GiveUp::Exhausted.to_string(), "retries exhausted");
        assert_eq!(GiveUp::Ignored.to_string(), "failure kind is ignored");
        assert_eq!(
            GiveUp::NotIdempotent.to_string(),
            "request is not idempotent"
        );
    }

    #[test]
    fn test_policy_is_debug() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100)).with_max_retries(3);
        let debug = format!("{:?}", policy);
        assert!(debug.contains("RetryPolicy"));
    }
}
