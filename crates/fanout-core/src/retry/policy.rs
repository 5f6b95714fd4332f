use std::time::Duration;

use super::error::FailureKind;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Backoff for the retry at `attempt_index` (0 = first retry): `base * 2^attempt_index`.
///
/// Pure and deterministic. Saturates at `Duration::MAX` instead of overflowing.
pub fn backoff_delay(attempt_index: u32, base_delay: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt_index).unwrap_or(0);
    if factor == 0 {
        return if base_delay.is_zero() {
            Duration::ZERO
        } else {
            Duration::MAX
        };
    }
    base_delay.saturating_mul(factor)
}

/// Whole milliseconds in `d`, clamped to `u64::MAX` for saturated delays.
pub fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff policy with an optional ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first invocation (so at most `max_retries + 1` calls).
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each subsequent one.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay. `None` leaves growth uncapped.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Backoff before retry number `attempt_index` (0-based), clamped to `max_delay`.
    pub fn delay(&self, attempt_index: u32) -> Duration {
        let raw = backoff_delay(attempt_index, self.base_delay);
        match self.max_delay {
            Some(cap) => raw.min(cap),
            None => raw,
        }
    }

    /// Decide what to do after a failure, given how many retries were already used.
    pub fn decide(&self, retries_used: u32, kind: FailureKind) -> RetryDecision {
        match kind {
            FailureKind::Permanent => RetryDecision::NoRetry,
            FailureKind::Transient if retries_used >= self.max_retries => RetryDecision::NoRetry,
            FailureKind::Transient => RetryDecision::RetryAfter(self.delay(retries_used)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(0, base), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1, base), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2, base), Duration::from_millis(4000));
        assert_eq!(backoff_delay(3, base), Duration::from_millis(8000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(40, Duration::from_secs(1 << 40)), Duration::MAX);
        assert_eq!(backoff_delay(64, Duration::from_millis(1)), Duration::MAX);
        assert_eq!(backoff_delay(64, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn millis_clamp_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(backoff_delay(40, Duration::from_secs(1))), u64::MAX);
    }

    #[test]
    fn no_retry_for_permanent() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(0, FailureKind::Permanent), RetryDecision::NoRetry);
    }

    #[test]
    fn transient_retries_until_budget_is_spent() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.decide(0, FailureKind::Transient),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
        assert_eq!(
            p.decide(2, FailureKind::Transient),
            RetryDecision::RetryAfter(Duration::from_millis(4000))
        );
        assert_eq!(p.decide(3, FailureKind::Transient), RetryDecision::NoRetry);
    }

    #[test]
    fn max_delay_caps_growth() {
        let p = RetryPolicy::new(20, Duration::from_millis(250)).with_max_delay(Duration::from_secs(30));
        assert_eq!(p.delay(2), Duration::from_millis(1000));
        assert_eq!(p.delay(10), Duration::from_secs(30));
        assert_eq!(p.delay(19), Duration::from_secs(30));
    }

    #[test]
    fn zero_retries_never_retries() {
        let p = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(p.decide(0, FailureKind::Transient), RetryDecision::NoRetry);
    }
}
