//! Retry loop: invoke an operation until it succeeds or the policy says stop.

use std::fmt;

use crate::operation::Operation;
use crate::outcome::{Outcome, RejectReason, Rejection};

use super::policy::{saturating_millis, RetryDecision, RetryPolicy};

/// Settled outcome of one target plus how many invocations it took.
#[derive(Debug)]
pub struct Attempted<V> {
    pub outcome: Outcome<V>,
    pub attempts: u32,
}

/// Runs `operation` for `target` until it succeeds, fails permanently, or the
/// retry budget is spent. On transient failure, suspends for the backoff delay
/// then tries again. Always settles; never returns an error.
pub async fn run_with_retry<T, O>(
    operation: &O,
    target: &T,
    policy: &RetryPolicy,
) -> Attempted<O::Output>
where
    T: fmt::Display + ?Sized,
    O: Operation<T> + ?Sized,
{
    let mut retries_used = 0u32;
    loop {
        let attempts = retries_used + 1;
        let err = match operation.perform(target).await {
            Ok(value) => {
                return Attempted {
                    outcome: Outcome::Fulfilled(value),
                    attempts,
                }
            }
            Err(e) => e,
        };

        match policy.decide(retries_used, err.kind()) {
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    target_id = %target,
                    attempt = attempts,
                    delay_ms = saturating_millis(delay),
                    error = %err,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                retries_used += 1;
            }
            RetryDecision::NoRetry => {
                let reason = if err.is_transient() {
                    RejectReason::Exhausted {
                        retries: retries_used,
                        last: err,
                    }
                } else {
                    RejectReason::Permanent(err)
                };
                let rejection = Rejection {
                    target: target.to_string(),
                    attempts,
                    reason,
                };
                tracing::warn!("{}", rejection);
                return Attempted {
                    outcome: Outcome::Rejected(rejection),
                    attempts,
                };
            }
        }
    }
}
