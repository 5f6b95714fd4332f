//! Retry and backoff policy.
//!
//! This module owns the failure classification type, the exponential backoff
//! policy, and the retry loop that turns one target's operation into exactly
//! one settled outcome.

mod error;
mod policy;
mod run;

pub use error::{FailureKind, OperationError};
pub use policy::{backoff_delay, saturating_millis, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Attempted};
