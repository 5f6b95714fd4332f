//! Settled results: the permanent record of what happened to each target.

use std::fmt;
use std::time::Duration;

use crate::retry::OperationError;

/// Final result for one target. Created once, at settlement.
#[derive(Debug)]
pub enum Outcome<V> {
    Fulfilled(V),
    Rejected(Rejection),
}

impl<V> Outcome<V> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Outcome::Fulfilled(v) => Some(v),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Fulfilled(_) => None,
            Outcome::Rejected(r) => Some(r),
        }
    }

    pub fn into_result(self) -> Result<V, Rejection> {
        match self {
            Outcome::Fulfilled(v) => Ok(v),
            Outcome::Rejected(r) => Err(r),
        }
    }
}

/// Why a target settled as rejected.
#[derive(Debug)]
pub enum RejectReason {
    /// The operation reported a non-retriable failure.
    Permanent(OperationError),
    /// Every retry was spent on transient failures; `last` is the final one.
    Exhausted { retries: u32, last: OperationError },
    /// The operation task panicked; the payload message if it was a string.
    Panicked(String),
}

/// Final-failure record wrapping the reason with the target it belongs to.
#[derive(Debug)]
pub struct Rejection {
    /// Display form of the target.
    pub target: String,
    /// Operation invocations made before settling.
    pub attempts: u32,
    pub reason: RejectReason,
}

impl Rejection {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.reason, RejectReason::Exhausted { .. })
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self.reason, RejectReason::Permanent(_))
    }

    /// The underlying operation error, if the rejection came from one.
    pub fn last_error(&self) -> Option<&OperationError> {
        match &self.reason {
            RejectReason::Permanent(e) | RejectReason::Exhausted { last: e, .. } => Some(e),
            RejectReason::Panicked(_) => None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "final failure for {}: ", self.target)?;
        match &self.reason {
            RejectReason::Permanent(e) => write!(f, "{}", e),
            RejectReason::Exhausted { retries, last } => write!(
                f,
                "retries exhausted after {} retries ({} attempts); last error: {}",
                retries, self.attempts, last
            ),
            RejectReason::Panicked(msg) => write!(f, "operation panicked: {}", msg),
        }
    }
}

impl std::error::Error for Rejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// One target's outcome plus where it came from and what it cost.
#[derive(Debug)]
pub struct Settlement<V> {
    /// Position of the target in the submitted sequence.
    pub index: usize,
    pub outcome: Outcome<V>,
    /// Operation invocations made (1 = succeeded or failed on the first try).
    pub attempts: u32,
    /// Time from admission to settlement, backoff waits included.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_rejection_names_target_and_exhaustion() {
        let r = Rejection {
            target: "api/users".to_string(),
            attempts: 4,
            reason: RejectReason::Exhausted {
                retries: 3,
                last: OperationError::transient("HTTP 503"),
            },
        };
        let msg = r.to_string();
        assert!(msg.starts_with("final failure for api/users"));
        assert!(msg.contains("retries exhausted after 3 retries (4 attempts)"));
        assert!(msg.contains("HTTP 503"));
        assert!(r.is_exhausted());
        assert!(!r.is_permanent());
    }

    #[test]
    fn permanent_rejection_keeps_source() {
        let r = Rejection {
            target: "api/missing".to_string(),
            attempts: 1,
            reason: RejectReason::Permanent(OperationError::permanent("HTTP 404")),
        };
        assert_eq!(
            r.to_string(),
            "final failure for api/missing: Permanent failure: HTTP 404"
        );
        assert!(std::error::Error::source(&r).is_some());
    }

    #[test]
    fn outcome_accessors() {
        let ok: Outcome<u32> = Outcome::Fulfilled(7);
        assert!(ok.is_fulfilled());
        assert_eq!(ok.value(), Some(&7));
        assert!(ok.rejection().is_none());
        assert_eq!(ok.into_result().unwrap(), 7);
    }
}
