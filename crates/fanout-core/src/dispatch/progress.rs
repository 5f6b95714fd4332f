//! Progress reporting for a dispatch run.
//!
//! Sent after every settlement so a consumer (e.g. the CLI) can show how far the
//! run has got without waiting for the final result set.

/// Snapshot of dispatch progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchProgress {
    /// Targets settled so far.
    pub settled: usize,
    /// Total targets submitted.
    pub total: usize,
    /// Operations admitted and not yet settled.
    pub active: usize,
    pub fulfilled: usize,
    pub rejected: usize,
}

impl DispatchProgress {
    /// Fraction settled in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.settled as f64 / self.total as f64).min(1.0)
    }

    pub fn is_done(&self) -> bool {
        self.settled >= self.total
    }
}
