//! Outcome aggregation: one settlement per target, addressable by submission index.

use std::time::Duration;

use serde::Serialize;

use crate::outcome::{Outcome, Settlement};
use crate::retry::saturating_millis;

/// Collects settlements as they arrive, in whatever order targets finish.
#[derive(Debug)]
pub struct OutcomeAggregator<V> {
    /// Settlements in completion order.
    settlements: Vec<Settlement<V>>,
    /// Submission index -> position in `settlements`.
    positions: Vec<Option<usize>>,
    fulfilled: usize,
}

impl<V> OutcomeAggregator<V> {
    pub fn new(total: usize) -> Self {
        Self {
            settlements: Vec::with_capacity(total),
            positions: vec![None; total],
            fulfilled: 0,
        }
    }

    /// Record the settlement for `settlement.index`.
    ///
    /// # Panics
    /// If the index is out of range or was already recorded.
    pub fn record(&mut self, settlement: Settlement<V>) {
        let index = settlement.index;
        assert!(
            index < self.positions.len(),
            "settlement index {} out of range for {} targets",
            index,
            self.positions.len()
        );
        assert!(
            self.positions[index].is_none(),
            "target {} settled twice",
            index
        );
        if settlement.outcome.is_fulfilled() {
            self.fulfilled += 1;
        }
        self.positions[index] = Some(self.settlements.len());
        self.settlements.push(settlement);
    }

    pub fn total(&self) -> usize {
        self.positions.len()
    }

    pub fn settled(&self) -> usize {
        self.settlements.len()
    }

    pub fn fulfilled(&self) -> usize {
        self.fulfilled
    }

    pub fn rejected(&self) -> usize {
        self.settlements.len() - self.fulfilled
    }

    pub fn is_complete(&self) -> bool {
        self.settlements.len() == self.positions.len()
    }

    /// Close the aggregator and hand out the result set.
    ///
    /// # Panics
    /// If any target has not been recorded yet.
    pub fn finalize(self, elapsed: Duration) -> ResultSet<V> {
        assert!(
            self.is_complete(),
            "finalize called with {} of {} targets settled",
            self.settlements.len(),
            self.positions.len()
        );
        let positions = self.positions.into_iter().flatten().collect();
        ResultSet {
            settlements: self.settlements,
            positions,
            elapsed,
        }
    }
}

/// Every target's settlement once a run has drained.
#[derive(Debug)]
pub struct ResultSet<V> {
    settlements: Vec<Settlement<V>>,
    positions: Vec<usize>,
    elapsed: Duration,
}

impl<V> ResultSet<V> {
    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }

    /// Settlement for the target submitted at `index`.
    pub fn get(&self, index: usize) -> Option<&Settlement<V>> {
        self.positions.get(index).map(|&pos| &self.settlements[pos])
    }

    /// Settlements in completion order.
    pub fn iter(&self) -> impl Iterator<Item = &Settlement<V>> {
        self.settlements.iter()
    }

    /// Submission indices in the order their targets settled.
    pub fn completion_order(&self) -> Vec<usize> {
        self.settlements.iter().map(|s| s.index).collect()
    }

    /// Settlements rearranged into submission order.
    pub fn into_ordered(self) -> Vec<Settlement<V>> {
        let mut out = self.settlements;
        out.sort_by_key(|s| s.index);
        out
    }

    /// Outcomes in submission order.
    pub fn into_outcomes(self) -> Vec<Outcome<V>> {
        self.into_ordered().into_iter().map(|s| s.outcome).collect()
    }

    pub fn fulfilled_count(&self) -> usize {
        self.settlements
            .iter()
            .filter(|s| s.outcome.is_fulfilled())
            .count()
    }

    pub fn rejected_count(&self) -> usize {
        self.len() - self.fulfilled_count()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.len(),
            elapsed_ms: saturating_millis(self.elapsed),
            ..RunSummary::default()
        };
        for s in &self.settlements {
            summary.attempts += u64::from(s.attempts);
            match s.outcome.rejection() {
                None => summary.fulfilled += 1,
                Some(r) => {
                    summary.rejected += 1;
                    if r.is_exhausted() {
                        summary.exhausted += 1;
                    }
                }
            }
        }
        summary
    }
}

/// Counts for one run, suitable for reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub fulfilled: usize,
    pub rejected: usize,
    /// Rejections caused by retry exhaustion (subset of `rejected`).
    pub exhausted: usize,
    /// Operation invocations across all targets.
    pub attempts: u64,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{RejectReason, Rejection};
    use crate::retry::OperationError;

    fn fulfilled(index: usize, v: u32) -> Settlement<u32> {
        Settlement {
            index,
            outcome: Outcome::Fulfilled(v),
            attempts: 1,
            elapsed: Duration::ZERO,
        }
    }

    fn exhausted(index: usize) -> Settlement<u32> {
        Settlement {
            index,
            outcome: Outcome::Rejected(Rejection {
                target: format!("t{}", index),
                attempts: 4,
                reason: RejectReason::Exhausted {
                    retries: 3,
                    last: OperationError::transient("HTTP 502"),
                },
            }),
            attempts: 4,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn out_of_order_settlements_map_back_to_index() {
        let mut agg = OutcomeAggregator::new(3);
        agg.record(fulfilled(2, 20));
        agg.record(exhausted(0));
        assert!(!agg.is_complete());
        agg.record(fulfilled(1, 10));
        assert!(agg.is_complete());
        assert_eq!(agg.fulfilled(), 2);
        assert_eq!(agg.rejected(), 1);

        let set = agg.finalize(Duration::from_millis(5));
        assert_eq!(set.len(), 3);
        assert_eq!(set.completion_order(), vec![2, 0, 1]);
        assert_eq!(set.get(1).unwrap().outcome.value(), Some(&10));
        assert!(set.get(0).unwrap().outcome.is_rejected());
        assert!(set.get(3).is_none());

        let summary = set.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.fulfilled, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.attempts, 6);
        assert_eq!(summary.elapsed_ms, 5);

        let ordered: Vec<usize> = set.into_ordered().iter().map(|s| s.index).collect();
        assert_eq!(ordered, vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "settled twice")]
    fn duplicate_record_panics() {
        let mut agg = OutcomeAggregator::new(2);
        agg.record(fulfilled(0, 1));
        agg.record(fulfilled(0, 2));
    }

    #[test]
    #[should_panic(expected = "finalize called with 1 of 2")]
    fn early_finalize_panics() {
        let mut agg = OutcomeAggregator::new(2);
        agg.record(fulfilled(1, 1));
        let _ = agg.finalize(Duration::ZERO);
    }

    #[test]
    fn summary_serializes_flat() {
        let mut agg = OutcomeAggregator::new(1);
        agg.record(exhausted(0));
        let json = serde_json::to_value(agg.finalize(Duration::from_millis(1500)).summary()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total": 1,
                "fulfilled": 0,
                "rejected": 1,
                "exhausted": 1,
                "attempts": 4,
                "elapsed_ms": 1500
            })
        );
    }

    #[test]
    fn saturated_elapsed_does_not_wrap() {
        let mut agg = OutcomeAggregator::new(1);
        agg.record(fulfilled(0, 1));
        let summary = agg.finalize(Duration::MAX).summary();
        assert_eq!(summary.elapsed_ms, u64::MAX);
    }

    #[test]
    fn empty_aggregator_finalizes_immediately() {
        let agg: OutcomeAggregator<u32> = OutcomeAggregator::new(0);
        let set = agg.finalize(Duration::ZERO);
        assert!(set.is_empty());
        assert_eq!(set.summary(), RunSummary::default());
    }
}
