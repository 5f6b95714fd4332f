//! Bounded-concurrency dispatch of independent operations.
//!
//! Targets are admitted in submission order, each wrapped in the retry loop.
//! Up to `concurrency_limit` run at once; when the set is full the dispatcher
//! waits for the earliest settlement before admitting the next target. Every
//! target settles into the result set, so a run with a valid limit never fails.

mod admission;
mod aggregate;
mod error;
mod progress;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::operation::Operation;
use crate::outcome::Settlement;
use crate::retry::{run_with_retry, saturating_millis, RetryPolicy};

use admission::ActiveSet;

pub use aggregate::{OutcomeAggregator, ResultSet, RunSummary};
pub use error::DispatchError;
pub use progress::DispatchProgress;

/// Runs targets through an operation with retries under a concurrency ceiling.
pub struct Dispatcher<O> {
    operation: Arc<O>,
    policy: RetryPolicy,
    progress_tx: Option<mpsc::Sender<DispatchProgress>>,
}

impl<O> Dispatcher<O> {
    pub fn new(operation: O) -> Self {
        Self::from_arc(Arc::new(operation))
    }

    /// Share an operation that the caller also holds on to.
    pub fn from_arc(operation: Arc<O>) -> Self {
        Self {
            operation,
            policy: RetryPolicy::default(),
            progress_tx: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Offer a progress snapshot after every settlement. Snapshots that do not fit
    /// in the channel, or whose receiver is gone, are dropped.
    pub fn with_progress(mut self, progress_tx: mpsc::Sender<DispatchProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Dispatch `targets` with at most `concurrency_limit` operations in flight.
    ///
    /// Resolves once every target has settled. The only error is an invalid
    /// limit, reported before anything is admitted. Operation tasks are spawned
    /// on the current tokio runtime.
    pub async fn run<T>(
        &self,
        targets: impl IntoIterator<Item = T>,
        concurrency_limit: usize,
    ) -> Result<ResultSet<O::Output>, DispatchError>
    where
        T: fmt::Display + Send + Sync + 'static,
        O: Operation<T> + 'static,
    {
        let limit = NonZeroUsize::new(concurrency_limit)
            .ok_or(DispatchError::InvalidConcurrency(concurrency_limit))?;
        let targets: Vec<T> = targets.into_iter().collect();
        let total = targets.len();
        let started = Instant::now();
        tracing::info!(
            total,
            concurrency = limit.get(),
            max_retries = self.policy.max_retries,
            "dispatch started"
        );

        let mut aggregator = OutcomeAggregator::new(total);
        let mut active = ActiveSet::new(limit);

        for (index, target) in targets.into_iter().enumerate() {
            let label = target.to_string();
            let operation = Arc::clone(&self.operation);
            let policy = self.policy;
            active.admit(index, label, async move {
                run_with_retry(operation.as_ref(), &target, &policy).await
            });

            if active.is_at_capacity() {
                if let Some(settled) = active.next_settled().await {
                    self.record(&mut aggregator, settled, active.len());
                }
                while let Some(settled) = active.try_next_settled() {
                    self.record(&mut aggregator, settled, active.len());
                }
            }
        }

        // Drain: wait for everything still in flight.
        while let Some(settled) = active.next_settled().await {
            self.record(&mut aggregator, settled, active.len());
        }

        let results = aggregator.finalize(started.elapsed());
        tracing::info!(
            total,
            fulfilled = results.fulfilled_count(),
            rejected = results.rejected_count(),
            elapsed_ms = saturating_millis(results.elapsed()),
            "dispatch completed"
        );
        Ok(results)
    }

    fn record<V>(
        &self,
        aggregator: &mut OutcomeAggregator<V>,
        settled: Settlement<V>,
        active: usize,
    ) {
        tracing::debug!(
            index = settled.index,
            attempts = settled.attempts,
            fulfilled = settled.outcome.is_fulfilled(),
            "target settled"
        );
        aggregator.record(settled);
        if let Some(tx) = &self.progress_tx {
            let snapshot = DispatchProgress {
                settled: aggregator.settled(),
                total: aggregator.total(),
                active,
                fulfilled: aggregator.fulfilled(),
                rejected: aggregator.rejected(),
            };
            // Never wait on the consumer; a full or closed channel drops the snapshot.
            let _ = tx.try_send(snapshot);
        }
    }
}

/// Dispatch with the default retry policy (3 retries, 1000ms base delay).
pub async fn run<T, O>(
    operation: O,
    targets: impl IntoIterator<Item = T>,
    concurrency_limit: usize,
) -> Result<ResultSet<O::Output>, DispatchError>
where
    T: fmt::Display + Send + Sync + 'static,
    O: Operation<T> + 'static,
{
    Dispatcher::new(operation).run(targets, concurrency_limit).await
}
