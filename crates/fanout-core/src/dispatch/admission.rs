//! Admission control: the set of operations currently in flight.
//!
//! Targets are admitted eagerly in submission order. Once the set is at the
//! limit, the caller waits for the earliest settlement among all members (not
//! necessarily the newest) before considering the next target.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;

use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;

use crate::outcome::{Outcome, RejectReason, Rejection, Settlement};
use crate::retry::Attempted;

/// Bookkeeping for one admitted operation.
struct Slot {
    index: usize,
    target: String,
    admitted_at: Instant,
}

/// In-flight operations, bounded by `limit` at every admission decision.
pub(crate) struct ActiveSet<V> {
    limit: NonZeroUsize,
    tasks: JoinSet<Attempted<V>>,
    slots: HashMap<Id, Slot>,
}

impl<V: Send + 'static> ActiveSet<V> {
    pub(crate) fn new(limit: NonZeroUsize) -> Self {
        Self {
            limit,
            tasks: JoinSet::new(),
            slots: HashMap::with_capacity(limit.get()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_at_capacity(&self) -> bool {
        self.tasks.len() >= self.limit.get()
    }

    /// Start `fut` for the target at `index` and add it to the set.
    pub(crate) fn admit<F>(&mut self, index: usize, target: String, fut: F)
    where
        F: Future<Output = Attempted<V>> + Send + 'static,
    {
        tracing::debug!(index, target_id = %target, active = self.tasks.len() + 1, "admitting target");
        let handle = self.tasks.spawn(fut);
        self.slots.insert(
            handle.id(),
            Slot {
                index,
                target,
                admitted_at: Instant::now(),
            },
        );
    }

    /// Wait for the earliest member to settle and remove it. `None` once empty.
    pub(crate) async fn next_settled(&mut self) -> Option<Settlement<V>> {
        let joined = self.tasks.join_next_with_id().await?;
        Some(self.settle(joined))
    }

    /// Remove a member that has already settled, without waiting.
    pub(crate) fn try_next_settled(&mut self) -> Option<Settlement<V>> {
        let joined = self.tasks.try_join_next_with_id()?;
        Some(self.settle(joined))
    }

    fn settle(&mut self, joined: Result<(Id, Attempted<V>), JoinError>) -> Settlement<V> {
        let (id, attempted) = match joined {
            Ok((id, attempted)) => (id, attempted),
            Err(err) => {
                let id = err.id();
                let target = self
                    .slots
                    .get(&id)
                    .map(|s| s.target.clone())
                    .unwrap_or_default();
                let rejection = Rejection {
                    target,
                    attempts: 0,
                    reason: RejectReason::Panicked(panic_message(err)),
                };
                tracing::error!("{}", rejection);
                (
                    id,
                    Attempted {
                        outcome: Outcome::Rejected(rejection),
                        attempts: 0,
                    },
                )
            }
        };
        let Some(slot) = self.slots.remove(&id) else {
            unreachable!("settled task {} was never admitted", id);
        };
        Settlement {
            index: slot.index,
            outcome: attempted.outcome,
            attempts: attempted.attempts,
            elapsed: slot.admitted_at.elapsed(),
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn done(v: u32) -> Attempted<u32> {
        Attempted {
            outcome: Outcome::Fulfilled(v),
            attempts: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_settlement_is_released_first() {
        let mut set = ActiveSet::new(NonZeroUsize::new(2).unwrap());
        set.admit(0, "slow".into(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            done(0)
        });
        assert!(!set.is_at_capacity());
        set.admit(1, "fast".into(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            done(1)
        });
        assert!(set.is_at_capacity());

        let first = set.next_settled().await.unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.elapsed, Duration::from_millis(10));
        assert_eq!(set.len(), 1);

        let second = set.next_settled().await.unwrap();
        assert_eq!(second.index, 0);
        assert!(set.next_settled().await.is_none());
    }

    fn explode() -> Attempted<u32> {
        panic!("operation blew up")
    }

    #[tokio::test]
    async fn panicking_task_settles_rejected() {
        let mut set: ActiveSet<u32> = ActiveSet::new(NonZeroUsize::new(1).unwrap());
        set.admit(3, "boom".into(), async { explode() });
        let settled = set.next_settled().await.unwrap();
        assert_eq!(settled.index, 3);
        let rejection = settled.outcome.rejection().expect("rejected");
        assert_eq!(rejection.target, "boom");
        assert!(rejection.to_string().contains("operation blew up"));
    }

    #[tokio::test]
    async fn try_next_settled_is_empty_without_finished_members() {
        let mut set = ActiveSet::new(NonZeroUsize::new(1).unwrap());
        set.admit(0, "pending".into(), async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            done(0)
        });
        assert!(set.try_next_settled().is_none());
        assert_eq!(set.len(), 1);
    }
}
