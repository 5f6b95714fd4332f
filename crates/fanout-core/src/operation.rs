//! The operation capability the dispatcher drives.
//!
//! An operation performs one remote request for a target and classifies its own
//! failures as transient or permanent via [`OperationError`]. The dispatcher never
//! inspects error text to decide whether to retry.

use std::future::Future;

use crate::retry::OperationError;

/// Asynchronous request-performing primitive.
pub trait Operation<T: ?Sized>: Send + Sync {
    type Output: Send + 'static;

    fn perform(&self, target: &T) -> impl Future<Output = Result<Self::Output, OperationError>> + Send;
}

/// Operation backed by a closure. See [`from_fn`].
#[derive(Debug, Clone)]
pub struct FnOperation<F>(F);

/// Wrap a closure `Fn(&T) -> Future` as an [`Operation`].
///
/// The returned future must not borrow the target; clone what it needs.
pub fn from_fn<T, F, Fut, V>(f: F) -> FnOperation<F>
where
    T: ?Sized,
    F: Fn(&T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, OperationError>> + Send,
    V: Send + 'static,
{
    FnOperation(f)
}

impl<T, F, Fut, V> Operation<T> for FnOperation<F>
where
    T: ?Sized,
    F: Fn(&T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, OperationError>> + Send,
    V: Send + 'static,
{
    type Output = V;

    fn perform(&self, target: &T) -> impl Future<Output = Result<V, OperationError>> + Send {
        (self.0)(target)
    }
}
