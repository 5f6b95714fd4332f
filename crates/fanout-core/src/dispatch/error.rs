//! Configuration errors raised by the dispatcher before any target is admitted.

/// The only errors that escape [`super::Dispatcher::run`]. Per-target failures
/// are recorded in the result set instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),
}
