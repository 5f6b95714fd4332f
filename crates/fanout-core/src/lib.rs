pub mod config;
pub mod logging;

pub mod dispatch;
pub mod operation;
pub mod outcome;
pub mod retry;

pub use dispatch::{run, DispatchError, Dispatcher, ResultSet};
pub use operation::{from_fn, Operation};
pub use outcome::{Outcome, RejectReason, Rejection, Settlement};
pub use retry::{FailureKind, OperationError, RetryPolicy};
