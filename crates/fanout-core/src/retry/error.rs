//! Operation error type carrying its own retry classification.

use std::error::Error as StdError;

/// Retry classification attached to every operation failure.
///
/// The operation capability decides the class; the retry executor only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Server-side or otherwise retriable (timeouts, throttling, 5xx, ...).
    Transient,
    /// Client-side or otherwise final (bad request, not found, ...). Not retried.
    Permanent,
}

/// Error returned by a single operation invocation.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?} failure: {message}")]
pub struct OperationError {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl OperationError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, message)
    }

    /// Attach the underlying cause (I/O error, client error, ...).
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}
