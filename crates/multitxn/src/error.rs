use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;

/// Error type returned by caller-supplied operations.
///
/// Tasks across different resources fail in unrelated ways, so operations box
/// their errors instead of sharing one concrete type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a transaction run.
///
/// Always carries the root cause: rollback failures triggered by one of these
/// errors are logged and recorded in the audit log but never replace it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TxnError {
    /// A task's execute operation failed.
    #[error("task '{task}' at position {index} failed: {source}")]
    Execution {
        /// Name of the task that failed.
        task: String,
        /// Position of the task in the task list.
        index: usize,
        /// The error returned by the task.
        #[source]
        source: BoxError,
    },

    /// A context failed to initialize before its task could run.
    #[error("context '{context}' failed to initialize: {source}")]
    ContextInit {
        /// Name of the context.
        context: String,
        /// Position of the task that required the context.
        index: usize,
        /// The error returned by the context.
        #[source]
        source: BoxError,
    },

    /// A conditional task asked for the transaction to be rolled back.
    #[error("{message}")]
    ConditionRollback {
        /// Name of the conditional task.
        task: String,
        /// Position of the conditional task in the task list.
        index: usize,
        /// Message attached to the signal, or the configured default.
        message: String,
    },

    /// A context failed to commit.
    #[error("commit failed for context '{context}': {source}")]
    Commit {
        /// Name of the first context whose commit failed.
        context: String,
        /// The error returned by the context.
        #[source]
        source: BoxError,
    },
}

impl TxnError {
    /// Position of the task that triggered the failure, if the failure
    /// happened during the forward pass.
    #[must_use]
    pub fn task_index(&self) -> Option<usize> {
        match self {
            Self::Execution { index, .. }
            | Self::ContextInit { index, .. }
            | Self::ConditionRollback { index, .. } => Some(*index),
            Self::Commit { .. } => None,
        }
    }
}

/// A context's rollback failed.
///
/// Never returned to the caller; logged and recorded in the audit log.
#[derive(Debug, Error)]
#[error("rollback failed for context '{context}': {source}")]
pub struct RollbackFailure {
    /// Name of the context whose rollback failed.
    pub context: String,
    /// The underlying error.
    #[source]
    pub source: BoxError,
}

/// A step panicked while being evaluated.
#[derive(Debug, Error)]
#[error("task panicked: {0}")]
pub struct TaskPanic(pub String);

impl TaskPanic {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self(message)
    }
}

/// Await `future`, turning a panic while polling it into a [`TaskPanic`] error.
pub(crate) async fn settle<F>(future: F) -> Result<(), BoxError>
where
    F: Future<Output = Result<(), BoxError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(Box::new(TaskPanic::from_payload(panic.as_ref()))),
    }
}
