use async_trait::async_trait;

use crate::error::BoxError;
use crate::signal::Control;
use crate::task::Task;

/// What a step produced when it was executed.
pub enum Outcome {
    /// The step finished; move on to the next task.
    Done,
    /// Splice these tasks into the list right after the current one.
    Fork(Vec<Task>),
    /// Alter the forward pass.
    Control(Control),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Fork(tasks) => f.debug_tuple("Fork").field(&tasks.len()).finish(),
            Self::Control(control) => f.debug_tuple("Control").field(control).finish(),
        }
    }
}

/// The behavior of a task.
///
/// The executor calls [`Step::execute`] once during the forward pass. The
/// commit and rollback hooks are not called by the executor directly: the
/// task's [`Context`](crate::Context) decides when to run them, usually by
/// aggregating the hooks of every task bound to it.
///
/// Implementations receive the [`Task`] they belong to so they can read its
/// params and fill its result slot.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used for tasks built from this step when none is given.
    fn name(&self) -> &str {
        "task"
    }

    /// Run the forward action.
    ///
    /// # Errors
    ///
    /// Returns an error if the forward action fails. The executor treats this
    /// as a step failure and rolls back the tasks that completed before it.
    async fn execute(&self, task: &Task) -> Result<Outcome, BoxError>;

    /// Make the forward action permanent.
    ///
    /// The default implementation is a no-op, suitable for steps whose effects
    /// need no confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    async fn commit(&self, task: &Task) -> Result<(), BoxError> {
        let _ = task;
        Ok(())
    }

    /// Compensate (undo) the forward action.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn rollback(&self, task: &Task) -> Result<(), BoxError> {
        let _ = task;
        Ok(())
    }
}
