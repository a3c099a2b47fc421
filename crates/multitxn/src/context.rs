use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use crate::error::{BoxError, settle};
use crate::task::Task;

/// Shared handle to a context. Tasks hold one each; the executor compares
/// handles by identity.
pub type SharedContext = Arc<dyn Context>;

/// Lifecycle of a context within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextState {
    Uninitialized,
    Initialized,
    Committed,
    RolledBack,
}

/// A commit/rollback participant shared by one or more tasks.
///
/// The executor initializes a context lazily, right before the first task
/// bound to it runs, and later commits or rolls it back at most once per run.
/// Commits and rollbacks of different contexts run concurrently, so a context
/// must not assume it holds any lock shared with other contexts.
#[async_trait]
pub trait Context: Send + Sync {
    /// Name used in logs, errors and the audit log.
    fn name(&self) -> &str;

    fn is_initialized(&self) -> bool;

    /// Prepare the context for its first task. Must be idempotent once the
    /// context is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be prepared. The
    /// executor then aborts the forward pass.
    async fn init(&self) -> Result<(), BoxError>;

    /// Make the work of `tasks` permanent.
    ///
    /// `tasks` holds the dispatched tasks bound to this context, in dispatch
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails. The executor then rolls back.
    async fn commit(&self, tasks: &[Task]) -> Result<(), BoxError>;

    /// Undo the work of `tasks`.
    ///
    /// `tasks` holds the tasks bound to this context that completed before the
    /// failure, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails. The executor logs it and moves
    /// on.
    async fn rollback(&self, tasks: &[Task]) -> Result<(), BoxError>;
}

static SHARED: LazyLock<SharedContext> =
    LazyLock::new(|| FunctionContext::new_shared("function context"));

/// A context that delegates commit and rollback to its tasks' own hooks.
///
/// Commit runs every task's commit hook concurrently and waits for all of
/// them. Rollback runs the rollback hooks one by one in the order given,
/// which the executor makes newest first.
#[derive(Debug)]
pub struct FunctionContext {
    name: String,
    state: Mutex<ContextState>,
}

impl FunctionContext {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ContextState::Uninitialized),
        }
    }

    /// A new context already wrapped in a [`SharedContext`].
    #[must_use]
    pub fn new_shared(name: impl Into<String>) -> SharedContext {
        Arc::new(Self::new(name))
    }

    /// The process-wide function context.
    #[must_use]
    pub fn shared() -> SharedContext {
        Arc::clone(&SHARED)
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.lock_state()
    }

    fn set_state(&self, state: ContextState) {
        *self.lock_state() = state;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Context for FunctionContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_initialized(&self) -> bool {
        self.state() != ContextState::Uninitialized
    }

    async fn init(&self) -> Result<(), BoxError> {
        let mut state = self.lock_state();
        if *state == ContextState::Uninitialized {
            *state = ContextState::Initialized;
        }
        Ok(())
    }

    async fn commit(&self, tasks: &[Task]) -> Result<(), BoxError> {
        debug!(context = %self.name, tasks = tasks.len(), "committing function tasks");

        let results = join_all(tasks.iter().map(|task| settle(task.commit()))).await;
        results.into_iter().collect::<Result<Vec<()>, BoxError>>()?;

        self.set_state(ContextState::Committed);
        Ok(())
    }

    async fn rollback(&self, tasks: &[Task]) -> Result<(), BoxError> {
        debug!(context = %self.name, tasks = tasks.len(), "rolling back function tasks");

        let mut first_error = None;
        for task in tasks {
            if let Err(error) = settle(task.rollback()).await {
                debug!(context = %self.name, task = task.name(), %error, "task rollback failed");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                self.set_state(ContextState::RolledBack);
                Ok(())
            }
        }
    }
}
