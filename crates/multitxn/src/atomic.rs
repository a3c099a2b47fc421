use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::step::{Outcome, Step};
use crate::task::Task;

type Callback = Box<dyn Fn(Task) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

fn boxed<F, Fut>(callback: F) -> Callback
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Box::new(move |task| callback(task).boxed())
}

/// A step with a forward action and optional commit and rollback callbacks.
///
/// Every callback receives a handle to its own task, so the forward action can
/// store a result that the commit or rollback callback (or a later task)
/// reads back.
///
/// ```
/// use multitxn::{AtomicStep, FunctionContext, Task};
/// use serde_json::json;
///
/// let task = Task::new(
///     FunctionContext::shared(),
///     AtomicStep::new(|task| async move {
///         task.set_result(json!("reserved"));
///         Ok(())
///     })
///     .on_rollback(|task| async move {
///         task.take_result();
///         Ok(())
///     }),
/// );
/// # let _ = task;
/// ```
pub struct AtomicStep {
    execute: Callback,
    commit: Option<Callback>,
    rollback: Option<Callback>,
}

impl AtomicStep {
    pub fn new<F, Fut>(execute: F) -> Self
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            execute: boxed(execute),
            commit: None,
            rollback: None,
        }
    }

    #[must_use]
    pub fn on_commit<F, Fut>(mut self, commit: F) -> Self
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.commit = Some(boxed(commit));
        self
    }

    #[must_use]
    pub fn on_rollback<F, Fut>(mut self, rollback: F) -> Self
    where
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.rollback = Some(boxed(rollback));
        self
    }
}

#[async_trait]
impl Step for AtomicStep {
    fn name(&self) -> &str {
        "atomic"
    }

    async fn execute(&self, task: &Task) -> Result<Outcome, BoxError> {
        (self.execute)(task.clone()).await?;
        Ok(Outcome::Done)
    }

    async fn commit(&self, task: &Task) -> Result<(), BoxError> {
        match &self.commit {
            Some(commit) => commit(task.clone()).await,
            None => Ok(()),
        }
    }

    async fn rollback(&self, task: &Task) -> Result<(), BoxError> {
        match &self.rollback {
            Some(rollback) => rollback(task.clone()).await,
            None => Ok(()),
        }
    }
}
