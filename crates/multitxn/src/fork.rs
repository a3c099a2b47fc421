use async_trait::async_trait;

use crate::error::BoxError;
use crate::step::{Outcome, Step};
use crate::task::Task;

type ForkFn = Box<dyn Fn(&Task) -> Result<Vec<Task>, BoxError> + Send + Sync>;

/// A step that builds more tasks once the run has reached it.
///
/// The returned tasks are spliced into the task list right after the fork
/// task, in the order given, ahead of whatever followed it. Useful when the
/// shape of the rest of the workflow depends on results of earlier tasks.
///
/// A fork step has no commit or rollback behavior of its own.
pub struct ForkStep {
    fork: ForkFn,
}

impl ForkStep {
    pub fn new<F>(fork: F) -> Self
    where
        F: Fn(&Task) -> Result<Vec<Task>, BoxError> + Send + Sync + 'static,
    {
        Self {
            fork: Box::new(fork),
        }
    }
}

#[async_trait]
impl Step for ForkStep {
    fn name(&self) -> &str {
        "fork"
    }

    async fn execute(&self, task: &Task) -> Result<Outcome, BoxError> {
        let tasks = (self.fork)(task)?;
        Ok(Outcome::Fork(tasks))
    }
}
