use async_trait::async_trait;

use crate::error::BoxError;
use crate::signal::Control;
use crate::step::{Outcome, Step};
use crate::task::Task;

type ConditionFn = Box<dyn Fn(&Task) -> Control + Send + Sync>;

/// A step that inspects runtime state and decides how the run continues.
///
/// The payload of the returned [`Control`] ends up in this task's result
/// slot. A conditional step has no commit or rollback behavior of its own.
pub struct ConditionalStep {
    condition: ConditionFn,
}

impl ConditionalStep {
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&Task) -> Control + Send + Sync + 'static,
    {
        Self {
            condition: Box::new(condition),
        }
    }
}

#[async_trait]
impl Step for ConditionalStep {
    fn name(&self) -> &str {
        "conditional"
    }

    async fn execute(&self, task: &Task) -> Result<Outcome, BoxError> {
        Ok(Outcome::Control((self.condition)(task)))
    }
}
