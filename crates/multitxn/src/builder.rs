use serde_json::Value;

use crate::context::SharedContext;
use crate::step::Step;
use crate::task::Task;

/// Builder for a [`Task`] with a custom name or params.
///
/// The context is fixed here and cannot be reassigned once the task is built.
///
/// ```
/// use multitxn::{AtomicStep, FunctionContext, Task};
/// use serde_json::json;
///
/// let task = Task::builder(
///     FunctionContext::shared(),
///     AtomicStep::new(|task| async move {
///         let amount = task.params().cloned().unwrap_or_default();
///         task.set_result(amount);
///         Ok(())
///     }),
/// )
/// .name("reserve")
/// .params(json!(42))
/// .build();
///
/// assert_eq!(task.name(), "reserve");
/// assert_eq!(task.params(), Some(&json!(42)));
/// ```
pub struct TaskBuilder {
    context: SharedContext,
    step: Box<dyn Step>,
    name: Option<String>,
    params: Option<Value>,
}

impl TaskBuilder {
    pub(crate) fn new<S>(context: SharedContext, step: S) -> Self
    where
        S: Step + 'static,
    {
        Self {
            context,
            step: Box::new(step),
            name: None,
            params: None,
        }
    }

    /// Name used in logs, errors and the audit log.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Opaque params the step can read through [`Task::params`].
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn build(self) -> Task {
        let name = self
            .name
            .unwrap_or_else(|| self.step.name().to_string());
        Task::from_parts(name, self.context, self.step, self.params)
    }
}
