use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::builder::TaskBuilder;
use crate::context::SharedContext;
use crate::error::BoxError;
use crate::step::{Outcome, Step};

/// A unit of work bound to a [`Context`](crate::Context).
///
/// `Task` is a cheap handle: clones share the same step, params and result
/// slot. Keep a clone of a task to read its result after the run, or to hand
/// a pre-built task to a fork step.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    name: String,
    binding: Option<Binding>,
    params: Option<Value>,
    result: Mutex<Option<Value>>,
}

struct Binding {
    context: SharedContext,
    step: Box<dyn Step>,
}

impl Task {
    /// Create a task running `step` within `context`.
    pub fn new<S>(context: SharedContext, step: S) -> Self
    where
        S: Step + 'static,
    {
        TaskBuilder::new(context, step).build()
    }

    /// Start building a task with a custom name or params.
    pub fn builder<S>(context: SharedContext, step: S) -> TaskBuilder
    where
        S: Step + 'static,
    {
        TaskBuilder::new(context, step)
    }

    /// An empty list entry.
    ///
    /// Placeholders have no context and no step. The executor skips them
    /// without treating them as failures.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                name: "placeholder".to_string(),
                binding: None,
                params: None,
                result: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        context: SharedContext,
        step: Box<dyn Step>,
        params: Option<Value>,
    ) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                name,
                binding: Some(Binding { context, step }),
                params,
                result: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The context this task is bound to; `None` for placeholders.
    #[must_use]
    pub fn context(&self) -> Option<&SharedContext> {
        self.inner.binding.as_ref().map(|binding| &binding.context)
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.inner.binding.is_none()
    }

    /// Params given at construction.
    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.inner.params.as_ref()
    }

    /// Current content of the result slot.
    #[must_use]
    pub fn result(&self) -> Option<Value> {
        self.slot().clone()
    }

    /// Replace the content of the result slot.
    pub fn set_result(&self, value: Value) {
        *self.slot() = Some(value);
    }

    /// Empty the result slot, returning what it held.
    pub fn take_result(&self) -> Option<Value> {
        self.slot().take()
    }

    /// Whether two handles refer to the same task.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this task is bound to `context`, compared by identity.
    #[must_use]
    pub fn is_bound_to(&self, context: &SharedContext) -> bool {
        self.context().is_some_and(|own| Arc::ptr_eq(own, context))
    }

    pub(crate) async fn execute(&self) -> Result<Outcome, BoxError> {
        match &self.inner.binding {
            Some(binding) => binding.step.execute(self).await,
            None => Ok(Outcome::Done),
        }
    }

    /// Run the step's commit hook.
    ///
    /// # Errors
    ///
    /// Returns the error from the step's commit hook.
    pub async fn commit(&self) -> Result<(), BoxError> {
        match &self.inner.binding {
            Some(binding) => binding.step.commit(self).await,
            None => Ok(()),
        }
    }

    /// Run the step's rollback hook.
    ///
    /// # Errors
    ///
    /// Returns the error from the step's rollback hook.
    pub async fn rollback(&self) -> Result<(), BoxError> {
        match &self.inner.binding {
            Some(binding) => binding.step.rollback(self).await,
            None => Ok(()),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Value>> {
        self.inner
            .result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("context", &self.context().map(|context| context.name()))
            .field("params", &self.params())
            .field("result", &self.result())
            .finish()
    }
}
