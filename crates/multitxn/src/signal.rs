use serde_json::Value;

/// How a conditional task wants the forward pass to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Keep dispatching tasks.
    Continue,
    /// Stop dispatching and commit what ran so far.
    Break,
    /// Stop dispatching and roll back everything that ran so far.
    BreakAndRollback,
}

/// A [`Signal`] together with an optional payload and message.
///
/// The payload replaces the content of the result slot of the task that
/// returned it. A control without payload empties that slot.
/// The message only matters for [`Signal::BreakAndRollback`], where it becomes
/// the message of the resulting error.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    signal: Signal,
    payload: Option<Value>,
    message: Option<String>,
}

impl Control {
    #[must_use]
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            payload: None,
            message: None,
        }
    }

    /// Keep running the remaining tasks.
    #[must_use]
    pub fn proceed() -> Self {
        Self::new(Signal::Continue)
    }

    /// End the run successfully without dispatching the remaining tasks.
    #[must_use]
    pub fn stop() -> Self {
        Self::new(Signal::Break)
    }

    /// End the run as a failure and roll back the dispatched tasks.
    #[must_use]
    pub fn rollback() -> Self {
        Self::new(Signal::BreakAndRollback)
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub(crate) fn into_parts(self) -> (Signal, Option<Value>, Option<String>) {
        (self.signal, self.payload, self.message)
    }
}
