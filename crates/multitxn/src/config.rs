use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL: &str = "transaction";
pub const DEFAULT_ROLLBACK_MESSAGE: &str = "transaction rolled back by conditional task";

/// Settings of an [`Executor`](crate::Executor).
///
/// Deserializable so an embedding application can keep it in its own
/// configuration file; missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorConfig {
    /// Attached to every log event of the run.
    pub label: String,
    /// Error message for a rollback signal that carries no message.
    pub rollback_message: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            rollback_message: DEFAULT_ROLLBACK_MESSAGE.to_string(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_rollback_message(mut self, message: impl Into<String>) -> Self {
        self.rollback_message = message.into();
        self
    }
}
