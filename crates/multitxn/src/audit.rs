use std::time::Instant;

use crate::signal::Signal;

/// What happened to a task during the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskStatus {
    /// Task is running or finished without altering the run.
    Executed,
    /// Task spliced this many new tasks into the list.
    Forked(usize),
    /// Task returned a control signal.
    Signalled(Signal),
    /// Task or its context initialization failed.
    Failed,
    /// Placeholder entry, nothing ran.
    Skipped,
}

/// Record of a dispatched task.
#[derive(Debug)]
pub struct TaskRecord {
    /// Position of the task in the list at dispatch time.
    pub index: usize,
    pub name: String,
    pub status: TaskStatus,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

/// Outcome of a context's commit or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextStatus {
    Committed,
    CommitFailed,
    RolledBack,
    RollbackFailed,
}

/// Record of a context's commit or rollback.
#[derive(Debug)]
pub struct ContextRecord {
    pub name: String,
    pub status: ContextStatus,
    /// Error message for the failed statuses.
    pub error: Option<String>,
    pub completed_at: Instant,
}

/// Audit log of one transaction run.
#[derive(Debug, Default)]
pub struct TxnAuditLog {
    tasks: Vec<TaskRecord>,
    contexts: Vec<ContextRecord>,
}

impl TxnAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, index: usize, name: &str) {
        self.tasks.push(TaskRecord {
            index,
            name: name.to_string(),
            status: TaskStatus::Executed,
            started_at: Instant::now(),
            completed_at: None,
        });
    }

    /// Mark the last dispatched task with its final status.
    pub(crate) fn record_finish(&mut self, status: TaskStatus) {
        if let Some(record) = self.tasks.last_mut() {
            record.status = status;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_context(&mut self, name: &str, status: ContextStatus, error: Option<String>) {
        self.contexts.push(ContextRecord {
            name: name.to_string(),
            status,
            error,
            completed_at: Instant::now(),
        });
    }

    #[must_use]
    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    #[must_use]
    pub fn contexts(&self) -> &[ContextRecord] {
        &self.contexts
    }

    /// Names of the tasks that were dispatched, in dispatch order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<&str> {
        self.tasks.iter().map(|record| record.name.as_str()).collect()
    }

    /// Names of the contexts that ended with `status`.
    #[must_use]
    pub fn contexts_with(&self, status: ContextStatus) -> Vec<&str> {
        self.contexts
            .iter()
            .filter(|record| record.status == status)
            .map(|record| record.name.as_str())
            .collect()
    }

    /// Get a summary of the run for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.tasks {
            let status = match record.status {
                TaskStatus::Executed => "✓".to_string(),
                TaskStatus::Forked(count) => format!("+{count}"),
                TaskStatus::Signalled(Signal::Continue) => "→".to_string(),
                TaskStatus::Signalled(Signal::Break) => "■".to_string(),
                TaskStatus::Signalled(Signal::BreakAndRollback) => "✗".to_string(),
                TaskStatus::Failed => "✗".to_string(),
                TaskStatus::Skipped => "·".to_string(),
            };
            lines.push(format!("{status} #{} {}", record.index, record.name));
        }
        for record in &self.contexts {
            let status = match record.status {
                ContextStatus::Committed => "✓ commit",
                ContextStatus::CommitFailed => "✗ commit",
                ContextStatus::RolledBack => "↩ rollback",
                ContextStatus::RollbackFailed => "⚠ rollback",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }
}
