use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::audit::{ContextStatus, TaskStatus, TxnAuditLog};
use crate::config::ExecutorConfig;
use crate::context::SharedContext;
use crate::error::{RollbackFailure, TaskPanic, TxnError, settle};
use crate::signal::Signal;
use crate::step::Outcome;
use crate::task::Task;

/// Runs a list of tasks as one all-or-nothing transaction.
///
/// Tasks run one at a time, in list order. When every task has run (or a
/// conditional task breaks out early), each distinct context touched by the
/// run is committed once, concurrently with the others. When a task fails,
/// each distinct context touched by the tasks that completed before it is
/// rolled back once, newest first.
///
/// An executor is meant for a single run. Calling [`Executor::run`] again
/// re-runs the whole list against contexts that already committed or rolled
/// back, which is rarely what anyone wants.
///
/// # Limitations
///
/// Commits are not atomic across contexts. If one context fails to commit
/// after another already committed, every touched context is asked to roll
/// back, including the committed ones, and it is up to each context whether
/// that can undo anything.
///
/// The task that fails is not compensated, and neither is its context unless
/// an earlier task shares it. A context initialized for the failing task is
/// therefore left initialized and is neither committed nor rolled back; a
/// context that acquires resources in [`Context::init`](crate::Context::init)
/// should release them in the failing task itself.
///
/// A panic inside a commit or rollback is handled like an error returned by
/// it: a panicking commit fails the run and triggers rollback, a panicking
/// rollback is logged.
#[derive(Debug, Default)]
pub struct Executor {
    tasks: Vec<Task>,
    cursor: usize,
    config: ExecutorConfig,
}

/// Why the forward pass stopped, and how many tasks completed before it did.
struct Abort {
    error: TxnError,
    completed: usize,
}

impl Executor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            tasks: Vec::new(),
            cursor: 0,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Append a task to the end of the list.
    pub fn add_task(&mut self, task: Task) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Append several tasks, keeping their order.
    pub fn extend<I>(&mut self, tasks: I) -> &mut Self
    where
        I: IntoIterator<Item = Task>,
    {
        self.tasks.extend(tasks);
        self
    }

    /// The task list, including tasks spliced in by fork steps.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Number of tasks dispatched so far in the current run. Zero outside a run.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run the transaction, returning the final task list on success.
    ///
    /// # Errors
    ///
    /// Returns the root cause of the failure after the rollback phase has
    /// settled: a task error, a context init error, a rollback requested by a
    /// conditional task, or a commit error. Rollback errors are only logged.
    pub async fn run(&mut self) -> Result<Vec<Task>, TxnError> {
        let (result, _audit_log) = self.run_with_audit().await;
        result
    }

    /// Run the transaction and return both the result and an audit log.
    pub async fn run_with_audit(&mut self) -> (Result<Vec<Task>, TxnError>, TxnAuditLog) {
        let mut audit_log = TxnAuditLog::new();
        let span = info_span!("transaction", label = %self.config.label);
        let result = self.run_internal(&mut audit_log).instrument(span).await;
        (result, audit_log)
    }

    async fn run_internal(&mut self, audit_log: &mut TxnAuditLog) -> Result<Vec<Task>, TxnError> {
        if self.tasks.is_empty() {
            debug!("empty task list, resolving");
            return Ok(Vec::new());
        }

        let result = match self.forward_pass(audit_log).await {
            Ok(()) => match self.commit_all(audit_log).await {
                Ok(()) => Ok(self.tasks.clone()),
                Err(error) => {
                    error!(%error, "failed to commit, rolling back");
                    self.rollback_all(self.cursor, audit_log).await;
                    Err(error)
                }
            },
            Err(Abort { error, completed }) => {
                error!(%error, "transaction chain failed");
                self.rollback_all(completed, audit_log).await;
                Err(error)
            }
        };

        self.cursor = 0;
        result
    }

    async fn forward_pass(&mut self, audit_log: &mut TxnAuditLog) -> Result<(), Abort> {
        while self.cursor < self.tasks.len() {
            let index = self.cursor;
            let task = self.tasks[index].clone();
            self.cursor += 1;
            audit_log.record_start(index, task.name());

            let Some(context) = task.context().cloned() else {
                debug!(index, "skipping empty entry");
                audit_log.record_finish(TaskStatus::Skipped);
                continue;
            };

            let initialized = context.is_initialized();
            debug!(context = context.name(), initialized, "checking context");
            if !initialized {
                if let Err(source) = context.init().await {
                    error!(context = context.name(), error = %source, "context init failed");
                    audit_log.record_finish(TaskStatus::Failed);
                    return Err(Abort {
                        error: TxnError::ContextInit {
                            context: context.name().to_string(),
                            index,
                            source,
                        },
                        completed: index,
                    });
                }
            }

            let outcome = match AssertUnwindSafe(task.execute()).catch_unwind().await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(source)) => {
                    error!(task = task.name(), index, error = %source, "task failed");
                    audit_log.record_finish(TaskStatus::Failed);
                    return Err(Abort {
                        error: TxnError::Execution {
                            task: task.name().to_string(),
                            index,
                            source,
                        },
                        completed: index,
                    });
                }
                Err(panic) => {
                    let panic = TaskPanic::from_payload(panic.as_ref());
                    error!(task = task.name(), index, %panic, "task panicked");
                    audit_log.record_finish(TaskStatus::Failed);
                    return Err(Abort {
                        error: TxnError::Execution {
                            task: task.name().to_string(),
                            index,
                            source: Box::new(panic),
                        },
                        completed: index,
                    });
                }
            };

            match outcome {
                Outcome::Done => audit_log.record_finish(TaskStatus::Executed),
                Outcome::Fork(new_tasks) => {
                    let count = new_tasks.len();
                    debug!(task = task.name(), count, at = self.cursor, "splicing forked tasks");
                    self.tasks.splice(self.cursor..self.cursor, new_tasks);
                    audit_log.record_finish(TaskStatus::Forked(count));
                }
                Outcome::Control(control) => {
                    let (signal, payload, message) = control.into_parts();
                    match payload {
                        Some(payload) => task.set_result(payload),
                        None => {
                            task.take_result();
                        }
                    }
                    audit_log.record_finish(TaskStatus::Signalled(signal));

                    match signal {
                        Signal::Continue => {
                            debug!(task = task.name(), "condition met, continuing");
                        }
                        Signal::Break => {
                            debug!(task = task.name(), "quitting without rollback");
                            return Ok(());
                        }
                        Signal::BreakAndRollback => {
                            debug!(task = task.name(), "quitting with rollback");
                            return Err(Abort {
                                error: TxnError::ConditionRollback {
                                    task: task.name().to_string(),
                                    index,
                                    message: message
                                        .unwrap_or_else(|| self.config.rollback_message.clone()),
                                },
                                completed: index,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn commit_all(&self, audit_log: &mut TxnAuditLog) -> Result<(), TxnError> {
        let groups = group_by_context(self.tasks[..self.cursor].iter());
        let results = join_all(
            groups
                .iter()
                .map(|(context, tasks)| settle(context.commit(tasks))),
        )
        .await;

        let mut first_error = None;
        for ((context, _), result) in groups.iter().zip(results) {
            match result {
                Ok(()) => audit_log.record_context(context.name(), ContextStatus::Committed, None),
                Err(source) => {
                    error!(context = context.name(), error = %source, "context commit failed");
                    audit_log.record_context(
                        context.name(),
                        ContextStatus::CommitFailed,
                        Some(source.to_string()),
                    );
                    if first_error.is_none() {
                        first_error = Some(TxnError::Commit {
                            context: context.name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                info!(contexts = groups.len(), "transaction chain completed");
                Ok(())
            }
        }
    }

    /// Roll back the contexts of the first `completed` tasks, newest first.
    /// Waits for every rollback to settle; failures are logged, not returned.
    async fn rollback_all(&self, completed: usize, audit_log: &mut TxnAuditLog) {
        let groups = group_by_context(self.tasks[..completed].iter().rev());
        let results = join_all(
            groups
                .iter()
                .map(|(context, tasks)| settle(context.rollback(tasks))),
        )
        .await;

        for ((context, _), result) in groups.iter().zip(results) {
            match result {
                Ok(()) => audit_log.record_context(context.name(), ContextStatus::RolledBack, None),
                Err(source) => {
                    let failure = RollbackFailure {
                        context: context.name().to_string(),
                        source,
                    };
                    warn!(error = %failure, "context rollback failed");
                    audit_log.record_context(
                        context.name(),
                        ContextStatus::RollbackFailed,
                        Some(failure.source.to_string()),
                    );
                }
            }
        }

        info!(contexts = groups.len(), "transaction chain rolled back");
    }
}

/// Group tasks by context identity, keeping contexts in first-occurrence
/// order and each context's tasks in iteration order. Empty entries are left
/// out.
fn group_by_context<'a, I>(tasks: I) -> Vec<(SharedContext, Vec<Task>)>
where
    I: Iterator<Item = &'a Task>,
{
    let mut groups: IndexMap<*const (), (SharedContext, Vec<Task>)> = IndexMap::new();
    for task in tasks {
        if let Some(context) = task.context() {
            groups
                .entry(Arc::as_ptr(context).cast::<()>())
                .or_insert_with(|| (Arc::clone(context), Vec::new()))
                .1
                .push(task.clone());
        }
    }
    groups.into_values().collect()
}
