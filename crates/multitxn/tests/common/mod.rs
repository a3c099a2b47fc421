//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use multitxn::{AtomicStep, BoxError, Context, SharedContext, Task, async_trait};

/// Ordered record of everything that happened across tasks and contexts.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("journal lock").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock").clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.count(entry) > 0
    }
}

#[derive(Clone, Copy, Default)]
pub struct Failures {
    pub init: bool,
    pub commit: bool,
    pub rollback: bool,
}

/// Context that writes its init/commit/rollback calls to a [`Journal`].
pub struct RecordingContext {
    name: String,
    journal: Journal,
    failures: Failures,
    initialized: AtomicBool,
    inits: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    committed_tasks: Mutex<Vec<String>>,
    rolled_back_tasks: Mutex<Vec<String>>,
}

impl RecordingContext {
    pub fn new(name: &str, journal: &Journal) -> Arc<Self> {
        Self::with_failures(name, journal, Failures::default())
    }

    pub fn with_failures(name: &str, journal: &Journal, failures: Failures) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            failures,
            initialized: AtomicBool::new(false),
            inits: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            committed_tasks: Mutex::new(Vec::new()),
            rolled_back_tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(self: &Arc<Self>) -> SharedContext {
        Arc::clone(self) as SharedContext
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn committed_tasks(&self) -> Vec<String> {
        self.committed_tasks.lock().expect("tasks lock").clone()
    }

    pub fn rolled_back_tasks(&self) -> Vec<String> {
        self.rolled_back_tasks.lock().expect("tasks lock").clone()
    }
}

fn names(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|task| task.name().to_string()).collect()
}

#[async_trait]
impl Context for RecordingContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn init(&self) -> Result<(), BoxError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("init {}", self.name));
        if self.failures.init {
            return Err(format!("{} unavailable", self.name).into());
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self, tasks: &[Task]) -> Result<(), BoxError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("commit {}", self.name));
        *self.committed_tasks.lock().expect("tasks lock") = names(tasks);
        if self.failures.commit {
            return Err(format!("{} refused commit", self.name).into());
        }
        Ok(())
    }

    async fn rollback(&self, tasks: &[Task]) -> Result<(), BoxError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("rollback {}", self.name));
        *self.rolled_back_tasks.lock().expect("tasks lock") = names(tasks);
        if self.failures.rollback {
            return Err(format!("{} refused rollback", self.name).into());
        }
        Ok(())
    }
}

/// Task that records `run <name>` when executed.
pub fn step(context: &SharedContext, name: &str, journal: &Journal) -> Task {
    let journal = journal.clone();
    let entry = format!("run {name}");
    Task::builder(
        context.clone(),
        AtomicStep::new(move |_task| {
            let journal = journal.clone();
            let entry = entry.clone();
            async move {
                journal.push(entry);
                Ok(())
            }
        }),
    )
    .name(name)
    .build()
}

/// Task that records `run <name>` and then fails with `message`.
pub fn failing_step(context: &SharedContext, name: &str, message: &str, journal: &Journal) -> Task {
    let journal = journal.clone();
    let entry = format!("run {name}");
    let message = message.to_string();
    Task::builder(
        context.clone(),
        AtomicStep::new(move |_task| {
            let journal = journal.clone();
            let entry = entry.clone();
            let message = message.clone();
            async move {
                journal.push(entry);
                Err(message.into())
            }
        }),
    )
    .name(name)
    .build()
}

/// Task with commit and rollback callbacks that record
/// `run|commit|rollback <name>`, meant for a `FunctionContext`.
pub fn callback_step(context: &SharedContext, name: &str, journal: &Journal) -> Task {
    let (run, commit, rollback) = (journal.clone(), journal.clone(), journal.clone());
    Task::builder(
        context.clone(),
        AtomicStep::new(move |task| {
            let journal = run.clone();
            async move {
                journal.push(format!("run {}", task.name()));
                Ok(())
            }
        })
        .on_commit(move |task| {
            let journal = commit.clone();
            async move {
                journal.push(format!("commit {}", task.name()));
                Ok(())
            }
        })
        .on_rollback(move |task| {
            let journal = rollback.clone();
            async move {
                journal.push(format!("rollback {}", task.name()));
                Ok(())
            }
        }),
    )
    .name(name)
    .build()
}
