//! Saga-style transactions over multiple resources.
//!
//! An [`Executor`] runs an ordered list of [`Task`]s, each bound to a
//! [`Context`] that knows how to commit or roll back the work done through
//! it. Tasks run strictly one after another. When they all succeed, every
//! distinct context is committed once. When one fails, every distinct context
//! touched before the failure is rolled back once, newest first.
//!
//! Three kinds of steps ship with the crate:
//!
//! - [`AtomicStep`]: a forward action with optional commit and rollback callbacks.
//! - [`ForkStep`]: builds further tasks at runtime and splices them in right after itself.
//! - [`ConditionalStep`]: returns a [`Control`] that continues, stops, or aborts the run.
//!
//! This is compensation, not atomic commit: if a commit fails after other
//! contexts committed, the rollback that follows is best effort.

mod atomic;
mod audit;
mod builder;
mod conditional;
mod config;
mod context;
mod error;
mod executor;
mod fork;
mod signal;
mod step;
mod task;

pub use atomic::AtomicStep;
pub use audit::{ContextRecord, ContextStatus, TaskRecord, TaskStatus, TxnAuditLog};
pub use builder::TaskBuilder;
pub use conditional::ConditionalStep;
pub use config::{DEFAULT_LABEL, DEFAULT_ROLLBACK_MESSAGE, ExecutorConfig};
pub use context::{Context, ContextState, FunctionContext, SharedContext};
pub use error::{BoxError, RollbackFailure, TaskPanic, TxnError};
pub use executor::Executor;
pub use fork::ForkStep;
pub use signal::{Control, Signal};
pub use step::{Outcome, Step};
pub use task::Task;

/// Re-exported so implementors of [`Step`] and [`Context`] use the same
/// macro version as the crate.
pub use async_trait::async_trait;
