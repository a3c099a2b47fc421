//! End-to-end transactions mixing atomic, fork and conditional steps over the
//! shared function context.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Journal, callback_step, failing_step};
use multitxn::{
    AtomicStep, ConditionalStep, Control, Executor, ForkStep, FunctionContext, SharedContext,
    Task, TxnError,
};
use serde_json::{Value, json};

fn counting_task(context: &SharedContext, commits: &Arc<AtomicUsize>) -> Task {
    let commits = Arc::clone(commits);
    Task::new(
        context.clone(),
        AtomicStep::new(|_task| async { Ok(()) }).on_commit(move |_task| {
            let commits = Arc::clone(&commits);
            async move {
                commits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
}

fn pick(context: &SharedContext, name: &'static str) -> Task {
    Task::builder(
        context.clone(),
        AtomicStep::new(|task| async move {
            let name = task.params().cloned().unwrap_or(Value::Null);
            task.set_result(name);
            Ok(())
        }),
    )
    .name("pick")
    .params(json!(name))
    .build()
}

fn greeting(context: &SharedContext, name: &str) -> Task {
    Task::builder(
        context.clone(),
        AtomicStep::new(|task| async move {
            task.set_result(json!(format!("hello {}", task.name())));
            Ok(())
        }),
    )
    .name(name)
    .build()
}

#[tokio::test]
async fn two_successful_tasks_commit_each_once() -> anyhow::Result<()> {
    let functions = FunctionContext::new_shared("functions");
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let mut executor = Executor::new();
    executor
        .add_task(counting_task(&functions, &first))
        .add_task(counting_task(&functions, &second));

    let tasks = executor.run().await?;

    assert_eq!(tasks.len(), 2);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failing_middle_task_rolls_back_first_and_skips_last() -> anyhow::Result<()> {
    let journal = Journal::new();
    let functions = FunctionContext::new_shared("functions");

    let mut executor = Executor::new();
    executor
        .add_task(callback_step(&functions, "one", &journal))
        .add_task(failing_step(&functions, "two", "X", &journal))
        .add_task(callback_step(&functions, "three", &journal));

    let err = executor.run().await.expect_err("two fails");

    match err {
        TxnError::Execution { source, .. } => assert_eq!(source.to_string(), "X"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(journal.count("rollback one"), 1);
    assert!(!journal.contains("run three"));
    assert!(!journal.contains("rollback three"));
    assert!(!journal.contains("commit one"));
    Ok(())
}

async fn run_greeting_branch(selected: &'static str) -> anyhow::Result<(Task, Task)> {
    let functions = FunctionContext::new_shared("functions");
    let bob = greeting(&functions, "bob");
    let kevin = greeting(&functions, "kevin");

    let picked = pick(&functions, selected);
    let source = picked.clone();
    let (bob_branch, kevin_branch) = (bob.clone(), kevin.clone());
    let branch = Task::new(
        functions.clone(),
        ForkStep::new(move |_task| match source.result() {
            Some(Value::String(name)) if name == "Bob" => Ok(vec![bob_branch.clone()]),
            Some(Value::String(name)) if name == "Kevin" => Ok(vec![kevin_branch.clone()]),
            other => Err(format!("unexpected pick {other:?}").into()),
        }),
    );

    let mut executor = Executor::new();
    executor.add_task(picked).add_task(branch);
    executor.run().await?;

    Ok((bob, kevin))
}

#[tokio::test]
async fn fork_injects_only_the_branch_matching_an_earlier_result() -> anyhow::Result<()> {
    let (bob, kevin) = run_greeting_branch("Bob").await?;
    assert_eq!(bob.result(), Some(json!("hello bob")));
    assert!(kevin.result().is_none());

    let (bob, kevin) = run_greeting_branch("Kevin").await?;
    assert!(bob.result().is_none());
    assert_eq!(kevin.result(), Some(json!("hello kevin")));
    Ok(())
}

async fn run_guarded(selected: &'static str) -> Result<Vec<Task>, TxnError> {
    let functions = FunctionContext::new_shared("functions");
    let picked = pick(&functions, selected);
    let source = picked.clone();

    let guard = Task::new(
        functions.clone(),
        ConditionalStep::new(move |_task| {
            if source.result() == Some(json!("Dave")) {
                Control::rollback().with_message("Dave is not invited")
            } else {
                Control::proceed()
            }
        }),
    );

    let mut executor = Executor::new();
    executor
        .add_task(picked)
        .add_task(guard)
        .add_task(greeting(&functions, "party"));
    executor.run().await
}

#[tokio::test]
async fn conditional_rolls_back_only_for_the_rejected_value() -> anyhow::Result<()> {
    assert_eq!(run_guarded("Bob").await?.len(), 3);
    assert_eq!(run_guarded("Kevin").await?.len(), 3);

    let err = run_guarded("Dave").await.expect_err("Dave aborts the run");
    assert_eq!(err.to_string(), "Dave is not invited");
    Ok(())
}

#[tokio::test]
async fn shared_function_context_serves_many_executors() -> anyhow::Result<()> {
    let shared = FunctionContext::shared();
    let commits = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let mut executor = Executor::new();
        executor.add_task(counting_task(&shared, &commits));
        executor.run().await?;
    }

    assert_eq!(commits.load(Ordering::SeqCst), 3);
    Ok(())
}
