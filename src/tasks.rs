//! Concurrent initialization tasks
//!
//! Every task is driven to completion. A failing `Required` task fails the
//! whole batch; a failing `BestEffort` task is logged and recorded in the
//! report instead.

use crate::error::{BridgeError, Result};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPolicy {
    Required,
    BestEffort,
}

pub struct InitTask {
    label: String,
    policy: TaskPolicy,
    future: BoxFuture<'static, Result<()>>,
}

impl InitTask {
    pub fn required<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(label, TaskPolicy::Required, future)
    }

    pub fn best_effort<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(label, TaskPolicy::BestEffort, future)
    }

    fn new<F>(label: impl Into<String>, policy: TaskPolicy, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        InitTask {
            label: label.into(),
            policy,
            future: future.boxed(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn policy(&self) -> TaskPolicy {
        self.policy
    }
}

/// A best-effort failure that was absorbed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsorbedFailure {
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Labels of tasks that succeeded, in submission order
    pub completed: Vec<String>,
    pub absorbed: Vec<AbsorbedFailure>,
}

/// Run all tasks concurrently and wait for every one of them.
///
/// Returns the first required failure in submission order, if any.
pub async fn run_all(tasks: Vec<InitTask>) -> Result<TaskReport> {
    let (meta, futures): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .map(|task| ((task.label, task.policy), task.future))
        .unzip();

    let results = join_all(futures).await;

    let mut report = TaskReport::default();
    let mut first_failure: Option<BridgeError> = None;
    for ((label, policy), result) in meta.into_iter().zip(results) {
        match (result, policy) {
            (Ok(()), _) => {
                tracing::debug!(task = %label, "init task done");
                report.completed.push(label);
            }
            (Err(err), TaskPolicy::BestEffort) => {
                tracing::warn!(task = %label, error = %err, "[{}] init failed", label);
                report.absorbed.push(AbsorbedFailure {
                    label,
                    message: err.to_string(),
                });
            }
            (Err(err), TaskPolicy::Required) => {
                tracing::error!(task = %label, error = %err, "required init task failed");
                first_failure.get_or_insert(err);
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}
