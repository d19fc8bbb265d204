//! Top-level error rollup for workflow execution.
//!
//! Every module defines its own closed error enum; this file gathers them
//! into the single [`WorkflowError`] callers match on.

use std::time::Duration;

use thiserror::Error;

use relay_store::StoreError;

use crate::analyzer::AnalyzerError;
use crate::plan::PlanParseError;
use crate::provider::ProviderError;
use crate::template::TemplateError;

/// Anything that can stop a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A caller-supplied argument was blank or otherwise unusable.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The planner LM's output could not be parsed into a plan.
    #[error(transparent)]
    PlanParse(#[from] PlanParseError),

    /// A direct provider call failed (planning). Worker-side provider
    /// failures surface as [`WorkflowError::Execution`] for the task that
    /// made the call.
    #[error(transparent)]
    Provider(#[from] Box<ProviderError>),

    /// The plan failed static analysis (unknown reference, duplicate task,
    /// or dependency cycle).
    #[error(transparent)]
    Analysis(#[from] AnalyzerError),

    /// A template failed to render at execution time. The analyzer accepts
    /// only resolvable references, so this indicates a bug or a hand-built
    /// batch list that bypassed analysis.
    #[error("task {task:?} failed to render its template")]
    Template {
        task: String,
        #[source]
        source: TemplateError,
    },

    /// The memory store failed or refused an operation.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// A task failed, taking the workflow with it. Outputs persisted before
    /// the failure are kept, so resuming skips the completed tasks.
    #[error("task {task:?} failed: {cause}")]
    Execution { task: String, cause: String },

    /// No stored plan and none supplied by the caller.
    #[error("no plan found for workflow {0:?}")]
    PlanNotFound(String),

    /// A plan task was absent from every batch handed to the executor.
    #[error("task {0:?} was not scheduled in any batch")]
    UnscheduledTask(String),
}

impl WorkflowError {
    /// Build the execution error for a task that exceeded its deadline.
    pub(crate) fn task_timeout(task: &str, timeout: Duration) -> Self {
        Self::Execution {
            task: task.to_owned(),
            cause: format!("timed out after {timeout:?}"),
        }
    }
}
