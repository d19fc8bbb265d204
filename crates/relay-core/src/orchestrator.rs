//! The planner orchestrator: the library's end-to-end entry points.
//!
//! `run_workflow` drives the whole pipeline: load-or-plan, durable plan
//! storage, dependency layering, and parallel execution with memoized
//! resume. `plan_and_execute` and `resume_workflow` are the explicit
//! variants for callers that know which path they want.

use std::sync::Arc;

use tracing::info;

use relay_store::{MemoryStore, TaskDefinition, WorkflowState};

use crate::agent::{ExecutionResult, SubAgent};
use crate::analyzer;
use crate::config::CoreConfig;
use crate::error::WorkflowError;
use crate::executor;
use crate::plan;
use crate::provider::Provider;

/// Run a workflow end to end.
///
/// If a plan is already stored under `workflow_id` it is reused verbatim and
/// the planner is never called; otherwise the planner LM produces one, which
/// is saved before any task runs. Execution skips every task with a
/// persisted output, so re-invoking with the same id after a crash or a
/// partial failure resumes instead of redoing work.
///
/// Results come back in plan order.
pub async fn run_workflow(
    store: &MemoryStore,
    workflow_id: &str,
    user_request: &str,
    planner: &Provider,
    worker: Arc<Provider>,
    config: &CoreConfig,
) -> Result<Vec<ExecutionResult>, WorkflowError> {
    validate_args(workflow_id, user_request)?;

    let plan = match store.load_plan(workflow_id).await? {
        Some(plan) => {
            info!(workflow_id, tasks = plan.len(), "reusing stored plan");
            plan
        }
        None => {
            let plan = plan::make_plan(planner, user_request).await?;
            store.save_plan(workflow_id, &plan).await?;
            info!(workflow_id, tasks = plan.len(), "plan saved");
            plan
        }
    };

    execute_plan(store, workflow_id, user_request, &plan, worker, config).await
}

/// Force a fresh plan. Fails with [`relay_store::StoreError::AlreadyExists`]
/// (wrapped in [`WorkflowError::Storage`]) when the workflow already has
/// one; the planner is not consulted in that case.
pub async fn plan_and_execute(
    store: &MemoryStore,
    workflow_id: &str,
    user_request: &str,
    planner: &Provider,
    worker: Arc<Provider>,
    config: &CoreConfig,
) -> Result<Vec<ExecutionResult>, WorkflowError> {
    validate_args(workflow_id, user_request)?;

    if store.load_plan(workflow_id).await?.is_some() {
        return Err(WorkflowError::Storage(
            relay_store::StoreError::AlreadyExists(workflow_id.to_owned()),
        ));
    }

    let plan = plan::make_plan(planner, user_request).await?;
    store.save_plan(workflow_id, &plan).await?;
    info!(workflow_id, tasks = plan.len(), "plan saved");

    execute_plan(store, workflow_id, user_request, &plan, worker, config).await
}

/// Resume a workflow without planning.
///
/// Uses `plan` when given (persisting it if the store has none yet so later
/// resumes see the same plan); otherwise loads the stored plan. Fails with
/// [`WorkflowError::PlanNotFound`] when neither exists.
pub async fn resume_workflow(
    store: &MemoryStore,
    workflow_id: &str,
    user_request: &str,
    worker: Arc<Provider>,
    plan: Option<Vec<TaskDefinition>>,
    config: &CoreConfig,
) -> Result<Vec<ExecutionResult>, WorkflowError> {
    validate_args(workflow_id, user_request)?;

    let plan = match plan {
        Some(plan) => {
            if store.load_plan(workflow_id).await?.is_none() {
                store.save_plan(workflow_id, &plan).await?;
            }
            plan
        }
        None => store
            .load_plan(workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::PlanNotFound(workflow_id.to_owned()))?,
    };

    info!(workflow_id, tasks = plan.len(), "resuming workflow");
    execute_plan(store, workflow_id, user_request, &plan, worker, config).await
}

/// The workflow's lifecycle state, inferred from the store.
pub async fn workflow_state(
    store: &MemoryStore,
    workflow_id: &str,
) -> Result<WorkflowState, WorkflowError> {
    Ok(store.workflow_state(workflow_id).await?)
}

async fn execute_plan(
    store: &MemoryStore,
    workflow_id: &str,
    user_request: &str,
    plan: &[TaskDefinition],
    worker: Arc<Provider>,
    config: &CoreConfig,
) -> Result<Vec<ExecutionResult>, WorkflowError> {
    let batches = analyzer::analyze(plan)?;
    let report = analyzer::analyze_parallelism_benefit(&batches);
    info!(
        workflow_id,
        total_tasks = report.total_tasks,
        batch_count = report.batch_count,
        max_batch_size = report.max_batch_size,
        speedup_potential = report.speedup_potential,
        "plan layered"
    );

    // One implicit agent per task: the task description becomes the agent's
    // system-prompt context, the uuid suffix keeps memory scopes apart.
    let factory = |task: &TaskDefinition| {
        SubAgent::implicit(
            &task.name,
            task.description.clone(),
            Arc::clone(&worker),
            store.clone(),
        )
    };

    executor::execute_batches(
        store,
        workflow_id,
        user_request,
        plan,
        &batches,
        factory,
        &config.executor,
    )
    .await
}

fn validate_args(workflow_id: &str, user_request: &str) -> Result<(), WorkflowError> {
    if workflow_id.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "workflow_id must not be blank".to_owned(),
        ));
    }
    if user_request.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "user_request must not be blank".to_owned(),
        ));
    }
    Ok(())
}
