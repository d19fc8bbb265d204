//! Parallel batch executor.
//!
//! Runs the analyzer's batches in order: every task in a batch is submitted
//! to a bounded worker pool and runs concurrently; batch N+1 starts only
//! after batch N fully completes. Tasks whose output is already persisted
//! are served from cache without touching an agent. On the first task
//! failure the remaining in-flight jobs of the batch are cancelled
//! cooperatively and the workflow fails; outputs persisted before the
//! failure stay in the store so a resume skips them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_store::{MemoryStore, TaskDefinition};

use crate::agent::{ExecutionInput, ExecutionResult, SubAgent};
use crate::error::WorkflowError;
use crate::template::{self, PREV_OUTPUT_VAR, USER_REQUEST_VAR};

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Worker-pool size: the most tasks allowed to run concurrently.
    pub workers: usize,
    /// Wall-time limit per task, covering the agent's rate-limiter wait and
    /// the provider call. Not retried: a timed-out task fails its workflow.
    pub task_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            task_timeout: Duration::from_secs(30),
        }
    }
}

/// Message sent from a spawned job back to the batch loop.
struct TaskDone {
    name: String,
    outcome: Outcome,
}

enum Outcome {
    Completed(String),
    Failed(WorkflowError),
    Cancelled,
}

/// Everything one spawned job needs, owned so the job is `'static`.
struct TaskJob {
    workflow_id: String,
    task: TaskDefinition,
    agent: SubAgent,
    user_request: String,
    prev_task: Option<String>,
    outputs: Arc<HashMap<String, String>>,
    store: MemoryStore,
    timeout: Duration,
}

/// Execute `batches` against the store, returning results in plan order.
///
/// `agent_factory` is called once per non-cached task to build the
/// sub-agent that will run it.
pub async fn execute_batches<F>(
    store: &MemoryStore,
    workflow_id: &str,
    user_request: &str,
    plan: &[TaskDefinition],
    batches: &[Vec<TaskDefinition>],
    agent_factory: F,
    config: &ExecutorConfig,
) -> Result<Vec<ExecutionResult>, WorkflowError>
where
    F: Fn(&TaskDefinition) -> SubAgent,
{
    // Plan position of each task, for `{{prev_output}}` bindings.
    let plan_index: HashMap<&str, usize> = plan
        .iter()
        .enumerate()
        .map(|(i, task)| (task.name.as_str(), i))
        .collect();

    let mut outputs = store.load_task_outputs(workflow_id).await?;
    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut results: HashMap<String, ExecutionResult> = HashMap::new();

    for (batch_no, batch) in batches.iter().enumerate() {
        let snapshot = Arc::new(outputs.clone());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel::<TaskDone>(batch.len().max(1));
        let mut in_flight = 0usize;

        for task in batch {
            if let Some(cached) = outputs.get(&task.name) {
                debug!(workflow_id, task = %task.name, "using cached output");
                results.insert(task.name.clone(), ExecutionResult::ok(cached.clone()));
                continue;
            }

            let prev_task = plan_index
                .get(task.name.as_str())
                .and_then(|&i| i.checked_sub(1))
                .map(|i| plan[i].name.clone());

            let job = TaskJob {
                workflow_id: workflow_id.to_owned(),
                task: task.clone(),
                agent: agent_factory(task),
                user_request: user_request.to_owned(),
                prev_task,
                outputs: Arc::clone(&snapshot),
                store: store.clone(),
                timeout: config.task_timeout,
            };
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let tx = tx.clone();
            in_flight += 1;

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let name = job.task.name.clone();
                let outcome = if cancel.is_cancelled() {
                    Outcome::Cancelled
                } else {
                    tokio::select! {
                        _ = cancel.cancelled() => Outcome::Cancelled,
                        outcome = run_task(job) => outcome,
                    }
                };
                let _ = tx.send(TaskDone { name, outcome }).await;
            });
        }
        drop(tx);

        // Wait for the whole batch; remember only the first failure.
        let mut batch_error: Option<WorkflowError> = None;
        while in_flight > 0 {
            let Some(done) = rx.recv().await else { break };
            in_flight -= 1;
            match done.outcome {
                Outcome::Completed(output) => {
                    outputs.insert(done.name.clone(), output.clone());
                    results.insert(done.name, ExecutionResult::ok(output));
                }
                Outcome::Failed(error) => {
                    warn!(workflow_id, task = %done.name, %error, "task failed, cancelling batch");
                    cancel.cancel();
                    batch_error.get_or_insert(error);
                }
                Outcome::Cancelled => {
                    debug!(workflow_id, task = %done.name, "task cancelled");
                }
            }
        }

        if let Some(error) = batch_error {
            return Err(error);
        }
        debug!(workflow_id, batch = batch_no, "batch complete");
    }

    // Results in plan order, regardless of completion order.
    let mut ordered = Vec::with_capacity(plan.len());
    for task in plan {
        match results.remove(&task.name) {
            Some(result) => ordered.push(result),
            None => return Err(WorkflowError::UnscheduledTask(task.name.clone())),
        }
    }

    info!(workflow_id, tasks = ordered.len(), "all batches complete");
    Ok(ordered)
}

/// Render, execute, and persist a single task.
async fn run_task(job: TaskJob) -> Outcome {
    let task_name = job.task.name.clone();

    let mut vars: HashMap<String, String> = job.outputs.as_ref().clone();
    vars.insert(USER_REQUEST_VAR.to_owned(), job.user_request);
    if let Some(prev) = &job.prev_task {
        if let Some(output) = job.outputs.get(prev) {
            vars.insert(PREV_OUTPUT_VAR.to_owned(), output.clone());
        }
    }

    let prompt = match template::render(&job.task.prompt_template, &vars) {
        Ok(prompt) => prompt,
        Err(source) => {
            return Outcome::Failed(WorkflowError::Template {
                task: task_name,
                source,
            });
        }
    };

    let execution = tokio::time::timeout(
        job.timeout,
        job.agent.execute(ExecutionInput::new(prompt)),
    )
    .await;

    let result = match execution {
        Ok(result) => result,
        Err(_) => {
            return Outcome::Failed(WorkflowError::task_timeout(&task_name, job.timeout));
        }
    };

    if !result.success {
        let cause = result
            .error
            .unwrap_or_else(|| "agent reported failure without detail".to_owned());
        return Outcome::Failed(WorkflowError::Execution {
            task: task_name,
            cause,
        });
    }

    if let Err(error) = job
        .store
        .save_task_output(&job.workflow_id, &task_name, &result.output)
        .await
    {
        return Outcome::Failed(WorkflowError::Storage(error));
    }

    debug!(workflow_id = %job.workflow_id, task = %task_name, "output persisted");
    Outcome::Completed(result.output)
}
