//! Stage-based workflow engine.
//!
//! A simpler, strictly linear driver that bypasses the planner, the
//! analyzer, and the batch executor. Stages run in declaration order; each
//! renders its template against the accumulated variable map, where
//! `{{<stage_name>}}` resolves to a prior stage's output and
//! `{{prev_output}}` to the immediately preceding one. An optional
//! validator can reject a stage's output, triggering a bounded re-run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use relay_store::MemoryStore;

use crate::agent::{ExecutionInput, ExecutionResult, SubAgent};
use crate::error::WorkflowError;
use crate::provider::Provider;
use crate::template::{self, PREV_OUTPUT_VAR, USER_REQUEST_VAR};

/// Verdict returned by a stage validator.
#[derive(Debug, Clone)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Checks a stage's output before it is accepted.
pub type StageValidator = Box<dyn Fn(&str) -> Validation + Send + Sync>;

/// One step in a linear workflow.
pub struct Stage {
    pub name: String,
    pub prompt_template: String,
    pub validator: Option<StageValidator>,
    /// Re-runs allowed after a validator rejection (0 = single attempt).
    pub max_retries: u32,
}

impl Stage {
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            validator: None,
            max_retries: 0,
        }
    }

    pub fn with_validator(mut self, validator: StageValidator, max_retries: u32) -> Self {
        self.validator = Some(validator);
        self.max_retries = max_retries;
        self
    }
}

/// What to do when a stage fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and stop the run (default).
    #[default]
    Stop,
    /// Record the failure and move on to the next stage.
    Continue,
}

/// Result of one stage.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: String,
    pub result: ExecutionResult,
    /// Executions performed, including validator-triggered re-runs.
    pub attempts: u32,
}

/// The linear driver.
pub struct StageEngine {
    stages: Vec<Stage>,
    on_failure: FailurePolicy,
}

impl StageEngine {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            on_failure: FailurePolicy::Stop,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Run all stages in order.
    ///
    /// Returns one outcome per executed stage. With [`FailurePolicy::Stop`]
    /// the list ends at the first failed stage; with
    /// [`FailurePolicy::Continue`] every stage appears, and a stage whose
    /// inputs reference a failed stage fails in turn with a template error
    /// recorded as its outcome.
    pub async fn run(
        &self,
        user_request: &str,
        provider: Arc<Provider>,
        store: &MemoryStore,
    ) -> Result<Vec<StageOutcome>, WorkflowError> {
        if user_request.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "user_request must not be blank".to_owned(),
            ));
        }

        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert(USER_REQUEST_VAR.to_owned(), user_request.to_owned());
        let mut outcomes = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let prompt = match template::render(&stage.prompt_template, &vars) {
                Ok(prompt) => prompt,
                Err(source) => {
                    let cause = source.to_string();
                    warn!(stage = %stage.name, %cause, "stage template failed to render");
                    outcomes.push(StageOutcome {
                        stage: stage.name.clone(),
                        result: ExecutionResult::failed(cause),
                        attempts: 0,
                    });
                    match self.on_failure {
                        FailurePolicy::Stop => return Ok(outcomes),
                        FailurePolicy::Continue => continue,
                    }
                }
            };

            let agent = SubAgent::implicit(&stage.name, "", Arc::clone(&provider), store.clone());
            let (result, attempts) = self.run_stage(stage, &agent, &prompt).await;

            if result.success {
                vars.insert(stage.name.clone(), result.output.clone());
                vars.insert(PREV_OUTPUT_VAR.to_owned(), result.output.clone());
                info!(stage = %stage.name, attempts, "stage complete");
                outcomes.push(StageOutcome {
                    stage: stage.name.clone(),
                    result,
                    attempts,
                });
            } else {
                warn!(stage = %stage.name, attempts, "stage failed");
                outcomes.push(StageOutcome {
                    stage: stage.name.clone(),
                    result,
                    attempts,
                });
                if self.on_failure == FailurePolicy::Stop {
                    return Ok(outcomes);
                }
            }
        }

        Ok(outcomes)
    }

    /// Execute one stage, re-running on validator rejection up to the
    /// stage's retry budget. Provider failures are terminal here: the
    /// provider layer already retried transient errors.
    async fn run_stage(
        &self,
        stage: &Stage,
        agent: &SubAgent,
        prompt: &str,
    ) -> (ExecutionResult, u32) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = agent.execute(ExecutionInput::new(prompt)).await;

            if !result.success {
                return (result, attempts);
            }

            let Some(validator) = &stage.validator else {
                return (result, attempts);
            };

            let verdict = validator(&result.output);
            if verdict.valid {
                return (result, attempts);
            }

            let reason = verdict.reason.unwrap_or_else(|| "rejected".to_owned());
            if attempts > stage.max_retries {
                return (
                    ExecutionResult::failed(format!(
                        "validator rejected output after {attempts} attempts: {reason}"
                    )),
                    attempts,
                );
            }
            warn!(stage = %stage.name, attempts, %reason, "validator rejected output, retrying");
        }
    }
}
