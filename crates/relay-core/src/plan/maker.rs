//! Plan generation: meta-prompt construction and tolerant response parsing.
//!
//! The planner LM is asked for a bare JSON array of task objects. Models
//! decorate anyway -- prose preambles, markdown fences, trailing sign-offs --
//! so the parser peels a whole-payload code fence, extracts the substring
//! between the first `[` and the last `]`, and parses that strictly.

use thiserror::Error;
use tracing::info;

use relay_store::TaskDefinition;

use crate::error::WorkflowError;
use crate::provider::Provider;

/// Errors from parsing planner LM output.
#[derive(Debug, Error)]
pub enum PlanParseError {
    /// No `[...]` span found anywhere in the output.
    #[error("planner output contains no JSON array; raw output: {raw:?}")]
    MissingArray { raw: String },

    /// The extracted span is not a JSON array of objects with the required
    /// keys (`name`, `description`, `promptTemplate`).
    #[error("planner output is not a valid task array: {source}; raw output: {raw:?}")]
    InvalidTaskArray {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Build the fixed meta-prompt sent to the planner LM.
pub fn build_planner_prompt(user_request: &str) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(
        "You are a planning assistant that decomposes a request into a \
         dependency-ordered list of tasks for other agents to execute.\n\n",
    );
    prompt.push_str(
        "Respond with a JSON array ONLY -- no prose, no markdown fences. \
         Each element must be an object with exactly these keys:\n\
         - \"name\": unique snake_case task identifier\n\
         - \"description\": what the agent executing the task must do\n\
         - \"promptTemplate\": the prompt for the task\n\n",
    );
    prompt.push_str(
        "A promptTemplate may reference the original request as \
         {{user_request}} and the output of an earlier task as \
         {{task_name}}. Tasks whose templates reference no other task run \
         in parallel, so only add a reference when the task genuinely needs \
         that output. References must not form a cycle.\n\n",
    );
    prompt.push_str("Request:\n");
    prompt.push_str(user_request);

    prompt
}

/// Peel a markdown code fence off the output when the whole payload is
/// fenced. Models wrap JSON in code fences despite instructions.
fn strip_markdown_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    match body.strip_suffix("```") {
        Some(inner) => inner.trim(),
        // Opening fence without a closing one; leave the payload alone and
        // let array extraction deal with it.
        None => trimmed,
    }
}

/// Extract the outermost `[...]` span, if any.
fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse planner output into a plan.
///
/// Tolerates a surrounding markdown fence and surrounding prose; rejects
/// anything whose extracted span is not a valid array of task objects. An
/// empty array is a valid, empty plan.
pub fn parse_plan(raw: &str) -> Result<Vec<TaskDefinition>, PlanParseError> {
    let unfenced = strip_markdown_fences(raw);
    let span = extract_json_array(unfenced).ok_or_else(|| PlanParseError::MissingArray {
        raw: raw.to_owned(),
    })?;

    serde_json::from_str::<Vec<TaskDefinition>>(span).map_err(|source| {
        PlanParseError::InvalidTaskArray {
            raw: raw.to_owned(),
            source,
        }
    })
}

/// Ask the planner LM to decompose `user_request` into a plan.
pub async fn make_plan(
    planner: &Provider,
    user_request: &str,
) -> Result<Vec<TaskDefinition>, WorkflowError> {
    let prompt = build_planner_prompt(user_request);
    let raw = planner
        .generate(&prompt)
        .await
        .map_err(|error| WorkflowError::Provider(Box::new(error)))?;

    let plan = parse_plan(&raw)?;
    info!(tasks = plan.len(), "planner produced a plan");
    Ok(plan)
}
