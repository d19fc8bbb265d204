use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// One task in a plan.
///
/// `name` is unique within a plan and doubles as the key under which the
/// task's output is stored. `prompt_template` may reference
/// `{{user_request}}` and `{{<otherTaskName>}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "promptTemplate", alias = "prompt_template")]
    pub prompt_template: String,
}

impl TaskDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt_template: prompt_template.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow state
// ---------------------------------------------------------------------------

/// Workflow lifecycle state, inferred from store contents (never stored
/// directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// No plan saved yet.
    New,
    /// Plan saved; some tasks may have outputs.
    Planned { completed: usize, total: usize },
    /// Every task in the plan has a stored output. Resume returns cached
    /// results only.
    Complete,
}

/// Listing entry for a stored workflow.
#[derive(Debug, Clone, FromRow)]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub created_at: DateTime<Utc>,
}
