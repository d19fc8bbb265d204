//! Static dependency analysis of prompt templates.
//!
//! Scans each task's template for `{{name}}` references, builds the task
//! DAG, and layers it Kahn-style into batches: every task in a batch is
//! independent of the others and may run in parallel, and a task's
//! dependencies always sit in an earlier batch.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use relay_store::TaskDefinition;

use crate::template::{self, PREV_OUTPUT_VAR, TemplateError, USER_REQUEST_VAR};

/// Errors from validating and layering a plan.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("duplicate task name {0:?} in plan")]
    DuplicateTask(String),

    #[error(
        "task {task:?} references {variable:?}, which is neither \
         'user_request' nor a task in the plan"
    )]
    UnknownReference { task: String, variable: String },

    #[error("dependency cycle detected involving tasks: {0}")]
    CycleDetected(String),

    #[error("task {task:?} has a malformed template")]
    MalformedTemplate {
        task: String,
        #[source]
        source: TemplateError,
    },
}

/// Observability summary of a layered plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelismReport {
    pub total_tasks: usize,
    pub batch_count: usize,
    pub max_batch_size: usize,
    /// `total_tasks / batch_count`: how much faster the layered plan can run
    /// than a purely sequential one, assuming uniform task cost.
    pub speedup_potential: f64,
}

/// Validate a plan and layer it into parallel-executable batches.
///
/// Within a batch, tasks keep their original plan order. A `{{prev_output}}`
/// reference (the stage-style convention) is treated as a dependency on the
/// immediately preceding task in plan order, which forces stage-style plans
/// into strictly linear batches.
pub fn analyze(plan: &[TaskDefinition]) -> Result<Vec<Vec<TaskDefinition>>, AnalyzerError> {
    // Unique names, and an index for resolving references.
    let mut seen = HashSet::new();
    for task in plan {
        if !seen.insert(task.name.as_str()) {
            return Err(AnalyzerError::DuplicateTask(task.name.clone()));
        }
    }
    let name_to_idx: HashMap<&str, usize> = plan
        .iter()
        .enumerate()
        .map(|(i, task)| (task.name.as_str(), i))
        .collect();

    // Resolve references into dependency edges.
    let n = plan.len();
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (idx, task) in plan.iter().enumerate() {
        let refs = template::extract_refs(&task.prompt_template).map_err(|source| {
            AnalyzerError::MalformedTemplate {
                task: task.name.clone(),
                source,
            }
        })?;

        for reference in refs {
            if reference == USER_REQUEST_VAR {
                continue;
            }
            if reference == PREV_OUTPUT_VAR {
                match idx.checked_sub(1) {
                    Some(prev) => {
                        deps[idx].insert(prev);
                    }
                    None => {
                        // The first task has no predecessor to bind to.
                        return Err(AnalyzerError::UnknownReference {
                            task: task.name.clone(),
                            variable: reference,
                        });
                    }
                }
                continue;
            }
            match name_to_idx.get(reference.as_str()) {
                Some(&dep) => {
                    deps[idx].insert(dep);
                }
                None => {
                    return Err(AnalyzerError::UnknownReference {
                        task: task.name.clone(),
                        variable: reference,
                    });
                }
            }
        }
    }

    // Kahn layering. A self-reference leaves its task with nonzero
    // in-degree forever, so it is reported as a cycle like any other.
    let mut in_degree = vec![0usize; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (idx, task_deps) in deps.iter().enumerate() {
        for &dep in task_deps {
            adj[dep].push(idx);
            in_degree[idx] += 1;
        }
    }

    let mut frontier: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut batches: Vec<Vec<TaskDefinition>> = Vec::new();
    let mut placed = 0usize;

    while !frontier.is_empty() {
        batches.push(frontier.iter().map(|&i| plan[i].clone()).collect());
        placed += frontier.len();

        let mut next = Vec::new();
        for &done in &frontier {
            for &dependent in &adj[done] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        // Ascending index order preserves plan order within the batch.
        next.sort_unstable();
        frontier = next;
    }

    if placed != n {
        let cycle_tasks: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg > 0)
            .map(|(i, _)| plan[i].name.as_str())
            .collect();
        return Err(AnalyzerError::CycleDetected(cycle_tasks.join(", ")));
    }

    Ok(batches)
}

/// Summarize how much parallelism a layered plan exposes.
pub fn analyze_parallelism_benefit(batches: &[Vec<TaskDefinition>]) -> ParallelismReport {
    let total_tasks: usize = batches.iter().map(Vec::len).sum();
    let batch_count = batches.len();
    let max_batch_size = batches.iter().map(Vec::len).max().unwrap_or(0);
    let speedup_potential = if batch_count == 0 {
        0.0
    } else {
        total_tasks as f64 / batch_count as f64
    };
    ParallelismReport {
        total_tasks,
        batch_count,
        max_batch_size,
        speedup_potential,
    }
}
