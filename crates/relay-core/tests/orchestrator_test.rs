//! End-to-end orchestrator tests: cold runs, resume semantics, and the
//! failure modes that must trip before any worker call.

mod common;

use std::sync::Arc;

use common::{MockLm, fast_config, provider};
use relay_core::error::WorkflowError;
use relay_core::orchestrator;
use relay_core::provider::LmError;
use relay_store::{StoreError, TaskDefinition, WorkflowState};
use relay_test_utils::test_store;

/// The planner response used by most tests: a linear three-task plan,
/// wrapped in the kind of prose models like to add.
const LINEAR_PLAN_RESPONSE: &str = "Sure! Here is the plan:\n[\
    {\"name\":\"outline\",\"description\":\"Outline writer\",\"promptTemplate\":\"Outline: {{user_request}}\"},\
    {\"name\":\"draft\",\"description\":\"Draft writer\",\"promptTemplate\":\"Write based on: {{outline}}\"},\
    {\"name\":\"edit\",\"description\":\"Editor\",\"promptTemplate\":\"Edit: {{draft}}\"}]\n\
    Let me know if you need anything else.";

/// Worker that answers each rendered prompt with a stage marker.
fn stage_worker() -> Arc<MockLm> {
    MockLm::respond_with("worker", |prompt| {
        if prompt.contains("Outline:") {
            Ok("<STAGE-RESULT:outline>".into())
        } else if prompt.contains("Write based on:") {
            Ok("<STAGE-RESULT:draft>".into())
        } else if prompt.contains("Edit:") {
            Ok("<STAGE-RESULT:edit>".into())
        } else {
            Err(LmError::InvalidRequest(format!("unexpected prompt: {prompt}")))
        }
    })
}

#[tokio::test]
async fn cold_run_executes_linear_plan_in_order() {
    common::init_tracing();
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![Ok(LINEAR_PLAN_RESPONSE.into())]);
    let worker_lm = stage_worker();

    let results = orchestrator::run_workflow(
        &store,
        "wf-cold",
        "Distributed systems",
        &provider(planner_lm.clone()),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .expect("workflow should complete");

    assert_eq!(planner_lm.calls(), 1);
    assert_eq!(worker_lm.calls(), 3);

    let outputs: Vec<&str> = results.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(
        outputs,
        vec![
            "<STAGE-RESULT:outline>",
            "<STAGE-RESULT:draft>",
            "<STAGE-RESULT:edit>"
        ]
    );
    assert!(results.iter().all(|r| r.success));

    // Rendered prompts saw the substituted upstream outputs.
    let prompts = worker_lm.prompts();
    assert!(prompts.iter().any(|p| p.contains("Outline: Distributed systems")));
    assert!(prompts.iter().any(|p| p.contains("Write based on: <STAGE-RESULT:outline>")));

    // All three outputs persisted; the workflow is complete.
    let stored = store.load_task_outputs("wf-cold").await.unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(
        store.workflow_state("wf-cold").await.unwrap(),
        WorkflowState::Complete
    );
}

#[tokio::test]
async fn completed_workflow_resumes_without_any_lm_call() {
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![Ok(LINEAR_PLAN_RESPONSE.into())]);
    let worker_lm = stage_worker();
    let planner = provider(planner_lm.clone());
    let worker = provider(worker_lm.clone());

    let first = orchestrator::run_workflow(
        &store,
        "wf-idem",
        "Distributed systems",
        &planner,
        Arc::clone(&worker),
        &fast_config(),
    )
    .await
    .expect("first run");

    let second = orchestrator::run_workflow(
        &store,
        "wf-idem",
        "Distributed systems",
        &planner,
        worker,
        &fast_config(),
    )
    .await
    .expect("second run");

    // Same results, zero additional planner or worker calls.
    assert_eq!(planner_lm.calls(), 1);
    assert_eq!(worker_lm.calls(), 3);
    let firsts: Vec<&str> = first.iter().map(|r| r.output.as_str()).collect();
    let seconds: Vec<&str> = second.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(firsts, seconds);
}

#[tokio::test]
async fn stored_plan_means_planner_is_never_invoked() {
    let (store, _dir) = test_store().await;
    let plan = vec![TaskDefinition::new(
        "only",
        "Single task",
        "Answer: {{user_request}}",
    )];
    store.save_plan("wf-preplanned", &plan).await.unwrap();

    let planner_lm = MockLm::scripted("planner", vec![]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("done".into()));

    let results = orchestrator::run_workflow(
        &store,
        "wf-preplanned",
        "anything",
        &provider(planner_lm.clone()),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .expect("run");

    assert_eq!(planner_lm.calls(), 0);
    assert_eq!(worker_lm.calls(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].output, "done");
}

#[tokio::test]
async fn partial_failure_persists_finished_tasks_then_resume_completes() {
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![Ok(LINEAR_PLAN_RESPONSE.into())]);
    let planner = provider(planner_lm.clone());

    // First run: the draft task keeps failing until the provider gives up.
    let failing_worker = MockLm::respond_with("worker", |prompt| {
        if prompt.contains("Outline:") {
            Ok("<STAGE-RESULT:outline>".into())
        } else {
            Err(LmError::ServiceUnavailable("upstream down".into()))
        }
    });

    let err = orchestrator::run_workflow(
        &store,
        "wf-resume",
        "Distributed systems",
        &planner,
        provider(failing_worker.clone()),
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, WorkflowError::Execution { ref task, .. } if task == "draft"),
        "expected draft to fail the workflow, got: {err}"
    );

    // The outline output survived the failure.
    let stored = store.load_task_outputs("wf-resume").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored.contains_key("outline"));
    assert_eq!(
        store.workflow_state("wf-resume").await.unwrap(),
        WorkflowState::Planned {
            completed: 1,
            total: 3
        }
    );

    // Second run: healthy worker. Planner untouched, outline cached, and
    // exactly the two unfinished tasks execute.
    let healthy_worker = stage_worker();
    let results = orchestrator::run_workflow(
        &store,
        "wf-resume",
        "Distributed systems",
        &planner,
        provider(healthy_worker.clone()),
        &fast_config(),
    )
    .await
    .expect("resume should complete");

    assert_eq!(planner_lm.calls(), 1);
    assert_eq!(healthy_worker.calls(), 2);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].output, "<STAGE-RESULT:outline>");
    assert_eq!(
        store.workflow_state("wf-resume").await.unwrap(),
        WorkflowState::Complete
    );
}

#[tokio::test]
async fn cyclic_plan_fails_before_any_worker_call() {
    let (store, _dir) = test_store().await;
    let cyclic = r#"[
        {"name":"x","description":"","promptTemplate":"Use {{y}}"},
        {"name":"y","description":"","promptTemplate":"Use {{x}}"}]"#;
    let planner_lm = MockLm::scripted("planner", vec![Ok(cyclic.into())]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let err = orchestrator::run_workflow(
        &store,
        "wf-cycle",
        "anything",
        &provider(planner_lm),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(
            err,
            WorkflowError::Analysis(relay_core::analyzer::AnalyzerError::CycleDetected(_))
        ),
        "expected CycleDetected, got: {err}"
    );
    assert_eq!(worker_lm.calls(), 0);
}

#[tokio::test]
async fn unknown_reference_fails_before_any_worker_call() {
    let (store, _dir) = test_store().await;
    let ghost = r#"[{"name":"x","description":"","promptTemplate":"Use {{ghost}}"}]"#;
    let planner_lm = MockLm::scripted("planner", vec![Ok(ghost.into())]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let err = orchestrator::run_workflow(
        &store,
        "wf-ghost",
        "anything",
        &provider(planner_lm),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(
            err,
            WorkflowError::Analysis(relay_core::analyzer::AnalyzerError::UnknownReference { .. })
        ),
        "expected UnknownReference, got: {err}"
    );
    assert_eq!(worker_lm.calls(), 0);
}

#[tokio::test]
async fn unparseable_planner_output_is_a_plan_parse_error() {
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![Ok("I cannot plan this.".into())]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let err = orchestrator::run_workflow(
        &store,
        "wf-noparse",
        "anything",
        &provider(planner_lm),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkflowError::PlanParse(_)));
    assert_eq!(worker_lm.calls(), 0);
    // Nothing was saved: a fresh id is not required to retry planning.
    assert!(store.load_plan("wf-noparse").await.unwrap().is_none());
}

#[tokio::test]
async fn empty_plan_completes_with_no_results() {
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![Ok("Nothing to do. []".into())]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let results = orchestrator::run_workflow(
        &store,
        "wf-empty",
        "anything",
        &provider(planner_lm.clone()),
        provider(worker_lm.clone()),
        &fast_config(),
    )
    .await
    .expect("empty plan is valid");

    assert!(results.is_empty());
    assert_eq!(planner_lm.calls(), 1);
    assert_eq!(worker_lm.calls(), 0);
    assert_eq!(
        store.workflow_state("wf-empty").await.unwrap(),
        WorkflowState::Complete
    );
}

#[tokio::test]
async fn plan_and_execute_refuses_existing_plan() {
    let (store, _dir) = test_store().await;
    store
        .save_plan("wf-exists", &[TaskDefinition::new("t", "", "{{user_request}}")])
        .await
        .unwrap();

    let planner_lm = MockLm::scripted("planner", vec![]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let err = orchestrator::plan_and_execute(
        &store,
        "wf-exists",
        "anything",
        &provider(planner_lm.clone()),
        provider(worker_lm),
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Storage(StoreError::AlreadyExists(_))
    ));
    assert_eq!(planner_lm.calls(), 0);
}

#[tokio::test]
async fn resume_without_any_plan_fails() {
    let (store, _dir) = test_store().await;
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));

    let err = orchestrator::resume_workflow(
        &store,
        "wf-missing",
        "anything",
        provider(worker_lm),
        None,
        &fast_config(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkflowError::PlanNotFound(ref id) if id == "wf-missing"));
}

#[tokio::test]
async fn resume_with_caller_plan_persists_and_executes_it() {
    let (store, _dir) = test_store().await;
    let plan = vec![TaskDefinition::new("solo", "", "Answer: {{user_request}}")];
    let worker_lm = MockLm::respond_with("worker", |_| Ok("answered".into()));

    let results = orchestrator::resume_workflow(
        &store,
        "wf-supplied",
        "anything",
        provider(worker_lm),
        Some(plan.clone()),
        &fast_config(),
    )
    .await
    .expect("resume with supplied plan");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].output, "answered");
    // The supplied plan is now the stored plan.
    assert_eq!(store.load_plan("wf-supplied").await.unwrap().unwrap(), plan);
}

#[tokio::test]
async fn resume_loads_stored_plan_when_none_supplied() {
    let (store, _dir) = test_store().await;
    let plan = vec![TaskDefinition::new("solo", "", "Answer: {{user_request}}")];
    store.save_plan("wf-loaded", &plan).await.unwrap();
    let worker_lm = MockLm::respond_with("worker", |_| Ok("answered".into()));

    let results = orchestrator::resume_workflow(
        &store,
        "wf-loaded",
        "anything",
        provider(worker_lm.clone()),
        None,
        &fast_config(),
    )
    .await
    .expect("resume from store");

    assert_eq!(results.len(), 1);
    assert_eq!(worker_lm.calls(), 1);
}

#[tokio::test]
async fn blank_arguments_fail_fast() {
    let (store, _dir) = test_store().await;
    let planner_lm = MockLm::scripted("planner", vec![]);
    let worker_lm = MockLm::respond_with("worker", |_| Ok("never".into()));
    let planner = provider(planner_lm.clone());
    let worker = provider(worker_lm.clone());

    for (id, request) in [("", "req"), ("  ", "req"), ("wf", ""), ("wf", "   ")] {
        let err = orchestrator::run_workflow(
            &store,
            id,
            request,
            &planner,
            Arc::clone(&worker),
            &fast_config(),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, WorkflowError::Validation(_)),
            "({id:?}, {request:?}) should fail validation, got: {err}"
        );
    }
    assert_eq!(planner_lm.calls(), 0);
    assert_eq!(worker_lm.calls(), 0);
}

#[tokio::test]
async fn workflow_state_is_queryable_through_the_orchestrator() {
    let (store, _dir) = test_store().await;
    assert_eq!(
        orchestrator::workflow_state(&store, "wf-state").await.unwrap(),
        WorkflowState::New
    );
}
