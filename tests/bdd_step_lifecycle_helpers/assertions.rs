//! Assertion helpers for step lifecycle behavioural tests.

use podstep::api::CommandOutcome;
use rstest_bdd_macros::then;

use super::StepResult;
use super::state::{LifecycleState, RunResult};

fn result(lifecycle_state: &LifecycleState) -> StepResult<RunResult> {
    lifecycle_state
        .result
        .get()
        .ok_or_else(|| String::from("result should be set"))
}

#[then("the outcome is success")]
fn outcome_is_success(lifecycle_state: &LifecycleState) -> StepResult<()> {
    match result(lifecycle_state)? {
        RunResult::Ok(CommandOutcome::Success) => Ok(()),
        RunResult::Ok(CommandOutcome::CommandExit { code }) => Err(format!(
            "expected Success, got CommandExit {{ code: {code} }}"
        )),
        RunResult::Err(msg) => Err(format!("expected Success, got error: {msg}")),
    }
}

#[then("the outcome is command exit with code {expected_code}")]
fn outcome_is_command_exit(
    lifecycle_state: &LifecycleState,
    expected_code: i32,
) -> StepResult<()> {
    match result(lifecycle_state)? {
        RunResult::Ok(CommandOutcome::CommandExit { code }) if code == expected_code => Ok(()),
        RunResult::Ok(CommandOutcome::CommandExit { code }) => {
            Err(format!("expected exit code {expected_code}, got {code}"))
        }
        RunResult::Ok(CommandOutcome::Success) => Err(format!(
            "expected CommandExit {{ code: {expected_code} }}, got Success"
        )),
        RunResult::Err(msg) => Err(format!(
            "expected CommandExit {{ code: {expected_code} }}, got error: {msg}"
        )),
    }
}

#[then("the run fails mentioning \"{fragment}\"")]
fn run_fails_mentioning(lifecycle_state: &LifecycleState, fragment: String) -> StepResult<()> {
    match result(lifecycle_state)? {
        RunResult::Err(msg) if msg.contains(&fragment) => Ok(()),
        RunResult::Err(msg) => Err(format!("expected error mentioning '{fragment}', got: {msg}")),
        RunResult::Ok(outcome) => Err(format!("expected an error, got {outcome:?}")),
    }
}

#[then("pod {pod} was created in namespace {namespace}")]
fn pod_was_created(
    lifecycle_state: &LifecycleState,
    pod: String,
    namespace: String,
) -> StepResult<()> {
    let cluster = lifecycle_state
        .cluster
        .get()
        .ok_or_else(|| String::from("cluster should be configured"))?;
    let created = cluster.created_pods();
    if created.contains(&(namespace.clone(), pod.clone())) {
        Ok(())
    } else {
        Err(format!("expected pod {pod} in {namespace}, created: {created:?}"))
    }
}

#[then("the step output contains \"{fragment}\"")]
fn output_contains(lifecycle_state: &LifecycleState, fragment: String) -> StepResult<()> {
    let output = lifecycle_state.output.get().unwrap_or_default();
    if output.contains(&fragment) {
        Ok(())
    } else {
        Err(format!("expected output to contain '{fragment}', got: {output:?}"))
    }
}

#[then("namespace {namespace} was deleted")]
fn namespace_was_deleted(lifecycle_state: &LifecycleState, namespace: String) -> StepResult<()> {
    let cluster = lifecycle_state
        .cluster
        .get()
        .ok_or_else(|| String::from("cluster should be configured"))?;
    let deleted = cluster.deleted_namespaces();
    if deleted == vec![namespace.clone()] {
        Ok(())
    } else {
        Err(format!("expected only {namespace} to be deleted, got {deleted:?}"))
    }
}

#[then("no namespace was deleted")]
fn no_namespace_deleted(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let cluster = lifecycle_state
        .cluster
        .get()
        .ok_or_else(|| String::from("cluster should be configured"))?;
    let deleted = cluster.deleted_namespaces();
    if deleted.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no deletions, got {deleted:?}"))
    }
}

#[then("no namespace was created")]
fn no_namespace_created(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let cluster = lifecycle_state
        .cluster
        .get()
        .ok_or_else(|| String::from("cluster should be configured"))?;
    let created = cluster.created_namespaces();
    if created.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no namespace creation, got {created:?}"))
    }
}
