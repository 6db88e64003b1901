//! Given/when steps for step lifecycle scenarios.

use std::time::Duration;

use podstep::api::{RunStepParams, run_step};
use podstep::engine::{EnvironmentConfig, KubernetesEngine, PollPolicy, Step};
use rstest_bdd_macros::{given, when};
use tokio_util::sync::CancellationToken;

use super::StepResult;
use super::cluster::FakeCluster;
use super::state::{LifecycleState, RunResult};

fn cluster(lifecycle_state: &LifecycleState) -> StepResult<FakeCluster> {
    lifecycle_state
        .cluster
        .get()
        .ok_or_else(|| String::from("cluster should be configured"))
}

#[given("an empty cluster")]
fn given_empty_cluster(lifecycle_state: &LifecycleState) {
    lifecycle_state.cluster.set(FakeCluster::default());
}

#[given("a cluster that already has namespace {namespace}")]
fn given_cluster_with_namespace(lifecycle_state: &LifecycleState, namespace: String) {
    let cluster = FakeCluster::default();
    cluster.add_namespace(namespace);
    lifecycle_state.cluster.set(cluster);
}

#[given("the step {name} prints \"{output}\"")]
fn given_step_output(
    lifecycle_state: &LifecycleState,
    name: String,
    output: String,
) -> StepResult<()> {
    cluster(lifecycle_state)?.set_output(&format!("{output}\n"));
    lifecycle_state.step_name.set(name);
    Ok(())
}

#[given("the pod finishes with exit code {code}")]
fn given_pod_exit_code(lifecycle_state: &LifecycleState, code: i32) -> StepResult<()> {
    let phase = if code == 0 { "Succeeded" } else { "Failed" };
    cluster(lifecycle_state)?.script_phases(vec![
        ("Pending", None),
        ("Running", None),
        ("Running", None),
        (phase, Some(code)),
    ]);
    Ok(())
}

#[given("the pod fails without an exit code")]
fn given_pod_without_exit_code(lifecycle_state: &LifecycleState) -> StepResult<()> {
    cluster(lifecycle_state)?.script_phases(vec![("Pending", None), ("Failed", None)]);
    Ok(())
}

#[given("the namespace is kept")]
fn given_namespace_kept(lifecycle_state: &LifecycleState) {
    lifecycle_state.keep_namespace.set(true);
}

#[when("the step is run in namespace {namespace}")]
fn when_step_run(lifecycle_state: &LifecycleState, namespace: String) -> StepResult<()> {
    let step_name = lifecycle_state
        .step_name
        .get()
        .ok_or_else(|| String::from("step should be configured"))?;
    let step = Step::new(step_name, "rust:1.88")
        .map_err(|e| format!("failed to build step: {e}"))?
        .with_command(vec![String::from("cargo"), String::from("test")]);
    let policy = PollPolicy {
        interval: Duration::from_millis(1),
        ..PollPolicy::default()
    };
    let engine =
        KubernetesEngine::new(cluster(lifecycle_state)?, namespace).with_poll_policy(policy);

    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    let environment = EnvironmentConfig::default();
    let cancel = CancellationToken::new();
    let mut output = Vec::new();

    let result = run_step(RunStepParams {
        engine: &engine,
        step: &step,
        environment: &environment,
        keep_namespace: lifecycle_state.keep_namespace.get().unwrap_or(false),
        output: &mut output,
        cancel: &cancel,
        runtime_handle: runtime.handle(),
    });

    lifecycle_state
        .output
        .set(String::from_utf8_lossy(&output).into_owned());
    lifecycle_state.result.set(match result {
        Ok(outcome) => RunResult::Ok(outcome),
        Err(e) => RunResult::Err(e.to_string()),
    });
    Ok(())
}
