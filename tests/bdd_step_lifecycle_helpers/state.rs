//! Scenario state for step lifecycle behavioural tests.

use podstep::api::CommandOutcome;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

use super::cluster::FakeCluster;

/// High-level outcome of running a step.
#[derive(Debug, Clone)]
pub(crate) enum RunResult {
    /// The run returned a `CommandOutcome`.
    Ok(CommandOutcome),
    /// The run returned an error.
    Err(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct LifecycleState {
    pub(crate) cluster: Slot<FakeCluster>,
    pub(crate) step_name: Slot<String>,
    pub(crate) keep_namespace: Slot<bool>,
    pub(crate) output: Slot<String>,
    pub(crate) result: Slot<RunResult>,
}

#[fixture]
pub(crate) fn lifecycle_state() -> LifecycleState {
    let state = LifecycleState::default();
    state.keep_namespace.set(false);
    state
}
