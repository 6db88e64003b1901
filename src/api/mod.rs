//! Orchestration API for podstep commands.
//!
//! This module provides the library-facing functions behind each podstep
//! command: [`run_step`], [`setup_namespace`], [`destroy_namespace`],
//! [`tail_step`], and [`wait_step`], plus [`connect_engine`] to build the
//! engine they drive. The CLI binary is a thin adapter over these; embedders
//! can call them directly.
//!
//! All functions accept library-owned types (not clap types), block on a
//! caller-supplied Tokio runtime handle, and return
//! [`crate::error::Result<CommandOutcome>`]. They do not print to
//! stdout/stderr or call `std::process::exit`; step output goes to the writer
//! the caller passes in.

mod run;

pub use run::{RunStepParams, TailParams, run_step, tail_step};

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::engine::{
    ClusterConnector, Engine, EnvironmentConfig, ExecutionResult, KubeconfigResolver,
    KubernetesEngine, Step,
};
use crate::error::{PodstepError, Result as PodstepResult};

/// Outcome of a podstep command.
///
/// Commands return either outright success or the exit code of the step they
/// observed, which the CLI adapter maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command completed successfully (exit code 0).
    Success,
    /// The step's container exited with a non-zero code.
    CommandExit {
        /// The exit code reported by the cluster.
        code: i32,
    },
}

impl From<ExecutionResult> for CommandOutcome {
    fn from(result: ExecutionResult) -> Self {
        if result.succeeded() {
            Self::Success
        } else {
            Self::CommandExit {
                code: result.exit_code,
            }
        }
    }
}

/// Connect to the configured cluster and build an engine for its namespace.
///
/// The kubeconfig comes from the configuration, then the first entry of
/// `KUBECONFIG` read through `env`, then in-cluster or default inference.
/// The API server is health-checked before the engine is returned.
///
/// # Errors
///
/// Returns `ClusterError::KubeconfigNotFound`, `ClusterError::ConnectionFailed`,
/// `ClusterError::HealthCheckFailed`, or `ClusterError::HealthCheckTimeout`.
pub fn connect_engine<E: mockable::Env>(
    config: &AppConfig,
    env: &E,
    cancel: CancellationToken,
    runtime_handle: &tokio::runtime::Handle,
) -> PodstepResult<KubernetesEngine<kube::Client>> {
    let resolver = KubeconfigResolver::new(env);
    let client = runtime_handle.block_on(async {
        let client = ClusterConnector::connect_with_fallback(
            config.kubeconfig.as_deref(),
            config.context.as_deref(),
            &resolver,
        )
        .await?;
        ClusterConnector::health_check(&client).await?;
        Ok::<_, PodstepError>(client)
    })?;

    Ok(KubernetesEngine::new(client, config.namespace_or_default())
        .with_poll_policy(config.poll_policy())
        .with_cancellation(cancel))
}

/// Make sure the engine's namespace exists.
///
/// # Errors
///
/// Returns the errors of [`Engine::setup`].
pub fn setup_namespace(
    engine: &dyn Engine,
    environment: &EnvironmentConfig,
    runtime_handle: &tokio::runtime::Handle,
) -> PodstepResult<CommandOutcome> {
    runtime_handle.block_on(engine.setup(environment))?;
    Ok(CommandOutcome::Success)
}

/// Delete the engine's namespace.
///
/// # Errors
///
/// Returns the errors of [`Engine::destroy`].
pub fn destroy_namespace(
    engine: &dyn Engine,
    environment: &EnvironmentConfig,
    runtime_handle: &tokio::runtime::Handle,
) -> PodstepResult<CommandOutcome> {
    runtime_handle.block_on(engine.destroy(environment))?;
    Ok(CommandOutcome::Success)
}

/// Wait for a started step and report its exit code.
///
/// # Errors
///
/// Returns the errors of [`Engine::wait`].
pub fn wait_step(
    engine: &dyn Engine,
    step: &Step,
    runtime_handle: &tokio::runtime::Handle,
) -> PodstepResult<CommandOutcome> {
    let result = runtime_handle.block_on(engine.wait(step))?;
    Ok(CommandOutcome::from(result))
}
