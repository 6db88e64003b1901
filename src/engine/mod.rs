//! Kubernetes execution backend for pipeline steps.
//!
//! Each step runs as a single pod in a namespace owned by one engine
//! instance. [`KubernetesEngine`] offers the operations a pipeline engine
//! drives, in order:
//!
//! 1. `setup`: make sure the namespace exists
//! 2. `exec`: create the step's pod and wait until it has started
//! 3. `tail`: follow the pod's output
//! 4. `wait`: wait for the pod to finish and report its exit code
//! 5. `destroy`: delete the namespace and everything in it
//!
//! `kill` is accepted but does nothing; stopping a step is done by destroying
//! its namespace.

mod connection;
pub mod lifecycle;
pub mod logs;
pub mod namespace;
mod naming;
mod pod_spec;
mod step;

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use self::connection::error_classification::ApiFailure;
pub use self::connection::{ClusterConnector, ClusterTarget, KubeconfigResolver};
use self::lifecycle::PodLifecycle;
pub use self::lifecycle::{PodClient, PodObservation, PodPhase, PollPolicy};
pub use self::logs::{LogStream, PodLogClient};
pub use self::namespace::NamespaceClient;
pub use self::naming::sanitize;
pub use self::pod_spec::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, build_pod};
pub use self::step::{EnvironmentConfig, ExecutionResult, Step};
use crate::error::PodstepError;

/// Boxed future type returned by [`Engine`] implementors.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PodstepError>> + Send + 'a>>;

/// The contract a pipeline engine drives for each run.
///
/// This trait is object safe so callers can hold a `Box<dyn Engine>`.
pub trait Engine: Send + Sync {
    /// Prepare the run's environment.
    fn setup<'a>(&'a self, config: &'a EnvironmentConfig) -> EngineFuture<'a, ()>;

    /// Start a step and return once it is running.
    fn exec<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ()>;

    /// Wait for a started step to finish.
    fn wait<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ExecutionResult>;

    /// Follow a started step's output.
    fn tail<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, LogStream>;

    /// Tear down the run's environment.
    fn destroy<'a>(&'a self, config: &'a EnvironmentConfig) -> EngineFuture<'a, ()>;

    /// Stop a step. Has no effect.
    fn kill<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ()>;
}

/// Runs steps as pods in one namespace.
///
/// The namespace, client, poll policy, and cancellation token are fixed at
/// construction. Steps are identified purely by their sanitized names, so
/// concurrent calls for steps with distinct names do not interfere.
#[derive(Debug)]
pub struct KubernetesEngine<C> {
    namespace: String,
    client: C,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl<C> KubernetesEngine<C> {
    /// Create an engine managing `namespace` through `client`.
    ///
    /// Uses the default [`PollPolicy`] and a fresh cancellation token.
    #[must_use]
    pub fn new(client: C, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            client,
            policy: PollPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the poll policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use `cancel` to interrupt waits, for example on shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Return the managed namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return the poll policy.
    #[must_use]
    pub const fn poll_policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Return the cancellation token observed by waits.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Accept a request to stop `step` without acting on it.
    pub fn kill(&self, step: &Step) {
        info!(
            step = step.name(),
            namespace = %self.namespace,
            "kill requested; steps stop when the namespace is destroyed"
        );
    }
}

impl<C: PodClient> KubernetesEngine<C> {
    fn lifecycle(&self) -> PodLifecycle<'_, C> {
        PodLifecycle::new(&self.client, &self.namespace, &self.policy, &self.cancel)
    }
}

impl<C> KubernetesEngine<C>
where
    C: NamespaceClient + PodClient + PodLogClient + Sync,
{
    /// Make sure the namespace exists.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::NamespaceLookupFailed` or
    /// `ClusterError::NamespaceCreateFailed`.
    pub async fn setup(&self, config: &EnvironmentConfig) -> Result<(), PodstepError> {
        namespace::ensure(&self.client, &self.namespace, &config.namespace_labels).await
    }

    /// Create the pod for `step` and wait until it leaves `Pending`.
    ///
    /// A pod whose start wait fails is left in place for `destroy`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodCreateFailed`, `ClusterError::PodNotFound`,
    /// `ClusterError::PodLookupFailed`, `ClusterError::StartTimeout`, or
    /// `ClusterError::Cancelled`.
    pub async fn exec(&self, step: &Step) -> Result<(), PodstepError> {
        let lifecycle = self.lifecycle();
        let name = lifecycle.create(step).await?;
        lifecycle.wait_for_start(&name).await?;
        Ok(())
    }

    /// Wait for `step`'s pod to finish and report how it exited.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodNotFound`, `ClusterError::PodLookupFailed`,
    /// `ClusterError::MissingTerminalState`, `ClusterError::CompletionTimeout`,
    /// or `ClusterError::Cancelled`.
    pub async fn wait(&self, step: &Step) -> Result<ExecutionResult, PodstepError> {
        self.lifecycle()
            .wait_for_completion(&sanitize(step.name()))
            .await
    }

    /// Follow `step`'s output.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::LogStreamFailed` when the stream cannot be
    /// opened.
    pub async fn tail(&self, step: &Step) -> Result<LogStream, PodstepError> {
        logs::follow(&self.client, &self.namespace, step).await
    }

    /// Request deletion of the namespace.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::NamespaceDeleteFailed`.
    pub async fn destroy(&self, _config: &EnvironmentConfig) -> Result<(), PodstepError> {
        namespace::teardown(&self.client, &self.namespace).await
    }
}

impl<C> Engine for KubernetesEngine<C>
where
    C: NamespaceClient + PodClient + PodLogClient + Send + Sync,
{
    fn setup<'a>(&'a self, config: &'a EnvironmentConfig) -> EngineFuture<'a, ()> {
        Box::pin(Self::setup(self, config))
    }

    fn exec<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ()> {
        Box::pin(Self::exec(self, step))
    }

    fn wait<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ExecutionResult> {
        Box::pin(Self::wait(self, step))
    }

    fn tail<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, LogStream> {
        Box::pin(Self::tail(self, step))
    }

    fn destroy<'a>(&'a self, config: &'a EnvironmentConfig) -> EngineFuture<'a, ()> {
        Box::pin(Self::destroy(self, config))
    }

    fn kill<'a>(&'a self, step: &'a Step) -> EngineFuture<'a, ()> {
        Self::kill(self, step);
        Box::pin(async { Ok(()) })
    }
}
