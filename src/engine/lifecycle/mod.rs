//! Pod lifecycle control for a single step.
//!
//! A step's pod moves through `Created -> Starting -> Running -> Terminated`.
//! The cluster API is eventually consistent and offers no blocking "wait"
//! primitive here, so both waits poll a fresh observation of the pod at a
//! bounded interval until it leaves the phases they wait on. Each wait can be
//! bounded by a timeout and is interrupted by the engine's cancellation token.

mod observation;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::PostParams;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::observation::{PodObservation, PodPhase};
use super::connection::error_classification::ApiFailure;
use super::naming::sanitize;
use super::pod_spec::build_pod;
use super::step::{ExecutionResult, Step};
use crate::error::{ClusterError, PodstepError};

/// Default delay between two observations of a pod.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default bound on how long a pod may stay `Pending`.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(600);

/// Boxed future type returned by [`PodClient`] implementors.
pub type PodFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, kube::Error>> + Send + 'a>>;

/// Pod operations required from the cluster API.
pub trait PodClient {
    /// Submit `pod` for creation in `namespace`.
    fn create_pod(&self, namespace: String, pod: Pod) -> PodFuture<'_, Pod>;

    /// Fetch the current state of pod `name` in `namespace`.
    fn get_pod(&self, namespace: String, name: String) -> PodFuture<'_, Pod>;
}

impl PodClient for kube::Client {
    fn create_pod(&self, namespace: String, pod: Pod) -> PodFuture<'_, Pod> {
        let api: Api<Pod> = Api::namespaced(self.clone(), &namespace);
        Box::pin(async move { api.create(&PostParams::default(), &pod).await })
    }

    fn get_pod(&self, namespace: String, name: String) -> PodFuture<'_, Pod> {
        let api: Api<Pod> = Api::namespaced(self.clone(), &namespace);
        Box::pin(async move { api.get(&name).await })
    }
}

/// How pods are polled while waiting on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two observations.
    pub interval: Duration,
    /// Longest time a pod may stay `Pending`; `None` waits indefinitely.
    pub start_timeout: Option<Duration>,
    /// Longest time a started pod may run; `None` waits indefinitely.
    pub completion_timeout: Option<Duration>,
    /// How many times one observation retries a transport failure.
    pub lookup_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            start_timeout: Some(DEFAULT_START_TIMEOUT),
            completion_timeout: None,
            lookup_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Start,
    Completion,
}

impl Stage {
    const fn keeps_waiting(self, phase: &PodPhase) -> bool {
        match self {
            Self::Start => matches!(phase, PodPhase::Pending),
            Self::Completion => matches!(phase, PodPhase::Pending | PodPhase::Running),
        }
    }

    const fn timeout(self, policy: &PollPolicy) -> Option<Duration> {
        match self {
            Self::Start => policy.start_timeout,
            Self::Completion => policy.completion_timeout,
        }
    }

    fn timeout_error(self, pod: &str, timeout: Duration) -> ClusterError {
        let pod_name = String::from(pod);
        let seconds = timeout.as_secs();
        match self {
            Self::Start => ClusterError::StartTimeout {
                pod: pod_name,
                seconds,
            },
            Self::Completion => ClusterError::CompletionTimeout {
                pod: pod_name,
                seconds,
            },
        }
    }
}

/// Drives the pods of one namespace through their lifecycle.
pub struct PodLifecycle<'a, C: ?Sized> {
    client: &'a C,
    namespace: &'a str,
    policy: &'a PollPolicy,
    cancel: &'a CancellationToken,
}

impl<'a, C: PodClient + ?Sized> PodLifecycle<'a, C> {
    /// Create a controller for pods in `namespace`.
    #[must_use]
    pub const fn new(
        client: &'a C,
        namespace: &'a str,
        policy: &'a PollPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            namespace,
            policy,
            cancel,
        }
    }

    /// Submit the pod for `step` and return its name.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodCreateFailed` carrying the cluster's message
    /// when the pod is rejected. Creation is never retried.
    pub async fn create(&self, step: &Step) -> Result<String, PodstepError> {
        let pod = build_pod(step, self.namespace);
        let name = sanitize(step.name());

        self.client
            .create_pod(String::from(self.namespace), pod)
            .await
            .map_err(|error| {
                PodstepError::from(ClusterError::PodCreateFailed {
                    pod: name.clone(),
                    message: error.to_string(),
                })
            })?;

        info!(pod = %name, namespace = self.namespace, "pod created");
        Ok(name)
    }

    /// Poll pod `name` until it is no longer `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodNotFound` or `ClusterError::PodLookupFailed`
    /// when the pod cannot be fetched, `ClusterError::StartTimeout` when the
    /// start timeout elapses, and `ClusterError::Cancelled` when the engine is
    /// cancelled.
    pub async fn wait_for_start(&self, name: &str) -> Result<PodObservation, PodstepError> {
        let observation = self.poll(name, Stage::Start).await?;
        info!(pod = name, phase = %observation.phase, "pod started");
        Ok(observation)
    }

    /// Poll pod `name` until it finishes and report how its container exited.
    ///
    /// Waits while the pod is `Pending` or `Running`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodNotFound` or `ClusterError::PodLookupFailed`
    /// when the pod cannot be fetched, `ClusterError::MissingTerminalState`
    /// when the pod finished without a terminated container record,
    /// `ClusterError::CompletionTimeout` when the completion timeout elapses,
    /// and `ClusterError::Cancelled` when the engine is cancelled.
    pub async fn wait_for_completion(&self, name: &str) -> Result<ExecutionResult, PodstepError> {
        let observation = self.poll(name, Stage::Completion).await?;

        let Some(exit_code) = observation.exit_code else {
            return Err(PodstepError::from(ClusterError::MissingTerminalState {
                pod: String::from(name),
                phase: observation.phase.to_string(),
            }));
        };

        info!(pod = name, phase = %observation.phase, exit_code, "pod finished");
        Ok(ExecutionResult::exited_with(exit_code))
    }

    /// Fetch a fresh observation of pod `name`.
    ///
    /// Transport failures are retried up to the policy's `lookup_retries`;
    /// "not found" and rejections fail immediately.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::PodNotFound` when the pod does not exist,
    /// `ClusterError::PodLookupFailed` for any other failure, and
    /// `ClusterError::Cancelled` when cancelled between retries.
    pub async fn observe(&self, name: &str) -> Result<PodObservation, PodstepError> {
        let mut attempt = 0;
        loop {
            let error = match self
                .client
                .get_pod(String::from(self.namespace), String::from(name))
                .await
            {
                Ok(pod) => return Ok(PodObservation::from_pod(&pod)),
                Err(error) => error,
            };

            match ApiFailure::classify(&error) {
                ApiFailure::NotFound => {
                    return Err(PodstepError::from(ClusterError::PodNotFound {
                        pod: String::from(name),
                        namespace: String::from(self.namespace),
                    }));
                }
                ApiFailure::Transient if attempt < self.policy.lookup_retries => {
                    attempt += 1;
                    warn!(pod = name, attempt, error = %error, "retrying pod lookup");
                    self.pause(name).await?;
                }
                _ => {
                    return Err(PodstepError::from(ClusterError::PodLookupFailed {
                        pod: String::from(name),
                        message: error.to_string(),
                    }));
                }
            }
        }
    }

    async fn poll(&self, name: &str, stage: Stage) -> Result<PodObservation, PodstepError> {
        let timeout = stage.timeout(self.policy);
        let deadline = timeout.and_then(|limit| Instant::now().checked_add(limit));

        loop {
            self.ensure_not_cancelled(name)?;

            let observation = self.observe(name).await?;
            debug!(pod = name, phase = %observation.phase, "observed pod");
            if !stage.keeps_waiting(&observation.phase) {
                return Ok(observation);
            }

            if let (Some(limit), Some(at)) = (timeout, deadline)
                && Instant::now() >= at
            {
                return Err(PodstepError::from(stage.timeout_error(name, limit)));
            }

            self.pause(name).await?;
        }
    }

    async fn pause(&self, name: &str) -> Result<(), PodstepError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(cancelled(name)),
            () = tokio::time::sleep(self.policy.interval) => Ok(()),
        }
    }

    fn ensure_not_cancelled(&self, name: &str) -> Result<(), PodstepError> {
        if self.cancel.is_cancelled() {
            return Err(cancelled(name));
        }
        Ok(())
    }
}

fn cancelled(name: &str) -> PodstepError {
    PodstepError::from(ClusterError::Cancelled {
        pod: String::from(name),
    })
}
