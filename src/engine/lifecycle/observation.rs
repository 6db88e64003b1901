//! Point-in-time views of a step's pod.

use std::fmt;

use k8s_openapi::api::core::v1::Pod;

/// Lifecycle phase reported by the cluster for a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    /// Accepted but not all containers are running yet.
    Pending,
    /// Bound to a node with at least one container running.
    Running,
    /// All containers terminated successfully.
    Succeeded,
    /// All containers terminated and at least one failed.
    Failed,
    /// The phase could not be obtained.
    Unknown,
    /// A phase value this backend does not recognise.
    Other(String),
}

impl PodPhase {
    /// Parse the phase string reported in pod status.
    #[must_use]
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Unknown" => Self::Unknown,
            other => Self::Other(String::from(other)),
        }
    }

    /// Return the phase as reported by the cluster.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
            Self::Other(phase) => phase,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly fetched snapshot of a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodObservation {
    /// Pod name.
    pub name: String,
    /// Reported phase.
    pub phase: PodPhase,
    /// Exit code of the first container, once it has terminated.
    pub exit_code: Option<i32>,
}

impl PodObservation {
    /// Summarise a pod returned by the cluster.
    ///
    /// A pod without a reported phase has only just been accepted and is
    /// treated as `Pending`.
    #[must_use]
    pub fn from_pod(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        let phase = status
            .and_then(|value| value.phase.as_deref())
            .map_or(PodPhase::Pending, PodPhase::parse);
        let exit_code = status
            .and_then(|value| value.container_statuses.as_ref())
            .and_then(|statuses| statuses.first())
            .and_then(|container| container.state.as_ref())
            .and_then(|state| state.terminated.as_ref())
            .map(|terminated| terminated.exit_code);

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase,
            exit_code,
        }
    }
}
