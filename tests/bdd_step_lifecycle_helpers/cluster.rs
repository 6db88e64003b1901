//! In-memory cluster double for lifecycle scenarios.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStatus, Namespace, Pod, PodStatus,
};
use kube::error::ErrorResponse;
use podstep::engine::lifecycle::PodFuture;
use podstep::engine::logs::LogStreamFuture;
use podstep::engine::namespace::NamespaceFuture;
use podstep::engine::{LogStream, NamespaceClient, PodClient, PodLogClient};

/// Recorded cluster contents and the script for how pods progress.
#[derive(Debug, Default)]
struct Contents {
    namespaces: BTreeSet<String>,
    created_namespaces: Vec<String>,
    deleted_namespaces: Vec<String>,
    created_pods: Vec<(String, String)>,
    lookups: usize,
    phases: Vec<(&'static str, Option<i32>)>,
    output: Vec<u8>,
}

/// Shared handle to an in-memory cluster.
///
/// Clones observe the same contents, so the scenario can inspect what the
/// engine did after handing it a clone.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeCluster {
    contents: Arc<Mutex<Contents>>,
}

impl FakeCluster {
    fn contents(&self) -> MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn add_namespace(&self, name: String) {
        self.contents().namespaces.insert(name);
    }

    /// Script the phases reported by successive pod lookups; the last repeats.
    pub(crate) fn script_phases(&self, phases: Vec<(&'static str, Option<i32>)>) {
        self.contents().phases = phases;
    }

    pub(crate) fn set_output(&self, output: &str) {
        self.contents().output = Vec::from(output.as_bytes());
    }

    pub(crate) fn created_namespaces(&self) -> Vec<String> {
        self.contents().created_namespaces.clone()
    }

    pub(crate) fn deleted_namespaces(&self) -> Vec<String> {
        self.contents().deleted_namespaces.clone()
    }

    pub(crate) fn created_pods(&self) -> Vec<(String, String)> {
        self.contents().created_pods.clone()
    }
}

fn not_found(what: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: String::from("Failure"),
        message: format!("{what} not found"),
        reason: String::from("NotFound"),
        code: 404,
    })
}

fn pod_status(phase: &str, exit_code: Option<i32>) -> PodStatus {
    PodStatus {
        phase: Some(String::from(phase)),
        container_statuses: exit_code.map(|code| {
            vec![ContainerStatus {
                state: Some(ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: code,
                        ..ContainerStateTerminated::default()
                    }),
                    ..ContainerState::default()
                }),
                ..ContainerStatus::default()
            }]
        }),
        ..PodStatus::default()
    }
}

impl NamespaceClient for FakeCluster {
    fn get_namespace(&self, name: String) -> NamespaceFuture<'_, Namespace> {
        let result = if self.contents().namespaces.contains(&name) {
            let mut namespace = Namespace::default();
            namespace.metadata.name = Some(name);
            Ok(namespace)
        } else {
            Err(not_found("namespace"))
        };
        Box::pin(async move { result })
    }

    fn create_namespace(&self, namespace: Namespace) -> NamespaceFuture<'_, Namespace> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        {
            let mut contents = self.contents();
            contents.namespaces.insert(name.clone());
            contents.created_namespaces.push(name);
        }
        Box::pin(async move { Ok(namespace) })
    }

    fn delete_namespace(&self, name: String) -> NamespaceFuture<'_, ()> {
        {
            let mut contents = self.contents();
            contents.namespaces.remove(&name);
            contents.deleted_namespaces.push(name);
        }
        Box::pin(async { Ok(()) })
    }
}

impl PodClient for FakeCluster {
    fn create_pod(&self, namespace: String, pod: Pod) -> PodFuture<'_, Pod> {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.contents().created_pods.push((namespace, name));
        Box::pin(async move { Ok(pod) })
    }

    fn get_pod(&self, namespace: String, name: String) -> PodFuture<'_, Pod> {
        let result = {
            let mut contents = self.contents();
            let known = contents
                .created_pods
                .iter()
                .any(|(pod_namespace, pod_name)| *pod_namespace == namespace && *pod_name == name);
            let index = contents.lookups;
            contents.lookups += 1;
            let scripted = contents
                .phases
                .get(index)
                .or_else(|| contents.phases.last())
                .copied();
            match (known, scripted) {
                (true, Some((phase, exit_code))) => {
                    let mut pod = Pod::default();
                    pod.metadata.name = Some(name);
                    pod.status = Some(pod_status(phase, exit_code));
                    Ok(pod)
                }
                _ => Err(not_found("pod")),
            }
        };
        Box::pin(async move { result })
    }
}

impl PodLogClient for FakeCluster {
    fn follow_logs(&self, _namespace: String, _name: String) -> LogStreamFuture<'_> {
        let output = self.contents().output.clone();
        Box::pin(async move { Ok(Box::pin(Cursor::new(output)) as LogStream) })
    }
}
