//! Translation of step descriptors into pod manifests.
//!
//! Each step runs as a one-shot pod with a single container. The builder only
//! sets what the step declares; resource limits, volumes, and scheduling
//! constraints are left to the cluster defaults.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::naming::sanitize;
use super::step::Step;

const RESTART_POLICY_NEVER: &str = "Never";

/// Label key marking pods created by this backend.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label value marking pods created by this backend.
pub const MANAGED_BY_VALUE: &str = "podstep";

/// Build the pod manifest for `step` in `namespace`.
///
/// The pod and its only container share the sanitized step name. A pod never
/// restarts: a restart would hide or duplicate the step's exit code.
#[must_use]
pub fn build_pod(step: &Step, namespace: &str) -> Pod {
    let name = sanitize(step.name());

    Pod {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(String::from(namespace)),
            labels: Some(managed_labels()),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![build_container(step, name)],
            restart_policy: Some(String::from(RESTART_POLICY_NEVER)),
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

fn build_container(step: &Step, name: String) -> Container {
    Container {
        name,
        image: Some(String::from(step.image())),
        working_dir: Some(step.working_dir())
            .filter(|dir| !dir.is_empty())
            .map(String::from),
        command: build_command(step.entrypoint(), step.command()),
        env: build_env(step.environment()),
        ..Container::default()
    }
}

/// Entrypoint tokens followed by command tokens; `None` keeps the image default.
fn build_command(entrypoint: &[String], command: &[String]) -> Option<Vec<String>> {
    if entrypoint.is_empty() && command.is_empty() {
        return None;
    }

    Some(entrypoint.iter().chain(command).cloned().collect())
}

fn build_env(environment: &BTreeMap<String, String>) -> Option<Vec<EnvVar>> {
    if environment.is_empty() {
        return None;
    }

    Some(
        environment
            .iter()
            .map(|(key, value)| EnvVar {
                name: key.clone(),
                value: Some(value.clone()),
                ..EnvVar::default()
            })
            .collect(),
    )
}

fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        String::from(MANAGED_BY_LABEL),
        String::from(MANAGED_BY_VALUE),
    )])
}
