//! Namespace provisioning and teardown.
//!
//! Every engine instance owns one namespace. Setup makes sure it exists and
//! Destroy removes it, which takes every pod created for the run with it.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::api::{DeleteParams, PostParams};
use tracing::{debug, info, warn};

use super::connection::error_classification::ApiFailure;
use super::pod_spec::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::error::{ClusterError, PodstepError};

/// Boxed future type returned by [`NamespaceClient`] implementors.
pub type NamespaceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, kube::Error>> + Send + 'a>>;

/// Namespace operations required from the cluster API.
///
/// Keeping this behind a trait lets the provisioning rules be exercised
/// without a cluster.
pub trait NamespaceClient {
    /// Fetch a namespace by name.
    fn get_namespace(&self, name: String) -> NamespaceFuture<'_, Namespace>;

    /// Submit a namespace for creation.
    fn create_namespace(&self, namespace: Namespace) -> NamespaceFuture<'_, Namespace>;

    /// Request deletion of a namespace without waiting for it to finish.
    fn delete_namespace(&self, name: String) -> NamespaceFuture<'_, ()>;
}

impl NamespaceClient for kube::Client {
    fn get_namespace(&self, name: String) -> NamespaceFuture<'_, Namespace> {
        let api: Api<Namespace> = Api::all(self.clone());
        Box::pin(async move { api.get(&name).await })
    }

    fn create_namespace(&self, namespace: Namespace) -> NamespaceFuture<'_, Namespace> {
        let api: Api<Namespace> = Api::all(self.clone());
        Box::pin(async move { api.create(&PostParams::default(), &namespace).await })
    }

    fn delete_namespace(&self, name: String) -> NamespaceFuture<'_, ()> {
        let api: Api<Namespace> = Api::all(self.clone());
        Box::pin(async move {
            api.delete(&name, &DeleteParams::default())
                .await
                .map(|_| ())
        })
    }
}

/// Make sure `namespace` exists, creating it when the lookup reports it
/// missing.
///
/// A creation that loses a race against a concurrent creator is treated as
/// success.
///
/// # Errors
///
/// Returns `ClusterError::NamespaceLookupFailed` when the lookup fails for any
/// reason other than "not found", and `ClusterError::NamespaceCreateFailed`
/// when the creation request is rejected.
pub async fn ensure<C: NamespaceClient + ?Sized>(
    client: &C,
    namespace: &str,
    labels: &BTreeMap<String, String>,
) -> Result<(), PodstepError> {
    match client.get_namespace(String::from(namespace)).await {
        Ok(_) => {
            debug!(namespace, "namespace already exists");
            return Ok(());
        }
        Err(error) if ApiFailure::classify(&error) == ApiFailure::NotFound => {}
        Err(error) => {
            return Err(PodstepError::from(ClusterError::NamespaceLookupFailed {
                namespace: String::from(namespace),
                message: error.to_string(),
            }));
        }
    }

    match client
        .create_namespace(build_namespace(namespace, labels))
        .await
    {
        Ok(_) => {
            info!(namespace, "namespace created");
            Ok(())
        }
        Err(error) if ApiFailure::classify(&error) == ApiFailure::AlreadyExists => {
            warn!(namespace, "namespace was created concurrently");
            Ok(())
        }
        Err(error) => Err(PodstepError::from(ClusterError::NamespaceCreateFailed {
            namespace: String::from(namespace),
            message: error.to_string(),
        })),
    }
}

/// Request deletion of `namespace`.
///
/// Issues a single delete and returns once the API server accepts it; the
/// cluster finishes removing the namespace and its pods asynchronously.
///
/// # Errors
///
/// Returns `ClusterError::NamespaceDeleteFailed` when the delete request
/// fails.
pub async fn teardown<C: NamespaceClient + ?Sized>(
    client: &C,
    namespace: &str,
) -> Result<(), PodstepError> {
    client
        .delete_namespace(String::from(namespace))
        .await
        .map_err(|error| {
            PodstepError::from(ClusterError::NamespaceDeleteFailed {
                namespace: String::from(namespace),
                message: error.to_string(),
            })
        })?;

    info!(namespace, "namespace deletion requested");
    Ok(())
}

fn build_namespace(namespace: &str, labels: &BTreeMap<String, String>) -> Namespace {
    let mut all_labels = labels.clone();
    all_labels.insert(String::from(MANAGED_BY_LABEL), String::from(MANAGED_BY_VALUE));

    Namespace {
        metadata: ObjectMeta {
            name: Some(String::from(namespace)),
            labels: Some(all_labels),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}
