//! Kubeconfig resolution and cluster client construction.
//!
//! This module resolves which kubeconfig to load from explicit configuration
//! and the environment, then builds a `kube::Client` from it. The client is
//! created once and injected into the engine; nothing here is global state.

pub mod error_classification;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, info};

use self::error_classification::classify_kubeconfig_error;
use crate::error::{ClusterError, PodstepError};

/// Environment variable holding a list of kubeconfig paths.
const KUBECONFIG_ENV_VAR: &str = "KUBECONFIG";

/// Timeout in seconds for health check operations.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Resolves the kubeconfig path from environment variables.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait,
///   allowing for testable environment variable access.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use podstep::engine::KubeconfigResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = KubeconfigResolver::new(&env);
///
/// if let Some(path) = resolver.resolve_from_env() {
///     println!("Using kubeconfig: {path}");
/// }
/// ```
pub struct KubeconfigResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> KubeconfigResolver<'a, E> {
    /// Creates a new resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Returns the first non-empty entry of `KUBECONFIG`.
    ///
    /// Entries are separated with the platform path-list separator. Returns
    /// `None` when the variable is unset, empty, or holds no UTF-8 path.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<Utf8PathBuf> {
        let value = self.env.string(KUBECONFIG_ENV_VAR)?;
        std::env::split_paths(&value)
            .filter(|path| !path.as_os_str().is_empty())
            .find_map(|path| Utf8PathBuf::from_path_buf(path).ok())
    }
}

/// Which cluster to talk to and as whom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTarget {
    /// Explicit kubeconfig path; `None` falls back to inference.
    pub kubeconfig: Option<Utf8PathBuf>,
    /// Kubeconfig context to select; `None` uses the current context.
    pub context: Option<String>,
}

/// Builds `kube` clients for the cluster.
pub struct ClusterConnector;

impl ClusterConnector {
    /// Resolve the kubeconfig path without loading it.
    ///
    /// Resolution order:
    /// 1. `config_path` (from CLI, config file, or `PODSTEP_KUBECONFIG`)
    /// 2. First entry of `KUBECONFIG` (via resolver)
    /// 3. `None`, leaving the choice to in-cluster or `~/.kube/config` inference
    #[must_use]
    pub fn resolve_kubeconfig<E: mockable::Env>(
        config_path: Option<&Utf8Path>,
        resolver: &KubeconfigResolver<'_, E>,
    ) -> Option<Utf8PathBuf> {
        config_path
            .filter(|path| !path.as_str().is_empty())
            .map(Utf8Path::to_path_buf)
            .or_else(|| resolver.resolve_from_env())
    }

    /// Build a client for `target`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::KubeconfigNotFound` when an explicit kubeconfig
    /// does not exist, and `ClusterError::ConnectionFailed` when the
    /// configuration cannot be loaded or the client cannot be built.
    pub async fn connect(target: &ClusterTarget) -> Result<Client, PodstepError> {
        let options = KubeConfigOptions {
            context: target.context.clone(),
            ..KubeConfigOptions::default()
        };

        let config = match target.kubeconfig.as_deref() {
            Some(path) => {
                info!(kubeconfig = %path, "loading kubeconfig");
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|error| classify_kubeconfig_error(&error, path.as_std_path()))?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|error| classify_kubeconfig_error(&error, path.as_std_path()))?
            }
            None if target.context.is_some() => {
                debug!("loading default kubeconfig for explicit context");
                kube::Config::from_kubeconfig(&options)
                    .await
                    .map_err(connection_failed)?
            }
            None => {
                debug!("inferring cluster configuration");
                kube::Config::infer().await.map_err(connection_failed)?
            }
        };

        Client::try_from(config).map_err(connection_failed)
    }

    /// Connect using the resolved kubeconfig from configuration and environment.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect`].
    pub async fn connect_with_fallback<E: mockable::Env>(
        config_path: Option<&Utf8Path>,
        context: Option<&str>,
        resolver: &KubeconfigResolver<'_, E>,
    ) -> Result<Client, PodstepError> {
        let target = ClusterTarget {
            kubeconfig: Self::resolve_kubeconfig(config_path, resolver),
            context: context.map(String::from),
        };
        Self::connect(&target).await
    }

    /// Verify the API server is responsive.
    ///
    /// Requests the server version, which any authenticated client may read.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::HealthCheckFailed` if the server does not
    /// respond correctly.
    ///
    /// Returns `ClusterError::HealthCheckTimeout` if the check times out.
    pub async fn health_check(client: &Client) -> Result<(), PodstepError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        let version = tokio::time::timeout(timeout, client.apiserver_version())
            .await
            .map_err(|_| {
                PodstepError::from(ClusterError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|error| {
                PodstepError::from(ClusterError::HealthCheckFailed {
                    message: error.to_string(),
                })
            })?;

        debug!(version = %version.git_version, "cluster API server responded");
        Ok(())
    }

    /// Create a Tokio runtime for synchronous callers.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::RuntimeCreationFailed` if the runtime cannot be
    /// created.
    pub fn create_runtime() -> Result<tokio::runtime::Runtime, PodstepError> {
        tokio::runtime::Runtime::new().map_err(|error| {
            PodstepError::from(ClusterError::RuntimeCreationFailed {
                message: error.to_string(),
            })
        })
    }
}

fn connection_failed(error: impl std::fmt::Display) -> PodstepError {
    PodstepError::from(ClusterError::ConnectionFailed {
        message: error.to_string(),
    })
}
