//! Semantic error types for the podstep backend.
//!
//! This module defines the error hierarchy for podstep, following the principle
//! of using semantic error enums (via `thiserror`) for conditions the caller
//! might inspect or map to a step failure, while reserving opaque errors
//! (`eyre::Report`) for the application boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered configuration system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - CLI argument parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Failed to build a client for the cluster API.
    #[error("failed to connect to cluster: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The kubeconfig file was not found.
    #[error("kubeconfig not found: {path}")]
    KubeconfigNotFound {
        /// The path where the kubeconfig was expected.
        path: PathBuf,
    },

    /// The API server did not answer a version probe correctly.
    #[error("cluster health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// The API server version probe timed out.
    #[error("cluster health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Failed to create the Tokio runtime for synchronous operations.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Looking up the managed namespace failed for a reason other than
    /// "not found".
    #[error("failed to look up namespace '{namespace}': {message}")]
    NamespaceLookupFailed {
        /// The namespace that was looked up.
        namespace: String,
        /// A description of the lookup failure.
        message: String,
    },

    /// The cluster rejected the namespace create request.
    #[error("failed to create namespace '{namespace}': {message}")]
    NamespaceCreateFailed {
        /// The namespace that could not be created.
        namespace: String,
        /// A description of the creation failure.
        message: String,
    },

    /// The cluster rejected the namespace delete request.
    #[error("failed to delete namespace '{namespace}': {message}")]
    NamespaceDeleteFailed {
        /// The namespace that could not be deleted.
        namespace: String,
        /// A description of the deletion failure.
        message: String,
    },

    /// The cluster rejected the pod create request.
    #[error("failed to create pod '{pod}': {message}")]
    PodCreateFailed {
        /// The sanitized pod name.
        pod: String,
        /// The rejection reported by the cluster.
        message: String,
    },

    /// The pod does not exist in the managed namespace.
    #[error("pod '{pod}' not found in namespace '{namespace}'")]
    PodNotFound {
        /// The sanitized pod name.
        pod: String,
        /// The namespace that was searched.
        namespace: String,
    },

    /// Fetching the pod failed.
    #[error("failed to look up pod '{pod}': {message}")]
    PodLookupFailed {
        /// The sanitized pod name.
        pod: String,
        /// A description of the lookup failure.
        message: String,
    },

    /// The pod left its active phases without a container terminal record.
    #[error("pod '{pod}' reached phase {phase} without a terminated container state")]
    MissingTerminalState {
        /// The sanitized pod name.
        pod: String,
        /// The last observed phase.
        phase: String,
    },

    /// The pod stayed pending for longer than the start timeout.
    #[error("pod '{pod}' did not start within {seconds} seconds")]
    StartTimeout {
        /// The sanitized pod name.
        pod: String,
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// The pod kept running for longer than the completion timeout.
    #[error("pod '{pod}' did not finish within {seconds} seconds")]
    CompletionTimeout {
        /// The sanitized pod name.
        pod: String,
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// Polling was cancelled by the caller.
    #[error("polling pod '{pod}' was cancelled")]
    Cancelled {
        /// The sanitized pod name.
        pod: String,
    },

    /// Opening the pod log stream failed.
    #[error("failed to stream logs for pod '{pod}': {message}")]
    LogStreamFailed {
        /// The sanitized pod name.
        pod: String,
        /// A description of the stream failure.
        message: String,
    },
}

/// Top-level error type for the podstep backend.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the crate. At the application boundary (main.rs), these
/// errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum PodstepError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while talking to the cluster.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// A specialised `Result` type for podstep operations.
pub type Result<T> = std::result::Result<T, PodstepError>;
