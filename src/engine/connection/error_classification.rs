//! Error classification helpers for cluster API failures.
//!
//! This module sorts low-level `kube` errors into the handful of outcomes the
//! lifecycle cares about, so callers can tell "the object is gone" from "the
//! request never arrived".

use std::path::Path;

use crate::error::ClusterError;

const STATUS_NOT_FOUND: u16 = 404;
const STATUS_CONFLICT: u16 = 409;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const STATUS_SERVER_ERROR_FLOOR: u16 = 500;
const REASON_ALREADY_EXISTS: &str = "AlreadyExists";

/// Outcome of a failed cluster API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFailure {
    /// The addressed object does not exist.
    NotFound,
    /// The object being created already exists.
    AlreadyExists,
    /// The request did not complete; retrying may succeed.
    Transient,
    /// The API server rejected the request.
    Rejected,
}

impl ApiFailure {
    /// Classify a `kube` error.
    #[must_use]
    pub fn classify(error: &kube::Error) -> Self {
        match error {
            kube::Error::Api(response) => Self::from_status(response.code, &response.reason),
            kube::Error::HyperError(_) | kube::Error::Service(_) | kube::Error::ReadEvents(_) => {
                Self::Transient
            }
            _ => Self::Rejected,
        }
    }

    fn from_status(code: u16, reason: &str) -> Self {
        match code {
            STATUS_NOT_FOUND => Self::NotFound,
            STATUS_CONFLICT if reason == REASON_ALREADY_EXISTS => Self::AlreadyExists,
            STATUS_TOO_MANY_REQUESTS => Self::Transient,
            status if status >= STATUS_SERVER_ERROR_FLOOR => Self::Transient,
            _ => Self::Rejected,
        }
    }
}

/// Classify a failure raised while reading or loading a kubeconfig file.
pub(super) fn classify_kubeconfig_error(error: &dyn std::error::Error, path: &Path) -> ClusterError {
    if io_error_kind_in_chain(error) == Some(std::io::ErrorKind::NotFound) {
        return ClusterError::KubeconfigNotFound {
            path: path.to_path_buf(),
        };
    }

    ClusterError::ConnectionFailed {
        message: error.to_string(),
    }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<std::io::ErrorKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
