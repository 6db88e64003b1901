//! Mapping from step identifiers to cluster resource names.

/// Map a step identifier to a cluster-legal resource name.
///
/// Cluster names disallow underscores, so every `_` becomes `-`. All other
/// characters pass through unchanged. The same mapping is used when creating,
/// fetching, and streaming logs for a pod so all three address one object.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.replace('_', "-")
}
