//! Error taxonomy for the resolution, request, aggregation and tap layers
//!
//! Each variant maps to a different corrective action for the user:
//! fix the resource name, pick a different command, or check connectivity
//! to the cluster / metrics backend.

use crate::models::ResourceKind;

/// Errors surfaced by the meshscope core
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// The named resource does not exist
    #[error("{kind} \"{name}\" not found in namespace \"{namespace}\"")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    /// The resource type is not valid for the requested operation
    #[error("unsupported resource type \"{kind}\" for {operation}")]
    UnsupportedResourceType {
        kind: String,
        operation: &'static str,
    },

    /// Mutually exclusive options were combined
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// A positional argument or option value could not be understood
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// One request of a concurrent batch failed; the first failure wins
    #[error("request #{index} for {target} failed: {source}")]
    AggregationFailure {
        index: usize,
        target: String,
        #[source]
        source: Box<MeshError>,
    },

    /// The tap event stream ended abruptly
    #[error("event stream terminated: {0}")]
    StreamTerminated(String),

    /// Kubernetes API failure
    #[error("cluster request failed: {0}")]
    Cluster(#[from] kube::Error),

    /// Metrics backend failure (transport, HTTP status or decoding)
    #[error("metrics backend error: {0}")]
    Backend(String),
}

impl MeshError {
    pub fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        MeshError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn unsupported(kind: impl ToString, operation: &'static str) -> Self {
        MeshError::UnsupportedResourceType {
            kind: kind.to_string(),
            operation,
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, MeshError>;
