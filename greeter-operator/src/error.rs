//! Error types for the Greeter operator.

use crate::controller::ObjectKey;
use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error outside the reconcile path (CRD install).
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Reading the resource from the store failed for a reason other than absence.
    #[error("Failed to fetch {key}: {source}")]
    FetchFailed {
        /// Resource identity.
        key: ObjectKey,
        /// Underlying store error.
        #[source]
        source: kube::Error,
    },

    /// The status write was rejected because the resource version was stale.
    #[error("Status update conflict for {key}: resource version is stale")]
    Conflict {
        /// Resource identity.
        key: ObjectKey,
    },

    /// The status write failed for a reason other than a version conflict.
    #[error("Failed to update status of {key}: {source}")]
    WriteFailed {
        /// Resource identity.
        key: ObjectKey,
        /// Underlying store error.
        #[source]
        source: kube::Error,
    },

    /// The caller cancelled the attempt or its deadline expired.
    #[error("Reconciliation of {key} was cancelled")]
    Cancelled {
        /// Resource identity.
        key: ObjectKey,
    },

    /// The resource is missing identity metadata.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A resource kind was registered twice.
    #[error("Resource kind {0} is already registered")]
    DuplicateKind(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl OperatorError {
    /// Whether the dispatcher should retry the attempt later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. }
                | Self::Conflict { .. }
                | Self::WriteFailed { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Machine-readable reason, used for events and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::KubeError(_) => "KubeError",
            Self::FetchFailed { .. } => "FetchFailed",
            Self::Conflict { .. } => "Conflict",
            Self::WriteFailed { .. } => "WriteFailed",
            Self::Cancelled { .. } => "Cancelled",
            Self::InvalidResource(_) => "InvalidResource",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::DuplicateKind(_) => "DuplicateKind",
            Self::SerializationError(_) => "SerializationError",
        }
    }
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}
