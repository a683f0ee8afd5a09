//! Error types for the Arbor cluster controller
//!
//! Errors are structured with fields to aid debugging in production.
//! Variants carry contextual information like cluster names, reference
//! kinds, and remote task identifiers.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Arbor controller operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Name of the cluster with invalid configuration
        cluster: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.vantageEndpoint.credentialRef")
        field: Option<String>,
    },

    /// A declared reference whose target must exist but does not
    #[error("missing {kind} reference for {cluster}: {message}")]
    MissingReference {
        /// Name of the cluster declaring the reference
        cluster: String,
        /// Referenced resource kind (Secret, ConfigMap)
        kind: String,
        /// Description of what is dangling
        message: String,
    },

    /// Remote task reached a terminal non-success state
    ///
    /// The rendered message is the Vantage failure text verbatim; the
    /// literal status string stays available through [`Error::task_status`]
    /// for callers that branch on it.
    #[error("error_detail: {detail}, progress_message: {progress}")]
    TaskFailed {
        /// The literal status reported by the control plane (FAILED, INVALID_UUID, ...)
        status: String,
        /// Error detail reported by the control plane
        detail: String,
        /// Progress message reported by the control plane
        progress: String,
    },

    /// Remote control plane rejected the stored credentials
    ///
    /// Transport detail is hidden on purpose; callers only learn that the
    /// credentials were rejected.
    #[error("invalid Vantage credentials")]
    InvalidCredentials,

    /// Task query failed for a reason other than authentication
    #[error("task query failed for {task_uuid}: {message}")]
    TaskQuery {
        /// Identifier of the task being queried
        task_uuid: String,
        /// Description of the failure
        message: String,
    },

    /// Deadline elapsed while a watched task was still non-terminal
    ///
    /// Distinct from [`Error::TaskFailed`]: the remote operation may still
    /// be running, the caller merely gave up watching it.
    #[error("timed out waiting for task {task_uuid} to succeed")]
    WaitTimeout {
        /// Identifier of the task still running when the deadline hit
        task_uuid: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without cluster context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with cluster context and field path
    pub fn validation_for_field(
        cluster: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a missing-reference error for a dangling or absent reference
    pub fn missing_reference(
        cluster: impl Into<String>,
        kind: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::MissingReference {
            cluster: cluster.into(),
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a terminal task failure carrying the literal remote status
    pub fn task_failed(
        status: impl Into<String>,
        detail: impl Into<String>,
        progress: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            status: status.into(),
            detail: detail.into(),
            progress: progress.into(),
        }
    }

    /// Create a non-auth task query error
    pub fn task_query(task_uuid: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TaskQuery {
            task_uuid: task_uuid.into(),
            message: msg.into(),
        }
    }

    /// Create a wait-timeout error for the given task
    pub fn wait_timeout(task_uuid: impl Into<String>) -> Self {
        Self::WaitTimeout {
            task_uuid: task_uuid.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation errors and dangling references are not retryable (require
    /// a config fix), and neither is a terminal task failure or a credential
    /// rejection. Store errors depend on the response class; timeouts and
    /// transport-level query failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout).
                // Don't retry on 4xx errors (validation, not found, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::MissingReference { .. } => false,
            Error::TaskFailed { .. } => false,
            Error::InvalidCredentials => false,
            Error::TaskQuery { .. } => true,
            Error::WaitTimeout { .. } => true,
        }
    }

    /// Get the cluster name if this error is associated with a specific cluster
    pub fn cluster(&self) -> Option<&str> {
        match self {
            Error::Validation { cluster, .. } => Some(cluster),
            Error::MissingReference { cluster, .. } => Some(cluster),
            _ => None,
        }
    }

    /// Get the literal remote task status if this is a terminal task failure
    pub fn task_status(&self) -> Option<&str> {
        match self {
            Error::TaskFailed { status, .. } => Some(status),
            _ => None,
        }
    }
}
