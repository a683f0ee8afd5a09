//! Consumed Vantage API surface
//!
//! The controller only ever reads task resources; everything else it does
//! against Vantage happens through components outside this crate. The
//! transport (HTTP, auth, retries) lives behind [`VantageApi`] so task
//! logic and tests see classified errors instead of wire detail.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a Vantage task
///
/// The set is open on the wire: gateways add states over time, so unknown
/// values are preserved verbatim and round-trip unchanged.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    /// Accepted, not yet scheduled
    Queued,
    /// Currently executing
    Running,
    /// Scheduled, waiting on a resource
    Pending,
    /// Finished successfully
    Succeeded,
    /// Finished unsuccessfully
    Failed,
    /// The queried UUID names no task
    InvalidUuid,
    /// Any state this build does not know about
    Other(String),
}

impl TaskState {
    /// The wire form of this state
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Queued => "QUEUED",
            TaskState::Running => "RUNNING",
            TaskState::Pending => "PENDING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::InvalidUuid => "INVALID_UUID",
            TaskState::Other(s) => s,
        }
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "QUEUED" => TaskState::Queued,
            "RUNNING" => TaskState::Running,
            "PENDING" => TaskState::Pending,
            "SUCCEEDED" => TaskState::Succeeded,
            "FAILED" => TaskState::Failed,
            "INVALID_UUID" => TaskState::InvalidUuid,
            _ => TaskState::Other(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One task resource as the Vantage task endpoint reports it
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TaskInfo {
    /// Current task state
    pub status: TaskState,

    /// Failure detail, populated on terminal failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Last progress message reported by the executing service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
}

/// Errors surfaced by a Vantage transport
#[derive(Debug, Error)]
pub enum ApiError {
    /// The gateway rejected the request as unauthenticated (HTTP 401 class)
    #[error("unauthorized")]
    Unauthorized,

    /// The gateway answered with a non-auth error status
    #[error("api error {code}: {message}")]
    Api {
        /// HTTP status code of the response
        code: u16,
        /// Body or reason phrase of the response
        message: String,
    },

    /// The request never produced a response
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure
        message: String,
    },
}

/// Minimal Vantage surface the task components consume
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VantageApi: Send + Sync {
    /// Fetch one task by UUID
    async fn get_task(&self, task_uuid: &str) -> Result<TaskInfo, ApiError>;
}
