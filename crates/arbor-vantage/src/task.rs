//! Task status classification and the polling waiter
//!
//! Everything long-running on Vantage is tracked as a task. A single
//! status query classifies the task into succeeded, still-running, or
//! failed-with-detail; the waiter polls that classification on a short
//! interval under the caller's deadline.

use std::time::Duration;

use tracing::debug;

use arbor_common::{Error, Result};

use crate::client::{ApiError, TaskState, VantageApi};

/// Interval between task status polls
pub const TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Query a task once and classify the response.
///
/// - Authentication failures collapse into [`Error::InvalidCredentials`];
///   the transport detail stays hidden.
/// - `SUCCEEDED` returns `Ok(TaskState::Succeeded)`.
/// - Any other state carrying a non-empty error detail or progress message
///   is a terminal failure: the returned [`Error::TaskFailed`] renders both
///   fields and keeps the literal status for callers that branch on it.
/// - Any other state with no failure detail is simply not finished yet and
///   is returned as-is.
pub async fn get_task_status(api: &dyn VantageApi, task_uuid: &str) -> Result<TaskState> {
    let task = match api.get_task(task_uuid).await {
        Ok(task) => task,
        Err(ApiError::Unauthorized) => return Err(Error::InvalidCredentials),
        Err(err) => return Err(Error::task_query(task_uuid, err.to_string())),
    };

    let detail = task.error_detail.unwrap_or_default();
    let progress = task.progress_message.unwrap_or_default();

    match task.status {
        TaskState::Succeeded => Ok(TaskState::Succeeded),
        status if !detail.is_empty() || !progress.is_empty() => {
            Err(Error::task_failed(status.as_str(), detail, progress))
        }
        status => Ok(status),
    }
}

/// Poll a task until it succeeds or fails.
///
/// Carries no deadline of its own: bound it with
/// [`wait_for_task_to_succeed`] or by selecting against another future.
/// Dropping the returned future cancels the in-flight query along with the
/// loop, so cancellation is observed even mid-request.
pub async fn wait_for_task(api: &dyn VantageApi, task_uuid: &str) -> Result<()> {
    loop {
        match get_task_status(api, task_uuid).await? {
            TaskState::Succeeded => return Ok(()),
            state => {
                debug!(task = %task_uuid, status = %state, "task not finished, polling again");
                tokio::time::sleep(TASK_POLL_INTERVAL).await;
            }
        }
    }
}

/// Poll a task until it succeeds, fails, or `timeout` elapses.
///
/// Deadline expiry yields [`Error::WaitTimeout`], distinct from a task
/// failure: the remote operation may still be running, the caller merely
/// gave up watching it.
pub async fn wait_for_task_to_succeed(
    api: &dyn VantageApi,
    task_uuid: &str,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, wait_for_task(api, task_uuid)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(Error::wait_timeout(task_uuid)),
    }
}
