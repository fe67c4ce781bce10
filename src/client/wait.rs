//! Task completion wait loop.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::EcloudError;
use crate::request::{ApiRequest, Method};
use crate::task::{NO_ERROR_DETAILS, PollPolicy, TaskHandle, TaskOutcome, TaskSnapshot, TaskStatus};
use crate::transport::Transport;

use super::EcloudClient;

impl<T: Transport> EcloudClient<T> {
    /// Polls `handle` every `poll_interval` until the task completes, fails,
    /// or `timeout` elapses. Grace period and failed-poll ceiling come from
    /// the client's poll policy.
    ///
    /// # Errors
    ///
    /// See [`EcloudClient::wait_with_policy`].
    pub async fn wait_for_completion(
        &self,
        handle: &TaskHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TaskOutcome, EcloudError> {
        self.wait_for_completion_with_cancel(
            handle,
            poll_interval,
            timeout,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`EcloudClient::wait_for_completion`], but stops early with
    /// [`TaskOutcome::Cancelled`] once `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`EcloudClient::wait_with_policy`].
    pub async fn wait_for_completion_with_cancel(
        &self,
        handle: &TaskHandle,
        poll_interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, EcloudError> {
        let policy = self.poll.with_timing(poll_interval, timeout);
        self.wait_with_policy(handle, &policy, cancel).await
    }

    /// Runs the wait loop under an explicit policy.
    ///
    /// Cancellation only stops the waiting; the server-side task is left
    /// alone.
    ///
    /// # Errors
    ///
    /// - [`EcloudError::TaskFailed`] when the task reports `Error`, either
    ///   with its message or, after the grace period, without one.
    /// - [`EcloudError::TimedOut`] when the task is still pending after the
    ///   timeout. A task in `Error` without a message is not timed out; its
    ///   grace period runs to the end first.
    /// - [`EcloudError::TaskStatusUnavailable`] after too many consecutive
    ///   failed polls.
    /// - Any other executor error, unchanged.
    pub async fn wait_with_policy(
        &self,
        handle: &TaskHandle,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<TaskOutcome, EcloudError> {
        let started = Instant::now();
        let mut state = PollState::default();

        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(cancelled(handle)),
                result = self.poll_task(handle) => result,
            };

            if let Some(finished) = state.observe(handle, policy, polled) {
                return finished;
            }

            let waited = started.elapsed();
            if waited > policy.timeout && !state.awaiting_error_details {
                return Err(EcloudError::TimedOut {
                    task: handle.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(cancelled(handle)),
                () = sleep(policy.interval) => {}
            }
        }
    }

    /// Sends a mutating call, then waits for the task performing
    /// `operation` to complete and returns the call's original response.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Protocol`] when the response names no such
    /// task, plus every error of [`EcloudClient::send`] and
    /// [`EcloudClient::wait_for_completion`].
    pub async fn execute_and_wait(
        &self,
        request: &ApiRequest,
        operation: &str,
        timeout: Duration,
    ) -> Result<Document, EcloudError> {
        let document = self.send(request).await?;
        let handle = self.find_task_handle(&document, operation).ok_or_else(|| {
            EcloudError::Protocol(format!("response to {} {} holds no '{operation}' task", request.method, request.path))
        })?;
        self.wait_for_completion(&handle, self.poll.interval, timeout)
            .await?;
        Ok(document)
    }

    async fn poll_task(&self, handle: &TaskHandle) -> Result<TaskSnapshot, EcloudError> {
        let document = self
            .send(&ApiRequest::new(Method::Get, handle.as_str()))
            .await?;
        TaskSnapshot::from_document(&document)
    }
}

/// Counters carried between polls.
#[derive(Debug, Default)]
struct PollState {
    failed_polls: u32,
    error_seen_at: Option<Instant>,
    /// Set while the last status was `Error` without a message; the grace
    /// period then decides the outcome instead of the timeout.
    awaiting_error_details: bool,
}

impl PollState {
    /// Folds one poll result into the state; `Some` ends the wait.
    fn observe(
        &mut self,
        handle: &TaskHandle,
        policy: &PollPolicy,
        polled: Result<TaskSnapshot, EcloudError>,
    ) -> Option<Result<TaskOutcome, EcloudError>> {
        match polled {
            Ok(snapshot) => {
                self.failed_polls = 0;
                debug!(task = %handle, status = %snapshot.status, "polled task");
                self.observe_status(handle, policy, snapshot)
            }
            Err(err) if err.is_failed_poll() => {
                self.failed_polls += 1;
                warn!(task = %handle, failed_polls = self.failed_polls, error = %err, "task poll failed");
                (self.failed_polls >= policy.max_failed_polls).then(|| {
                    Err(EcloudError::TaskStatusUnavailable {
                        task: handle.to_string(),
                        failures: self.failed_polls,
                        last_error: err.to_string(),
                    })
                })
            }
            Err(err) => Some(Err(err)),
        }
    }

    fn observe_status(
        &mut self,
        handle: &TaskHandle,
        policy: &PollPolicy,
        snapshot: TaskSnapshot,
    ) -> Option<Result<TaskOutcome, EcloudError>> {
        match snapshot.status {
            TaskStatus::Complete => {
                info!(task = %handle, "task complete");
                Some(Ok(TaskOutcome::Completed))
            }
            TaskStatus::Error => {
                if let Some(message) = snapshot.error_message {
                    return Some(Err(task_failed(handle, message)));
                }
                self.awaiting_error_details = true;
                let first_seen = *self.error_seen_at.get_or_insert_with(|| {
                    warn!(task = %handle, "task in error without a message; waiting for details");
                    Instant::now()
                });
                (first_seen.elapsed() >= policy.error_grace)
                    .then(|| Err(task_failed(handle, String::from(NO_ERROR_DETAILS))))
            }
            TaskStatus::Queued | TaskStatus::Running | TaskStatus::Other(_) => {
                self.awaiting_error_details = false;
                None
            }
        }
    }
}

fn task_failed(handle: &TaskHandle, message: String) -> EcloudError {
    warn!(task = %handle, message = %message, "task failed");
    EcloudError::TaskFailed {
        task: handle.to_string(),
        message,
    }
}

fn cancelled(handle: &TaskHandle) -> TaskOutcome {
    info!(task = %handle, "stopped waiting for task");
    TaskOutcome::Cancelled
}
