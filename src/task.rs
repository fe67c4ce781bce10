//! Asynchronous task records and poll policy.
//!
//! Mutating calls answer with a document that lists one or more `Task`
//! elements:
//!
//! ```xml
//! <Task href="/cloudapi/ecloud/tasks/100">
//!   <Operation>Create Server</Operation>
//!   <Status>Running</Status>
//!   <ErrorMessage/>
//! </Task>
//! ```
//!
//! The `href` is the handle polled until the status turns `Complete` or
//! `Error`.

use std::fmt;
use std::time::Duration;

use crate::document::{Document, Element};
use crate::error::EcloudError;

const TASK_ELEMENT: &str = "Task";
const OPERATION_ELEMENT: &str = "Operation";
const STATUS_ELEMENT: &str = "Status";
const ERROR_MESSAGE_ELEMENT: &str = "ErrorMessage";
const HREF_ATTRIBUTE: &str = "href";

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default overall wait for a task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);
/// How long an `Error` status without a message is tolerated before the
/// task is reported failed without further information.
pub const DEFAULT_ERROR_GRACE: Duration = Duration::from_secs(120);
/// Consecutive failed polls tolerated before giving up.
pub const DEFAULT_MAX_FAILED_POLLS: u32 = 5;

/// Message used when a task fails without ever reporting why.
pub const NO_ERROR_DETAILS: &str = "failed without further information";

/// Reference to a server-side asynchronous operation.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Wraps a task href.
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    /// Task href as returned by the API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskHandle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Status reported for a task.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TaskStatus {
    /// Accepted but not started.
    Queued,
    /// In progress.
    Running,
    /// Finished successfully; the mutation is visible.
    Complete,
    /// Finished unsuccessfully.
    Error,
    /// Any other value, treated as still in progress.
    Other(String),
}

impl TaskStatus {
    /// Parses a status, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("queued") {
            Self::Queued
        } else if trimmed.eq_ignore_ascii_case("running") {
            Self::Running
        } else if trimmed.eq_ignore_ascii_case("complete") {
            Self::Complete
        } else if trimmed.eq_ignore_ascii_case("error") {
            Self::Error
        } else {
            Self::Other(trimmed.to_owned())
        }
    }

    /// Whether polling stops at this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("Queued"),
            Self::Running => f.write_str("Running"),
            Self::Complete => f.write_str("Complete"),
            Self::Error => f.write_str("Error"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// The fields of a polled task the poller acts on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskSnapshot {
    /// Operation name, when reported.
    pub operation: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Non-blank error message, when reported.
    pub error_message: Option<String>,
}

impl TaskSnapshot {
    /// Reads the task from a poll response: the root when it is a `Task`,
    /// otherwise the first `Task` element in the document.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Protocol`] when no task or no status is present.
    pub fn from_document(document: &Document) -> Result<Self, EcloudError> {
        let task = document
            .descendants(TASK_ELEMENT)
            .into_iter()
            .next()
            .ok_or_else(|| EcloudError::Protocol(String::from("response holds no Task element")))?;
        Self::from_element(task)
    }

    fn from_element(task: &Element) -> Result<Self, EcloudError> {
        let status = task.child_text(STATUS_ELEMENT).ok_or_else(|| {
            EcloudError::Protocol(String::from("Task element has no Status"))
        })?;
        Ok(Self {
            operation: task.child_text(OPERATION_ELEMENT).map(str::to_owned),
            status: TaskStatus::parse(status),
            error_message: task
                .child_text(ERROR_MESSAGE_ELEMENT)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_owned),
        })
    }
}

/// Finds the handle of the task performing `operation` (for example
/// `Create Server`), matching the operation name case-insensitively.
///
/// Returns `None` when no task matches or the matching task has no `href`.
#[must_use]
pub fn find_task_handle(document: &Document, operation: &str) -> Option<TaskHandle> {
    let wanted = operation.trim();
    document
        .descendants(TASK_ELEMENT)
        .into_iter()
        .filter(|task| {
            task.child_text(OPERATION_ELEMENT)
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(wanted))
        })
        .find_map(|task| task.attribute(HREF_ATTRIBUTE))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(TaskHandle::new)
}

/// How a wait loop behaves.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Pause between polls.
    pub interval: Duration,
    /// Overall time allowed for the task.
    pub timeout: Duration,
    /// Tolerance for an `Error` status whose message has not appeared yet.
    pub error_grace: Duration,
    /// Consecutive failed polls tolerated.
    pub max_failed_polls: u32,
}

impl PollPolicy {
    /// Same policy with a different interval and timeout.
    #[must_use]
    pub const fn with_timing(self, interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            ..self
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
            error_grace: DEFAULT_ERROR_GRACE,
            max_failed_polls: DEFAULT_MAX_FAILED_POLLS,
        }
    }
}

/// How a wait loop ended without error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskOutcome {
    /// The task reported `Complete`.
    Completed,
    /// The caller stopped waiting. The server-side task keeps running.
    Cancelled,
}
