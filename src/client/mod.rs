//! Session facade over the signer, executor and task poller.

mod execute;
mod wait;

use crate::config::EcloudConfig;
use crate::credentials::{Credentials, EndpointContext};
use crate::document::Document;
use crate::error::EcloudError;
use crate::task::{self, PollPolicy, TaskHandle};
use crate::transport::{ReqwestTransport, Transport};

pub use execute::{MAX_ATTEMPTS, RetryPolicy};

/// Client bound to one set of credentials and one endpoint.
///
/// The client holds no mutable state, so clones and concurrent calls need
/// no locking. Identical concurrent requests are not collapsed into one.
#[derive(Clone, Debug)]
pub struct EcloudClient<T> {
    credentials: Credentials,
    context: EndpointContext,
    transport: T,
    retry: RetryPolicy,
    poll: PollPolicy,
}

impl<T: Transport> EcloudClient<T> {
    /// Builds a client with default retry and poll policies.
    #[must_use]
    pub fn new(credentials: Credentials, context: EndpointContext, transport: T) -> Self {
        Self {
            credentials,
            context,
            transport,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }

    /// Replaces the transient-error retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the default task wait policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub const fn context(&self) -> &EndpointContext {
        &self.context
    }

    /// Transport in use.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Default task wait policy.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Locates the handle of the task performing `operation` in a response.
    #[must_use]
    pub fn find_task_handle(&self, document: &Document, operation: &str) -> Option<TaskHandle> {
        task::find_task_handle(document, operation)
    }
}

impl EcloudClient<ReqwestTransport> {
    /// Builds a `reqwest`-backed client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Config`] when validation fails and
    /// [`EcloudError::Communication`] when the HTTP client cannot be built.
    pub fn from_config(config: &EcloudConfig) -> Result<Self, EcloudError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.http_timeout())?;
        Ok(Self::new(config.credentials(), config.endpoint_context(), transport)
            .with_retry_policy(config.retry_policy())
            .with_poll_policy(config.poll_policy()))
    }
}

#[cfg(test)]
mod tests;
