//! Signed request execution with bounded retry of transient server errors.

use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::EcloudError;
use crate::request::{ApiRequest, Method};
use crate::signer::RequestSigner;
use crate::transport::{HttpRequest, HttpResponse, Transport};

use super::EcloudClient;

/// Attempts made for one call before transient errors become terminal.
pub const MAX_ATTEMPTS: u32 = 5;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry behaviour for `500`, `502` and `503` answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Five attempts, one second apart.
    pub const DEFAULT: Self = Self {
        max_attempts: MAX_ATTEMPTS,
        delay: RETRY_DELAY,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl<T: Transport> EcloudClient<T> {
    /// Executes one logical call and returns the parsed response.
    ///
    /// # Errors
    ///
    /// See [`EcloudClient::send`].
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<Document, EcloudError> {
        let mut request = ApiRequest::new(method, path);
        request.query = query
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        request.body = body.map(str::to_owned);
        self.send(&request).await
    }

    /// Sends `request`, retrying transient server errors.
    ///
    /// Every attempt is signed afresh, so retries carry a current date.
    ///
    /// # Errors
    ///
    /// - [`EcloudError::Signing`] when the signature cannot be computed.
    /// - [`EcloudError::Authorization`] on `403`, never retried.
    /// - [`EcloudError::Communication`] on network failure, or once every
    ///   attempt has ended in `500`, `502` or `503`.
    /// - [`EcloudError::UnexpectedStatus`] on any other non-success status.
    /// - [`EcloudError::Protocol`] when a success body is not XML.
    pub async fn send(&self, request: &ApiRequest) -> Result<Document, EcloudError> {
        let normalized = request.normalized(&self.context);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                method = %normalized.method,
                path = %normalized.path,
                attempt,
                "sending cloud API request"
            );
            let response = self.send_once(&normalized).await?;
            match classify(&normalized, response) {
                Err(EcloudError::TransientServer { status, path, body }) => {
                    if attempt >= max_attempts {
                        return Err(EcloudError::Communication {
                            message: format!(
                                "{} {path} kept failing with status {status} after {attempt} attempts",
                                normalized.method
                            ),
                            body: Some(body).filter(|text| !text.is_empty()),
                        });
                    }
                    warn!(
                        method = %normalized.method,
                        path = %path,
                        status,
                        attempt,
                        "transient server error; retrying"
                    );
                    sleep(self.retry.delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<HttpResponse, EcloudError> {
        let headers = RequestSigner::new(&self.credentials, &self.context).sign(request, Utc::now())?;
        let http = HttpRequest {
            method: request.method,
            url: self.context.url_for(&request.path),
            query: request.query.clone(),
            headers: headers.into_vec(),
            body: request
                .body
                .clone()
                .filter(|_| request.method.sends_body()),
        };
        self.transport.send(http).await
    }
}

/// Maps an HTTP answer onto a document or a typed error.
fn classify(request: &ApiRequest, response: HttpResponse) -> Result<Document, EcloudError> {
    let HttpResponse { status, body } = response;
    debug!(method = %request.method, path = %request.path, status, "cloud API response");
    match status {
        200..=202 => Document::parse(&body),
        204 => Ok(Document::empty()),
        403 => Err(EcloudError::Authorization {
            method: request.method.to_string(),
            path: request.path.clone(),
            body,
        }),
        500 | 502 | 503 => Err(EcloudError::TransientServer {
            status,
            path: request.path.clone(),
            body,
        }),
        _ => Err(EcloudError::UnexpectedStatus {
            status,
            method: request.method.to_string(),
            path: request.path.clone(),
            body,
        }),
    }
}
