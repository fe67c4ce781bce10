//! HTTP transport used by the executor.
//!
//! The executor talks to the network through [`Transport`] so tests can
//! script responses and count attempts without a server.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::EcloudError;
use crate::request::Method;

/// Future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EcloudError>> + Send + 'a>>;

/// One fully signed HTTP exchange, ready to send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without the query string.
    pub url: String,
    /// Query parameters, encoded by the transport.
    pub query: Vec<(String, String)>,
    /// Headers to send, signature included.
    pub headers: Vec<(String, String)>,
    /// Body, only present for methods that carry one.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and body of an HTTP answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body decoded as text; empty when the server sent none.
    pub body: String,
}

impl HttpResponse {
    /// Builds a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one HTTP request and returns whatever the server answered.
///
/// Implementations must not retry; a transport error means the exchange
/// failed below HTTP (connection, timeout, I/O) and is reported as
/// [`EcloudError::Communication`].
pub trait Transport: Send + Sync {
    /// Sends `request`.
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport whose every call is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Communication`] when the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, EcloudError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(communication)?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
        Box::pin(async move {
            let mut builder = self.client.request(reqwest_method(request.method), &request.url);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(communication)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(communication)?;
            Ok(HttpResponse { status, body })
        })
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

fn communication(err: reqwest::Error) -> EcloudError {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    EcloudError::Communication {
        message: format!("{kind}: {err}"),
        body: None,
    }
}
