//! Signed-request client for the Enterprise Cloud control-plane API.
//!
//! Every call is signed with an HMAC over a canonical rendering of the
//! request, sent through a [`transport::Transport`], and classified by
//! status. Transient server errors (`500`, `502`, `503`) are retried a
//! bounded number of times. Mutating calls return asynchronous tasks that
//! [`EcloudClient`] can poll to completion, and [`ids`] encodes the
//! composite identifiers used for resources the API addresses by more
//! than one value.

pub mod cli;
pub mod client;
pub mod config;
pub mod credentials;
pub mod document;
pub mod error;
pub mod ids;
pub mod request;
pub mod signer;
pub mod task;
pub mod test_support;
pub mod transport;

pub use client::{EcloudClient, RetryPolicy};
pub use config::{ConfigError, EcloudConfig};
pub use credentials::{Credentials, EndpointContext};
pub use document::{Document, Element};
pub use error::EcloudError;
pub use ids::{CompositeId, DecodeError, IdKind, decode_id, encode_id};
pub use request::{ApiRequest, Method};
pub use task::{PollPolicy, TaskHandle, TaskOutcome, TaskStatus};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
