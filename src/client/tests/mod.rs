//! Unit tests for the executor and the task wait loop.


use std::time::Duration;

use rstest::fixture;

use crate::client::{EcloudClient, RetryPolicy};
use crate::credentials::{Credentials, EndpointContext};
use crate::test_support::ScriptedTransport;

const ENDPOINT: &str = "https://api.example.com";

fn client_with(transport: &ScriptedTransport) -> EcloudClient<ScriptedTransport> {
    EcloudClient::new(
        Credentials::new("ACCESS", "secret-key"),
        EndpointContext::new(ENDPOINT, "2013-06-01"),
        transport.clone(),
    )
    .with_retry_policy(RetryPolicy {
        delay: Duration::from_secs(1),
        ..RetryPolicy::DEFAULT
    })
}

#[fixture]
fn transport() -> ScriptedTransport {
    ScriptedTransport::new()
}
