//! Unit tests for request canonicalization and signing.

use chrono::{DateTime, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::credentials::{Credentials, DEFAULT_API_VERSION, EndpointContext};
use crate::request::{ApiRequest, Method};

const DATE: &str = "Mon, 01 Jan 2024 00:00:00 GMT";

#[fixture]
fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[fixture]
fn credentials() -> Credentials {
    Credentials::new("ACCESS", "secret-key")
}

#[fixture]
fn context() -> EndpointContext {
    EndpointContext::new("https://cloud.example.com", DEFAULT_API_VERSION)
}

#[rstest]
fn timestamp_uses_rfc1123_with_gmt(timestamp: DateTime<Utc>) {
    assert_eq!(format_timestamp(timestamp), DATE);
}

#[test]
fn string_to_sign_keeps_empty_leading_fields() {
    let rendered = string_to_sign("GET", "", "", DATE, "x-tmrk-date:d\n", "/r\n");
    assert_eq!(rendered, format!("GET\n\n\n{DATE}\nx-tmrk-date:d\n/r\n"));
    let fields: Vec<&str> = rendered.splitn(5, '\n').collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields.first().copied(), Some("GET"));
    assert_eq!(fields.get(3).copied(), Some(DATE));
}

#[test]
fn canonical_headers_sort_by_name_regardless_of_insertion_order() {
    let headers = [
        ("X-Tmrk-Version", "2013-06-01"),
        ("Accept", "application/xml"),
        ("X-Tmrk-Date", DATE),
    ];
    assert_eq!(
        canonical_headers(&headers),
        format!("x-tmrk-date:{DATE}\nx-tmrk-version:2013-06-01\n")
    );
}

#[test]
fn canonical_headers_exclude_authorization_and_trim() {
    let headers = [
        (" X-TMRK-Authorization ", "CloudApi stale"),
        ("  x-tmrk-foo ", "  Mixed Case  "),
        ("Content-Type", "application/xml"),
    ];
    assert_eq!(canonical_headers(&headers), "x-tmrk-foo:Mixed Case\n");
}

#[test]
fn canonical_resource_lowercases_path_and_sorts_query() {
    let query = [
        ("Zone", " West "),
        ("Name", "Web-01"),
    ];
    assert_eq!(
        canonical_resource("/cloudapi/ecloud", " /VirtualMachines/Computepools/9 ", &query),
        "/cloudapi/ecloud/virtualmachines/computepools/9\nname:Web-01\nzone:West\n"
    );
}

#[test]
fn canonical_resource_without_query_is_a_single_line() {
    let query: [(&str, &str); 0] = [];
    assert_eq!(
        canonical_resource("/cloudapi/ecloud", "/tasks/1", &query),
        "/cloudapi/ecloud/tasks/1\n"
    );
}

#[test]
fn authorization_value_has_expected_layout() {
    assert_eq!(
        authorization_value("AK", "c2ln"),
        r#"CloudApi AccessKey="AK" SignatureType="HmacSHA256" Signature="c2ln""#
    );
}

#[rstest]
fn sign_get_produces_known_signature(
    credentials: Credentials,
    context: EndpointContext,
    timestamp: DateTime<Utc>,
) {
    let request = ApiRequest::get("/tasks/42");
    let headers = RequestSigner::new(&credentials, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");

    assert_eq!(headers.get(DATE_HEADER), Some(DATE));
    assert_eq!(headers.get(VERSION_HEADER), Some(DEFAULT_API_VERSION));
    assert_eq!(headers.get("accept"), Some(XML_CONTENT_TYPE));
    assert_eq!(headers.get("Content-Length"), None);
    assert_eq!(headers.get("Content-Type"), None);
    assert_eq!(
        headers.get(AUTHORIZATION_HEADER),
        Some(r#"CloudApi AccessKey="ACCESS" SignatureType="HmacSHA256" Signature="bTxQzFQOXAMsENb+9UW0G6PWEKeaYYzq9fv2yEtKFDI=""#)
    );
}

#[rstest]
fn sign_post_with_body_covers_content_headers_and_query(
    credentials: Credentials,
    context: EndpointContext,
    timestamp: DateTime<Utc>,
) {
    let request = ApiRequest::new(Method::Post, "/virtualMachines/7/action/powerOn")
        .query("force", "true")
        .body("<Task/>");
    let headers = RequestSigner::new(&credentials, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");

    assert_eq!(headers.get("content-length"), Some("7"));
    assert_eq!(headers.get("content-type"), Some(XML_CONTENT_TYPE));
    assert_eq!(
        headers.get(AUTHORIZATION_HEADER),
        Some(r#"CloudApi AccessKey="ACCESS" SignatureType="HmacSHA256" Signature="mrnu+E08u6XuREoiuY42MnBXWHr5tpGRNFzEqFad5X0=""#)
    );
}

#[rstest]
fn empty_body_sets_length_without_type(
    credentials: Credentials,
    context: EndpointContext,
    timestamp: DateTime<Utc>,
) {
    let request = ApiRequest::new(Method::Delete, "/sshKeys/3").body("");
    let headers = RequestSigner::new(&credentials, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");

    assert_eq!(headers.get("content-length"), Some("0"));
    assert_eq!(headers.get("content-type"), None);
}

#[rstest]
fn get_ignores_body_for_content_headers(
    credentials: Credentials,
    context: EndpointContext,
    timestamp: DateTime<Utc>,
) {
    let request = ApiRequest::get("/tasks/42").body("<ignored/>");
    let with_body = RequestSigner::new(&credentials, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");
    let without_body = RequestSigner::new(&credentials, &context)
        .sign(&ApiRequest::get("/tasks/42"), timestamp)
        .expect("signing succeeds");

    assert_eq!(with_body.get("content-length"), None);
    assert_eq!(with_body, without_body);
}

#[rstest]
fn signature_changes_with_secret(context: EndpointContext, timestamp: DateTime<Utc>) {
    let request = ApiRequest::get("/tasks/42");
    let first = Credentials::new("ACCESS", "one");
    let second = Credentials::new("ACCESS", "two");
    let lhs = RequestSigner::new(&first, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");
    let rhs = RequestSigner::new(&second, &context)
        .sign(&request, timestamp)
        .expect("signing succeeds");

    assert_ne!(lhs.get(AUTHORIZATION_HEADER), rhs.get(AUTHORIZATION_HEADER));
}
