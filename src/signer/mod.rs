//! Canonical request signer.
//!
//! The string-to-sign is
//!
//! ```text
//! METHOD\n
//! content-length\n
//! content-type\n
//! date\n
//! canonicalized vendor headers (name:value\n, sorted by name)
//! canonicalized resource (lower-cased prefix + path\n, then name:value\n per query parameter)
//! ```
//!
//! and is signed with HMAC-SHA256 keyed by the secret key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::credentials::{Credentials, EndpointContext};
use crate::error::EcloudError;
use crate::request::ApiRequest;

type HmacSha256 = Hmac<Sha256>;

/// Prefix shared by every vendor header.
pub const VENDOR_HEADER_PREFIX: &str = "x-tmrk-";
/// Vendor date header.
pub const DATE_HEADER: &str = "x-tmrk-date";
/// Vendor protocol-version header.
pub const VERSION_HEADER: &str = "x-tmrk-version";
/// Vendor authorization header.
pub const AUTHORIZATION_HEADER: &str = "x-tmrk-authorization";
/// Media type of every request and response body.
pub const XML_CONTENT_TYPE: &str = "application/xml";
/// Signature type advertised in the authorization header.
pub const SIGNATURE_TYPE: &str = "HmacSHA256";

const ACCEPT_HEADER: &str = "Accept";
const CONTENT_LENGTH_HEADER: &str = "Content-Length";
const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Headers produced for one signed request, in the order they are sent.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SignedHeaders {
    headers: Vec<(String, String)>,
}

impl SignedHeaders {
    /// Looks up a header value by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Consumes the set, yielding owned pairs.
    #[must_use]
    pub fn into_vec(self) -> Vec<(String, String)> {
        self.headers
    }

    fn push(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_owned(), value.into()));
    }
}

/// Signs requests for one session.
#[derive(Clone, Copy, Debug)]
pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
    context: &'a EndpointContext,
}

impl<'a> RequestSigner<'a> {
    /// Binds the signer to the session credentials and endpoint.
    #[must_use]
    pub const fn new(credentials: &'a Credentials, context: &'a EndpointContext) -> Self {
        Self {
            credentials,
            context,
        }
    }

    /// Produces every header required to send `request` at `timestamp`.
    ///
    /// `request.path` must already be normalized; the executor does this so
    /// the signed and transmitted paths agree.
    ///
    /// # Errors
    ///
    /// Returns [`EcloudError::Signing`] when the HMAC engine rejects the key.
    pub fn sign(
        &self,
        request: &ApiRequest,
        timestamp: DateTime<Utc>,
    ) -> Result<SignedHeaders, EcloudError> {
        let date = format_timestamp(timestamp);
        let mut headers = SignedHeaders::default();
        headers.push(DATE_HEADER, date.as_str());
        headers.push(VERSION_HEADER, self.context.version());
        headers.push(ACCEPT_HEADER, XML_CONTENT_TYPE);

        let mut content_length = String::new();
        let mut content_type = "";
        if let Some(body) = request.body.as_deref().filter(|_| request.method.sends_body()) {
            content_length = body.len().to_string();
            headers.push(CONTENT_LENGTH_HEADER, content_length.as_str());
            if !body.is_empty() {
                content_type = XML_CONTENT_TYPE;
                headers.push(CONTENT_TYPE_HEADER, XML_CONTENT_TYPE);
            }
        }

        let string_to_sign = string_to_sign(
            request.method.as_str(),
            &content_length,
            content_type,
            &date,
            &canonical_headers(&headers.headers),
            &canonical_resource(self.context.api_prefix(), &request.path, &request.query),
        );
        let signature = hmac_base64(self.credentials.secret_key(), &string_to_sign)?;
        headers.push(
            AUTHORIZATION_HEADER,
            authorization_value(self.credentials.access_key(), &signature),
        );
        Ok(headers)
    }
}

/// Renders a timestamp in RFC 1123 form with a literal `GMT` zone.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Assembles the string-to-sign. The four leading fields are always
/// present, even when empty.
#[must_use]
pub fn string_to_sign(
    method: &str,
    content_length: &str,
    content_type: &str,
    date: &str,
    canonical_headers: &str,
    canonical_resource: &str,
) -> String {
    format!("{method}\n{content_length}\n{content_type}\n{date}\n{canonical_headers}{canonical_resource}")
}

/// Canonicalizes the vendor headers among `headers`.
///
/// Only names starting with the vendor prefix take part, the authorization
/// header excluded. Names are lower-cased and trimmed, values trimmed, and
/// the lines are sorted by name.
#[must_use]
pub fn canonical_headers<K, V>(headers: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut selected: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (name.as_ref().trim().to_ascii_lowercase(), value.as_ref().trim()))
        .filter(|(name, _)| name.starts_with(VENDOR_HEADER_PREFIX) && name != AUTHORIZATION_HEADER)
        .collect();
    selected.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
    selected
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

/// Canonicalizes the resource: the lower-cased, trimmed path under the API
/// prefix on its own line, then one `name:value` line per query parameter
/// with lower-cased names, trimmed values, sorted by name.
#[must_use]
pub fn canonical_resource<K, V>(api_prefix: &str, path: &str, query: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut resource = format!("{api_prefix}{}", path.trim()).to_lowercase();
    resource.push('\n');

    let mut params: Vec<(String, &str)> = query
        .iter()
        .map(|(name, value)| (name.as_ref().trim().to_lowercase(), value.as_ref().trim()))
        .collect();
    params.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
    for (name, value) in params {
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(value);
        resource.push('\n');
    }
    resource
}

/// Renders the authorization header value.
#[must_use]
pub fn authorization_value(access_key: &str, signature: &str) -> String {
    format!(r#"CloudApi AccessKey="{access_key}" SignatureType="{SIGNATURE_TYPE}" Signature="{signature}""#)
}

fn hmac_base64(secret: &[u8], message: &str) -> Result<String, EcloudError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|err| EcloudError::Signing {
        message: err.to_string(),
    })?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests;
