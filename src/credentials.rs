//! Session-scoped credentials and endpoint context.
//!
//! Both values are immutable once built and are shared by every call made
//! through a client.

use std::fmt;

/// Fixed path prefix under which every API resource lives.
pub const API_PREFIX: &str = "/cloudapi/ecloud";

/// Protocol version sent when the caller does not choose one.
pub const DEFAULT_API_VERSION: &str = "2013-06-01";

/// Access key pair used to sign requests.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    access_key: String,
    secret_key: Vec<u8>,
}

impl Credentials {
    /// Builds credentials from the public access key and the secret key.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Public access key identifier.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &[u8] {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Where requests are sent and which protocol version they claim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EndpointContext {
    endpoint: String,
    api_prefix: String,
    version: String,
}

impl EndpointContext {
    /// Builds a context for `endpoint` (for example
    /// `https://services.enterprisecloud.terremark.com`) using the standard
    /// API prefix. Trailing slashes on the endpoint are dropped.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_prefix(endpoint, API_PREFIX, version)
    }

    /// Builds a context with a non-standard API prefix.
    #[must_use]
    pub fn with_prefix(
        endpoint: impl Into<String>,
        api_prefix: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let raw_endpoint: String = endpoint.into();
        let raw_prefix: String = api_prefix.into();
        let trimmed_prefix = raw_prefix.trim().trim_end_matches('/');
        let prefix = if trimmed_prefix.is_empty() || trimmed_prefix.starts_with('/') {
            trimmed_prefix.to_owned()
        } else {
            format!("/{trimmed_prefix}")
        };
        Self {
            endpoint: raw_endpoint.trim().trim_end_matches('/').to_owned(),
            api_prefix: prefix,
            version: version.into().trim().to_owned(),
        }
    }

    /// Base URI without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// API prefix, starting with `/` and without a trailing slash.
    #[must_use]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Protocol version sent in the version header.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a caller-supplied path.
    ///
    /// Callers may pass a bare resource path (`/tasks/1`), a path that still
    /// carries the API prefix (`/cloudapi/ecloud/tasks/1`), or a full href
    /// (`https://host/cloudapi/ecloud/tasks/1`). The endpoint and prefix are
    /// stripped case-insensitively, since hrefs returned by the API do not
    /// use consistent casing, and the result always starts with exactly one
    /// `/`. The scheme and host of an href naming another host are dropped
    /// as well. A `?query` is left in place; [`crate::ApiRequest::normalized`]
    /// splits it off before calling this.
    #[must_use]
    pub fn normalize_path(&self, path: &str) -> String {
        let trimmed = path.trim();
        let mut rest = strip_prefix_ignore_case(trimmed, &self.endpoint)
            .unwrap_or_else(|| strip_scheme_and_host(trimmed));
        if let Some(stripped) = strip_prefix_ignore_case(rest, &self.api_prefix)
            .filter(|tail| tail.is_empty() || tail.starts_with(['/', '?']))
        {
            rest = stripped;
        }
        format!("/{}", rest.trim_start_matches('/'))
    }

    /// Absolute URL for an already normalized path.
    #[must_use]
    pub fn url_for(&self, normalized_path: &str) -> String {
        format!("{}{}{}", self.endpoint, self.api_prefix, normalized_path)
    }
}

/// Drops a leading `scheme://host[:port]` from an absolute href, keeping
/// the path and anything after it. Relative paths come back unchanged.
pub(crate) fn strip_scheme_and_host(href: &str) -> &str {
    let Some((scheme, after_scheme)) = href.split_once("://") else {
        return href;
    };
    let is_scheme = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !is_scheme {
        return href;
    }
    after_scheme
        .find(['/', '?', '#'])
        .and_then(|start| after_scheme.get(start..))
        .unwrap_or_default()
}

/// Strips `prefix` from `value` ignoring ASCII case.
pub(crate) fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}
