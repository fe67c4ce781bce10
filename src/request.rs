//! Request values handed to the executor.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

use crate::credentials::EndpointContext;

/// HTTP methods understood by the cloud API.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
}

impl Method {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Whether a body, when supplied, is transmitted and described by
    /// content headers.
    #[must_use]
    pub const fn sends_body(self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// One logical API call: method, resource path, query and optional XML body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Resource path, with or without the endpoint and API prefix.
    pub path: String,
    /// Query parameters in caller order.
    pub query: Vec<(String, String)>,
    /// XML body. `None` and `Some("")` differ: only the former omits the
    /// content-length header on body-carrying methods.
    pub body: Option<String>,
}

impl ApiRequest {
    /// Creates a request without query or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the XML body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns a copy whose path is normalized against `context`, so that the
    /// signed path and the transmitted path are the same string.
    ///
    /// A query string written into the path (`/tasks?status=Running`) is
    /// decoded into query parameters ahead of the explicit ones, so it is
    /// signed and sent exactly once. A `#fragment` is dropped.
    #[must_use]
    pub fn normalized(&self, context: &EndpointContext) -> Self {
        let (path, inline_query) = split_inline_query(&self.path);
        let query = form_urlencoded::parse(inline_query.as_bytes())
            .into_owned()
            .chain(self.query.iter().cloned())
            .collect();
        Self {
            method: self.method,
            path: context.normalize_path(path),
            query,
            body: self.body.clone(),
        }
    }
}

fn split_inline_query(target: &str) -> (&str, &str) {
    let without_fragment = target.split('#').next().unwrap_or_default();
    without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("get", Method::Get)]
    #[case(" Post ", Method::Post)]
    #[case("DELETE", Method::Delete)]
    fn method_parses_case_insensitively(#[case] raw: &str, #[case] expected: Method) {
        assert_eq!(raw.parse::<Method>(), Ok(expected));
    }

    #[test]
    fn method_rejects_unknown_verbs() {
        assert!("PATCH".parse::<Method>().is_err());
    }

    #[test]
    fn normalized_keeps_query_and_body() {
        let context = EndpointContext::new("https://h", "2013-06-01");
        let request = ApiRequest::new(Method::Post, "/cloudapi/ecloud/virtualMachines/1/action/powerOn")
            .query("force", "true")
            .body("<x/>");
        let normalized = request.normalized(&context);
        assert_eq!(normalized.path, "/virtualMachines/1/action/powerOn");
        assert_eq!(normalized.query, request.query);
        assert_eq!(normalized.body.as_deref(), Some("<x/>"));
    }

    #[rstest]
    #[case("/tasks?status=Running", &[("status", "Running")])]
    #[case("/tasks?status=Running&page=2", &[("status", "Running"), ("page", "2")])]
    #[case("/tasks?name=web%20server", &[("name", "web server")])]
    #[case("/tasks?flag", &[("flag", "")])]
    #[case("/tasks?status=Running#top", &[("status", "Running")])]
    #[case("https://other.example.com/cloudapi/ecloud/tasks?status=Running", &[("status", "Running")])]
    fn normalized_moves_inline_query_into_parameters(
        #[case] path: &str,
        #[case] expected: &[(&str, &str)],
    ) {
        let context = EndpointContext::new("https://h", "2013-06-01");
        let normalized = ApiRequest::new(Method::Get, path).normalized(&context);
        assert_eq!(normalized.path, "/tasks");
        let query: Vec<(&str, &str)> = normalized
            .query
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        assert_eq!(query, expected);
    }

    #[test]
    fn inline_query_comes_before_explicit_parameters() {
        let context = EndpointContext::new("https://h", "2013-06-01");
        let normalized = ApiRequest::new(Method::Get, "/cloudapi/ecloud/tasks?page=2")
            .query("status", "Running")
            .normalized(&context);
        assert_eq!(normalized.path, "/tasks");
        assert_eq!(
            normalized.query,
            vec![
                (String::from("page"), String::from("2")),
                (String::from("status"), String::from("Running")),
            ]
        );
    }
}
