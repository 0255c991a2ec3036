//! Request metadata and URL construction.

use crate::params::Params;
use crate::{Error, Result};
use http::Method;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Query parameter appended to every request.
pub const OUTPUT_FORMAT_PARAM: &str = "outputFormat=json";

/// Selects which configured base URI a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointType {
    /// Read-only traffic, configured as `uri.ro`.
    #[default]
    ReadOnly,
    /// Read-write traffic, configured as `uri.rw`.
    ReadWrite,
}

impl EndpointType {
    /// Returns the configuration key of this endpoint type, `ro` or `rw`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::ReadOnly => "ro",
            EndpointType::ReadWrite => "rw",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ro" => Ok(EndpointType::ReadOnly),
            "rw" => Ok(EndpointType::ReadWrite),
            other => Err(Error::Configuration(format!(
                "Unknown endpoint type `{}`",
                other
            ))),
        }
    }
}

/// Metadata for an individual API call.
///
/// GET requests carry only `query`. POST requests send `form` as an
/// `application/x-www-form-urlencoded` body and may carry `query` as well.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET or POST).
    pub method: Method,

    /// Which base URI to use.
    pub endpoint: EndpointType,

    /// The request path, relative to the base URI.
    pub path: String,

    /// Parameters for the query string.
    pub query: Params,

    /// Parameters for the form body.
    pub form: Params,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, endpoint: EndpointType, path: impl Into<String>) -> Self {
        Self {
            method,
            endpoint,
            path: path.into(),
            query: Params::new(),
            form: Params::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(endpoint: EndpointType, path: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, path)
    }

    /// Creates a POST request.
    pub fn post(endpoint: EndpointType, path: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint, path)
    }

    /// Replaces the query parameters.
    pub fn with_query(mut self, query: Params) -> Self {
        self.query = query;
        self
    }

    /// Replaces the form parameters.
    pub fn with_form(mut self, form: Params) -> Self {
        self.form = form;
        self
    }

    /// Builds the target URL against `base_uri`.
    ///
    /// The result is `base_uri/path?outputFormat=json` followed by the
    /// encoded query parameters. Surrounding whitespace and trailing slashes
    /// are trimmed from the base, leading slashes from the path.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::metadata::{EndpointType, RequestMetadata};
    /// use nodegroups_client::Params;
    ///
    /// let request = RequestMetadata::get(EndpointType::ReadOnly, "/v1/r/list_nodes.php")
    ///     .with_query(Params::new().with("nodegroup", "web servers"));
    ///
    /// assert_eq!(
    ///     request.url_string("http://ng.example.com/api/"),
    ///     "http://ng.example.com/api/v1/r/list_nodes.php?outputFormat=json&nodegroup=web%20servers"
    /// );
    /// ```
    pub fn url_string(&self, base_uri: &str) -> String {
        let mut url = format!(
            "{}/{}?{}",
            base_uri.trim().trim_end_matches('/'),
            self.path.trim().trim_start_matches('/'),
            OUTPUT_FORMAT_PARAM
        );

        if !self.query.is_empty() {
            let encoded = self.query.encode();
            if !encoded.is_empty() {
                url.push('&');
                url.push_str(&encoded);
            }
        }

        url
    }

    /// Builds and parses the target URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the result is not a valid URL.
    pub fn url(&self, base_uri: &str) -> Result<Url> {
        Ok(Url::parse(&self.url_string(base_uri))?)
    }

    /// Returns the encoded form body, or `None` when there is nothing to send.
    pub fn body(&self) -> Option<String> {
        if self.method == Method::POST {
            Some(self.form.encode())
        } else {
            None
        }
    }
}
