//! Error types for nodegroups API calls.
//!
//! Every failure a call can produce is a variant of [`Error`]. The `Display`
//! text of each variant is the client-visible error string for that failure,
//! and [`Error::status_code`] is the matching status string. Failures the
//! client detects itself report `"500"`; failures the API reports keep the
//! API's own status.

use crate::JsonObject;
use http::StatusCode;

/// Status string reported for failures detected on the client side.
pub const CLIENT_FAILURE_STATUS: &str = "500";

/// The main error type for nodegroups API calls.
///
/// Only the configuration class ([`Error::Configuration`] and
/// [`Error::InvalidUrl`]) is fatal. Everything else is an ordinary failed
/// call that the caller is expected to inspect and move on from.
///
/// # Examples
///
/// ```no_run
/// use nodegroups_client::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.get_nodes_from_nodegroup("web").await {
///     Ok(nodes) => println!("nodes: {:?}", nodes.data),
///     Err(Error::Api { status, message, .. }) => {
///         eprintln!("API refused the request ({}): {}", status, message);
///     }
///     Err(e) if e.is_fatal() => return Err(e),
///     Err(e) => eprintln!("call failed ({}): {}", e.status_code(), e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The client is missing required setup: an unreadable or unparseable
    /// configuration file, an unresolved endpoint type, or a malformed
    /// configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configured base URI and path did not form a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A network-level error occurred (connection refused, DNS, TLS, ...).
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The transport could not be prepared for the call, for example because
    /// the configured CA bundle could not be read.
    #[error("{0}")]
    Transport(String),

    /// The server answered with an HTTP status other than 200.
    #[error("API returned HTTP code: {}", .status.as_u16())]
    HttpStatus {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
    },

    /// The body was not valid JSON, or did not decode to an object.
    #[error("API returned invalid JSON")]
    InvalidJson {
        /// The raw response body
        raw_response: String,
    },

    /// The decoded body has no `status` field.
    #[error("No status field")]
    MissingStatus {
        /// The raw response body
        raw_response: String,
    },

    /// The API answered with a status other than `"200"`.
    ///
    /// The message and status are the API's own, and the decoded body is kept.
    #[error("{message}")]
    Api {
        /// The API's `status` field
        status: String,
        /// The API's `message` field, empty if absent
        message: String,
        /// The decoded response body
        output: JsonObject,
    },

    /// A successful response lacked a field the helper needs.
    #[error("{0}")]
    MissingField(String),
}

impl Error {
    /// Returns the status string associated with this failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::Error;
    ///
    /// let err = Error::Api {
    ///     status: "404".to_string(),
    ///     message: "not found".to_string(),
    ///     output: Default::default(),
    /// };
    /// assert_eq!(err.status_code(), "404");
    /// assert_eq!(err.to_string(), "not found");
    ///
    /// let err = Error::MissingField("Records field not in API output".to_string());
    /// assert_eq!(err.status_code(), "500");
    /// ```
    pub fn status_code(&self) -> &str {
        match self {
            Error::Api { status, .. } => status,
            _ => CLIENT_FAILURE_STATUS,
        }
    }

    /// Returns `true` for configuration failures, which abort the operation
    /// instead of describing a failed call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::InvalidUrl(_))
    }

    /// Returns the HTTP status code if the server answered with a non-200.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpStatus { raw_response, .. } => Some(raw_response),
            Error::InvalidJson { raw_response } => Some(raw_response),
            Error::MissingStatus { raw_response } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the decoded body of an API-level failure.
    pub fn output(&self) -> Option<&JsonObject> {
        match self {
            Error::Api { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// A specialized `Result` type for nodegroups API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_detected_failures_report_500() {
        let errors = vec![
            Error::Timeout,
            Error::Transport("no CA bundle".to_string()),
            Error::HttpStatus {
                status: StatusCode::NOT_FOUND,
                raw_response: String::new(),
            },
            Error::InvalidJson {
                raw_response: "nope".to_string(),
            },
            Error::MissingStatus {
                raw_response: "{}".to_string(),
            },
            Error::MissingField("Details field not in API output".to_string()),
            Error::Configuration("No such file: /nowhere".to_string()),
        ];

        for err in errors {
            assert_eq!(err.status_code(), "500", "{:?}", err);
        }
    }

    #[test]
    fn test_messages() {
        let err = Error::HttpStatus {
            status: StatusCode::NOT_FOUND,
            raw_response: "gone".to_string(),
        };
        assert_eq!(err.to_string(), "API returned HTTP code: 404");
        assert_eq!(err.raw_response(), Some("gone"));
        assert_eq!(err.http_status(), Some(StatusCode::NOT_FOUND));

        let err = Error::InvalidJson {
            raw_response: "<html>".to_string(),
        };
        assert_eq!(err.to_string(), "API returned invalid JSON");

        let err = Error::MissingStatus {
            raw_response: "{}".to_string(),
        };
        assert_eq!(err.to_string(), "No status field");
    }

    #[test]
    fn test_api_error_keeps_output() {
        let mut output = JsonObject::new();
        output.insert("status".to_string(), "403".into());
        output.insert("message".to_string(), "denied".into());

        let err = Error::Api {
            status: "403".to_string(),
            message: "denied".to_string(),
            output,
        };

        assert_eq!(err.status_code(), "403");
        assert_eq!(err.to_string(), "denied");
        assert!(!err.is_fatal());
        assert_eq!(
            err.output()
                .and_then(|o| o.get("message"))
                .and_then(|v| v.as_str()),
            Some("denied")
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::Configuration("x".to_string()).is_fatal());
        assert!(Error::InvalidUrl(url::ParseError::EmptyHost).is_fatal());
        assert!(!Error::Timeout.is_fatal());
    }
}
