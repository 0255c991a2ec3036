//! Per-call results.
//!
//! Every successful call returns a [`Response`] that owns everything observed
//! during that call. The client also keeps a [`CallRecord`] of its most recent
//! call, successful or not, for callers that prefer to ask afterwards.

use crate::headers::ResponseHeaders;
use crate::{Error, JsonObject};
use http::StatusCode;
use std::time::Duration;

/// A successful API call.
///
/// # Type Parameters
///
/// * `T` - The payload; the decoded body for [`Client::get`](crate::Client::get)
///   and [`Client::post`](crate::Client::post), a projection of it for the
///   nodegroup helpers
///
/// # Examples
///
/// ```no_run
/// use nodegroups_client::Client;
///
/// # async fn example() -> Result<(), nodegroups_client::Error> {
/// let client = Client::builder().build()?;
///
/// let response = client.get_nodes_from_nodegroup("web").await?;
///
/// println!("Nodes: {:?}", response.data);
/// println!("API said: {}", response.message);
/// println!("Request took {:?}", response.latency);
/// println!("Server: {:?}", response.header("server"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The payload.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub http_status: StatusCode,

    /// The API's `status` field, `"200"` for every successful call.
    pub status: String,

    /// The API's `message` field, empty if absent.
    pub message: String,

    /// The response headers.
    pub headers: ResponseHeaders,

    /// Time from sending the request to decoding the body.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nodegroups_client::{Response, ResponseHeaders};
    /// # use http::StatusCode;
    /// # use std::time::Duration;
    /// let response = Response {
    ///     data: 42,
    ///     raw_body: String::new(),
    ///     http_status: StatusCode::OK,
    ///     status: "200".to_string(),
    ///     message: String::new(),
    ///     headers: ResponseHeaders::new(),
    ///     latency: Duration::from_millis(100),
    /// };
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            http_status: self.http_status,
            status: self.status,
            message: self.message,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Like [`Response::map`], for projections that can fail.
    pub fn try_map<U, F>(self, f: F) -> Result<Response<U>, Error>
    where
        F: FnOnce(T) -> Result<U, Error>,
    {
        let data = f(self.data)?;
        Ok(Response {
            data,
            raw_body: self.raw_body,
            http_status: self.http_status,
            status: self.status,
            message: self.message,
            headers: self.headers,
            latency: self.latency,
        })
    }

    /// Returns a header value, looked up by exact name first.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// What the client observed during its most recent call.
///
/// Reset to empty when a call starts, then filled in as the call progresses,
/// so nothing from an earlier call survives into a later one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallRecord {
    /// The client-visible error string, or the API's message on success.
    pub error: String,

    /// The status string: the API's `status` field, `"500"` for failures
    /// detected by the client, empty before a call completes.
    pub status: String,

    /// Captured response headers.
    pub headers: ResponseHeaders,

    /// The raw response body.
    pub raw_body: String,

    /// The decoded body, when it decoded to an object.
    pub output: Option<JsonObject>,
}

impl CallRecord {
    /// Returns a header of the recorded response.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns `true` if the recorded call succeeded.
    pub fn is_success(&self) -> bool {
        self.status == crate::client::SUCCESS_STATUS
    }

    /// Stores the error string and status of a failure.
    pub(crate) fn record_failure(&mut self, error: &Error) {
        self.error = error.to_string();
        self.status = error.status_code().to_string();
    }
}
