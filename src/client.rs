//! HTTP client for the nodegroups API.
//!
//! The [`Client`] type is the main entry point for making API calls.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    config::{self, Config, ConfigMap, ConfigValue},
    metadata::{EndpointType, RequestMetadata},
    params::Params,
    response::CallRecord,
    transport::TransportOptions,
    Error, JsonObject, Response, ResponseHeaders, Result,
};
use http::{header::CONTENT_TYPE, StatusCode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// The API's `status` field value for a successful call.
pub(crate) const SUCCESS_STATUS: &str = "200";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A client for the nodegroups API.
///
/// Every call returns its own [`Response`] or [`Error`]. The client also
/// remembers what it saw during its most recent call (see
/// [`Client::last_call`]). Clones share configuration and that record.
/// Calls from several tasks are safe, but "most recent" then means
/// whichever call finished last.
///
/// A fresh transport is built for each call from the current transport
/// options and dropped when the call returns.
///
/// # Examples
///
/// ```no_run
/// use nodegroups_client::{Client, EndpointType, Params};
///
/// # async fn example() -> Result<(), nodegroups_client::Error> {
/// let client = Client::builder()
///     .base_uri(EndpointType::ReadOnly, "https://nodegroups.example.com/api")
///     .build()?;
///
/// let response = client
///     .get(
///         EndpointType::ReadOnly,
///         "v1/r/list_nodes.php",
///         Params::new().with("nodegroup", "web"),
///     )
///     .await?;
/// println!("records: {:?}", response.data.get("records"));
///
/// let nodes = client.get_nodes_from_expression("@web & @prod").await?;
/// println!("nodes: {:?}", nodes.data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    settings: RwLock<Settings>,
    timeout: Option<Duration>,
    last_call: Mutex<CallRecord>,
}

#[derive(Debug, Clone)]
struct Settings {
    config: Config,
    transport: TransportOptions,
}

impl ClientInner {
    fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn last_call(&self) -> MutexGuard<'_, CallRecord> {
        self.last_call.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Settings {
    /// Derives transport options from `config` and checks that a transport
    /// can actually be built from them.
    fn from_config(config: Config) -> Result<Self> {
        let transport = TransportOptions::from_config(&config)?;
        transport.build_client().map_err(|e| match e {
            Error::Transport(message) => Error::Configuration(message),
            other => other,
        })?;
        Ok(Settings { config, transport })
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from defaults and the configuration file, if any.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration file named by the
    /// environment is missing, or any configuration file fails to parse.
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Makes an API call.
    ///
    /// This is the pipeline behind [`Client::get`] and [`Client::post`]. The
    /// last-call record is cleared first, then the request is sent and the
    /// response checked in order:
    ///
    /// 1. the transport must succeed
    /// 2. the HTTP status must be 200
    /// 3. the body must be a JSON object
    /// 4. the object must have a `status` field
    /// 5. that status must be `"200"`
    ///
    /// The first failed check decides the error.
    pub async fn call(&self, metadata: RequestMetadata) -> Result<Response<JsonObject>> {
        self.call_and_project(metadata, Ok).await
    }

    /// Makes an API call and projects the decoded body before the call is
    /// recorded, so a projection failure lands in this call's record.
    pub(crate) async fn call_and_project<T, F>(
        &self,
        metadata: RequestMetadata,
        project: F,
    ) -> Result<Response<T>>
    where
        F: FnOnce(JsonObject) -> Result<T>,
    {
        *self.inner.last_call() = CallRecord::default();

        let mut record = CallRecord::default();
        let result = self
            .execute(&metadata, &mut record)
            .await
            .and_then(|response| {
                record.error = response.message.clone();
                record.status = response.status.clone();
                response.try_map(project)
            });

        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                status = e.status_code(),
                method = %metadata.method,
                path = %metadata.path,
                "Request failed"
            );
            record.record_failure(e);
        }

        *self.inner.last_call() = record;
        result
    }

    async fn execute(
        &self,
        metadata: &RequestMetadata,
        record: &mut CallRecord,
    ) -> Result<Response<JsonObject>> {
        let settings = self.inner.settings();
        let base_uri = settings.config.base_uri(metadata.endpoint)?;
        let url = metadata.url(base_uri)?;

        tracing::debug!(
            method = %metadata.method,
            endpoint = %metadata.endpoint,
            url = %url,
            "Executing HTTP request"
        );

        let http_client = settings.transport.build_client()?;
        let mut request = http_client.request(metadata.method.clone(), url);

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        if let Some(body) = metadata.body() {
            request = request.header(CONTENT_TYPE, FORM_CONTENT_TYPE).body(body);
        }

        let start_time = Instant::now();
        let response = request.send().await.map_err(transport_error)?;
        let http_status = response.status();
        record
            .headers
            .record_response(response.version(), http_status, response.headers());

        let body = response.bytes().await.map_err(transport_error)?;
        let latency = start_time.elapsed();
        let raw_body = String::from_utf8_lossy(&body).into_owned();
        record.raw_body = raw_body.clone();

        tracing::info!(
            status = http_status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "Received HTTP response"
        );

        if http_status != StatusCode::OK {
            if http_status.is_server_error() {
                tracing::warn!(status = http_status.as_u16(), response = %raw_body, "Server error");
            } else {
                tracing::error!(status = http_status.as_u16(), response = %raw_body, "Unexpected HTTP status");
            }

            return Err(Error::HttpStatus {
                status: http_status,
                raw_response: raw_body,
            });
        }

        let output = match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(output)) => output,
            Ok(_) => {
                tracing::error!(raw_response = %raw_body, "Response is not a JSON object");
                return Err(Error::InvalidJson {
                    raw_response: raw_body,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, raw_response = %raw_body, "Failed to decode response");
                return Err(Error::InvalidJson {
                    raw_response: raw_body,
                });
            }
        };
        record.output = Some(output.clone());

        let Some(status) = output.get("status").map(json_text) else {
            return Err(Error::MissingStatus {
                raw_response: raw_body,
            });
        };
        let message = output.get("message").map(json_text).unwrap_or_default();

        if status != SUCCESS_STATUS {
            return Err(Error::Api {
                status,
                message,
                output,
            });
        }

        Ok(Response {
            data: output,
            raw_body,
            http_status,
            status,
            message,
            headers: record.headers.clone(),
            latency,
        })
    }

    /// Makes a GET request with `params` in the query string.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nodegroups_client::{Client, EndpointType, Params};
    ///
    /// # async fn example() -> Result<(), nodegroups_client::Error> {
    /// let client = Client::builder().build()?;
    ///
    /// let response = client
    ///     .get(
    ///         EndpointType::ReadOnly,
    ///         "v1/r/list_nodes.php",
    ///         Params::new().with("nodegroup", "web"),
    ///     )
    ///     .await?;
    /// println!("{}", response.raw_body);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(
        &self,
        endpoint: EndpointType,
        path: impl Into<String>,
        params: Params,
    ) -> Result<Response<JsonObject>> {
        let metadata = RequestMetadata::get(endpoint, path).with_query(params);
        self.call(metadata).await
    }

    /// Makes a POST request with `form` in the body and `query` in the query string.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use nodegroups_client::{Client, EndpointType, Params};
    ///
    /// # async fn example() -> Result<(), nodegroups_client::Error> {
    /// let client = Client::builder().build()?;
    ///
    /// let response = client
    ///     .post(
    ///         EndpointType::ReadWrite,
    ///         "v1/w/add_nodes.php",
    ///         Params::new()
    ///             .with("nodegroup", "web")
    ///             .with("nodes", vec!["web01", "web02"]),
    ///         Params::new(),
    ///     )
    ///     .await?;
    /// println!("{}", response.message);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post(
        &self,
        endpoint: EndpointType,
        path: impl Into<String>,
        form: Params,
        query: Params,
    ) -> Result<Response<JsonObject>> {
        let metadata = RequestMetadata::post(endpoint, path)
            .with_form(form)
            .with_query(query);
        self.call(metadata).await
    }

    /// Returns a snapshot of the current configuration.
    pub fn config(&self) -> Config {
        self.inner.settings().config
    }

    /// Looks up a dotted configuration path such as `uri.ro`.
    pub fn get_config(&self, path: &str) -> Option<ConfigValue> {
        self.inner.settings().config.lookup(path).cloned()
    }

    /// Returns the transport options currently applied to calls.
    pub fn transport_options(&self) -> TransportOptions {
        self.inner.settings().transport
    }

    /// Stores `value` at the dotted configuration `path`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, leaving the configuration untouched,
    /// if the value would change a section into a scalar or the other way
    /// round, or if no transport can be built from the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::Client;
    ///
    /// let client = Client::builder().without_config_file().build().unwrap();
    ///
    /// client.set_config("uri.rw", "https://ng-master.example.com/api").unwrap();
    /// assert!(client.set_config("uri", "https://flat.example.com").is_err());
    /// ```
    pub fn set_config(&self, path: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let mut settings = self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let config = settings.config.with_value(path, value.into())?;
        *settings = Settings::from_config(config)?;

        tracing::debug!(key = %path, "Updated configuration");
        Ok(())
    }

    /// Merges `overrides` over the current configuration.
    ///
    /// Follows [`config::merge`], so a scalar aimed at a section drops that
    /// section.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, leaving the configuration untouched,
    /// if no transport can be built from the result.
    pub fn configure(&self, overrides: &ConfigMap) -> Result<()> {
        let mut settings = self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let config = settings.config.merged(overrides);
        *settings = Settings::from_config(config)?;
        Ok(())
    }

    /// Returns what the client observed during its most recent call.
    pub fn last_call(&self) -> CallRecord {
        self.inner.last_call().clone()
    }

    /// Returns the error string of the most recent call.
    ///
    /// On success this is the API's message.
    pub fn last_error(&self) -> String {
        self.inner.last_call().error.clone()
    }

    /// Returns the status string of the most recent call.
    pub fn last_status(&self) -> String {
        self.inner.last_call().status.clone()
    }

    /// Returns a response header of the most recent call.
    pub fn last_header(&self, name: &str) -> Option<String> {
        self.inner.last_call().header(name).map(str::to_string)
    }

    /// Returns the response headers of the most recent call.
    pub fn last_headers(&self) -> ResponseHeaders {
        self.inner.last_call().headers.clone()
    }

    /// Returns the raw header lines of the most recent call.
    pub fn last_raw_headers(&self) -> Vec<String> {
        self.inner.last_call().headers.raw_lines().to_vec()
    }

    /// Returns the raw response body of the most recent call.
    pub fn last_raw_body(&self) -> String {
        self.inner.last_call().raw_body.clone()
    }

    /// Returns the decoded response body of the most recent call.
    pub fn last_output(&self) -> Option<JsonObject> {
        self.inner.last_call().output.clone()
    }

    /// Returns the configured path of a named endpoint.
    ///
    /// A failure is recorded as the most recent call, since no request
    /// gets made.
    pub(crate) fn endpoint_path(&self, name: &str) -> Result<String> {
        match self.inner.settings().config.endpoint_path(name) {
            Ok(path) => Ok(path.to_string()),
            Err(e) => {
                let mut record = CallRecord::default();
                record.record_failure(&e);
                *self.inner.last_call() = record;
                Err(e)
            }
        }
    }
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

/// Renders a JSON field as the string the API meant.
fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
enum ConfigFile {
    #[default]
    Auto,
    Path(PathBuf),
    Disabled,
}

/// Builder for configuring and creating a [`Client`].
///
/// Configuration is layered in this order, later wins:
///
/// 1. compiled-in defaults ([`Config::defaults`])
/// 2. the configuration file: the one given to
///    [`ClientBuilder::config_file`], else the one named by
///    [`config::ENV_CONFIG_FILE`], else [`config::DEFAULT_CONFIG_FILE`] if it
///    exists
/// 3. overrides given to the builder, one layer per call in call order
///
/// # Examples
///
/// ```no_run
/// use nodegroups_client::{ClientBuilder, EndpointType};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), nodegroups_client::Error> {
/// let client = ClientBuilder::new()
///     .config_file("/etc/nodegroups/client.ini")
///     .base_uri(EndpointType::ReadWrite, "https://ng-master.example.com/api")
///     .set("transport.verify_tls", false)
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config_file: ConfigFile,
    overrides: Vec<ConfigMap>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads configuration from `path`, which must exist.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = ConfigFile::Path(path.into());
        self
    }

    /// Skips configuration files entirely.
    pub fn without_config_file(mut self) -> Self {
        self.config_file = ConfigFile::Disabled;
        self
    }

    /// Adds a layer of overrides, merged after the layers given so far.
    pub fn overrides(mut self, overrides: ConfigMap) -> Self {
        self.overrides.push(overrides);
        self
    }

    /// Overrides a single dotted configuration path.
    pub fn set(self, path: &str, value: impl Into<ConfigValue>) -> Self {
        self.overrides(config::nested(path, value.into()))
    }

    /// Sets the base URI for one endpoint type.
    pub fn base_uri(self, endpoint: EndpointType, uri: impl Into<String>) -> Self {
        self.set(&format!("uri.{}", endpoint), uri.into())
    }

    /// Sets the request timeout.
    ///
    /// Takes precedence over `transport.timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a named configuration file is
    /// missing, a configuration file fails to parse, a transport option
    /// is malformed, or no transport can be built (an invalid proxy, an
    /// unreadable CA bundle).
    pub fn build(self) -> Result<Client> {
        let mut config = Config::defaults();

        let file = match &self.config_file {
            ConfigFile::Auto => config::resolve_file(None),
            ConfigFile::Path(path) => config::resolve_file(Some(path.as_path())),
            ConfigFile::Disabled => None,
        };

        if let Some(path) = file {
            let parsed = config::load_file(&path)?;
            config = config.merged(&parsed);
            tracing::info!(path = %path.display(), "Using configuration file");
        }

        let config = self
            .overrides
            .iter()
            .fold(config, |config, layer| config.merged(layer));
        let settings = Settings::from_config(config)?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                settings: RwLock::new(settings),
                timeout: self.timeout,
                last_call: Mutex::new(CallRecord::default()),
            }),
        })
    }
}
