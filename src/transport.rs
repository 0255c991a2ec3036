//! Transport options and per-call HTTP client construction.
//!
//! Options come from the merged configuration in this order, later wins:
//!
//! 1. `ssl.verifypeer`, `ssl.cainfo`, `useragent`
//! 2. the `[transport]` section, addressed as `transport.<name>`
//!
//! | key | meaning |
//! |---|---|
//! | `transport.timeout` | whole-request timeout in seconds |
//! | `transport.connect_timeout` | connect timeout in seconds |
//! | `transport.verify_tls` | verify the server certificate |
//! | `transport.ca_bundle` | PEM file of extra trusted roots |
//! | `transport.user_agent` | `User-Agent` header |
//! | `transport.proxy` | proxy URL for all traffic |
//! | `transport.follow_redirects` | follow 3xx responses (off by default) |
//! | `transport.max_redirects` | redirect limit when following |
//! | `transport.http1_only` | restrict to HTTP/1.x |

use crate::config::{Config, TRANSPORT_SECTION};
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Low-level HTTP settings applied to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOptions {
    /// Whole-request timeout
    pub timeout: Option<Duration>,
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Whether the server certificate is verified
    pub verify_tls: bool,
    /// PEM file of additional trusted roots
    pub ca_bundle: Option<PathBuf>,
    /// `User-Agent` header value
    pub user_agent: Option<String>,
    /// Proxy URL for all traffic
    pub proxy: Option<String>,
    /// Whether 3xx responses are followed
    pub follow_redirects: bool,
    /// Redirect limit when following redirects
    pub max_redirects: usize,
    /// Restrict to HTTP/1.x
    pub http1_only: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            verify_tls: true,
            ca_bundle: None,
            user_agent: None,
            proxy: None,
            follow_redirects: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            http1_only: false,
        }
    }
}

impl TransportOptions {
    /// Extracts transport options from a merged configuration.
    ///
    /// Unknown `transport.*` keys are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for values that cannot be interpreted.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::config::Config;
    /// use nodegroups_client::transport::TransportOptions;
    /// use std::time::Duration;
    ///
    /// let config = Config::defaults()
    ///     .with_value("transport.timeout", "2.5".into())
    ///     .unwrap();
    ///
    /// let options = TransportOptions::from_config(&config).unwrap();
    /// assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
    /// assert!(options.verify_tls);
    /// ```
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut options = TransportOptions::default();

        if let Some(value) = config.get_str("ssl.verifypeer") {
            options.verify_tls = parse_bool("ssl.verifypeer", value)?;
        }
        if let Some(value) = config.get_str("ssl.cainfo").filter(|v| !v.is_empty()) {
            options.ca_bundle = Some(PathBuf::from(value));
        }
        if let Some(value) = config.get_str("useragent").filter(|v| !v.is_empty()) {
            options.user_agent = Some(value.to_string());
        }

        let Some(section) = config.lookup(TRANSPORT_SECTION) else {
            return Ok(options);
        };
        let Some(section) = section.as_mapping() else {
            tracing::warn!("Ignoring transport options that are not a section");
            return Ok(options);
        };

        for (name, value) in section {
            let key = format!("{}.{}", TRANSPORT_SECTION, name);
            let Some(value) = value.as_str() else {
                tracing::warn!(option = %key, "Ignoring nested transport option");
                continue;
            };

            match name.as_str() {
                "timeout" => options.timeout = Some(parse_seconds(&key, value)?),
                "connect_timeout" => options.connect_timeout = Some(parse_seconds(&key, value)?),
                "verify_tls" => options.verify_tls = parse_bool(&key, value)?,
                "ca_bundle" => options.ca_bundle = non_empty(value).map(PathBuf::from),
                "user_agent" => options.user_agent = non_empty(value).map(str::to_string),
                "proxy" => options.proxy = non_empty(value).map(str::to_string),
                "follow_redirects" => options.follow_redirects = parse_bool(&key, value)?,
                "max_redirects" => {
                    options.max_redirects = value.trim().parse().map_err(|_| {
                        Error::Configuration(format!(
                            "`{}` must be a whole number, got `{}`",
                            key, value
                        ))
                    })?
                }
                "http1_only" => options.http1_only = parse_bool(&key, value)?,
                _ => tracing::warn!(option = %key, "Ignoring unknown transport option"),
            }
        }

        Ok(options)
    }

    /// Builds an HTTP client for a single call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the CA bundle cannot be loaded or the
    /// client cannot be built.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(!self.verify_tls)
            .redirect(if self.follow_redirects {
                reqwest::redirect::Policy::limited(self.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            });

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| Error::Transport(format!("Invalid proxy `{}`: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(path) = &self.ca_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                Error::Transport(format!(
                    "Unable to read CA bundle {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                Error::Transport(format!("Invalid CA bundle {}: {}", path.display(), e))
            })?;
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        if self.http1_only {
            builder = builder.http1_only();
        }

        builder
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Interprets INI-style booleans. An empty value is false.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" | "none" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "`{}` must be a boolean, got `{}`",
            key, value
        ))),
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            Error::Configuration(format!(
                "`{}` must be a non-negative number of seconds, got `{}`",
                key, value
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigMap, ConfigValue};

    fn config_with(entries: &[(&str, &str)]) -> Config {
        entries.iter().fold(Config::defaults(), |config, (path, value)| {
            config.with_value(path, (*value).into()).unwrap()
        })
    }

    #[test]
    fn test_defaults() {
        let options = TransportOptions::from_config(&Config::defaults()).unwrap();

        assert!(options.verify_tls);
        assert!(!options.follow_redirects);
        assert_eq!(options.timeout, None);
        assert_eq!(options.ca_bundle, None);
        assert!(options
            .user_agent
            .as_deref()
            .unwrap()
            .starts_with("nodegroups-client/"));
    }

    #[test]
    fn test_top_level_settings() {
        let config = config_with(&[
            ("ssl.verifypeer", "0"),
            ("ssl.cainfo", "/etc/ssl/cacert.pem"),
            ("useragent", "ops-tool/3"),
        ]);

        let options = TransportOptions::from_config(&config).unwrap();

        assert!(!options.verify_tls);
        assert_eq!(options.ca_bundle, Some(PathBuf::from("/etc/ssl/cacert.pem")));
        assert_eq!(options.user_agent.as_deref(), Some("ops-tool/3"));
    }

    #[test]
    fn test_transport_section_wins() {
        let config = config_with(&[
            ("ssl.verifypeer", "0"),
            ("useragent", "ops-tool/3"),
            ("transport.verify_tls", "yes"),
            ("transport.user_agent", "override/1"),
            ("transport.timeout", "30"),
            ("transport.connect_timeout", "0.5"),
            ("transport.follow_redirects", "on"),
            ("transport.max_redirects", "3"),
            ("transport.http1_only", "true"),
            ("transport.proxy", "http://proxy:3128"),
        ]);

        let options = TransportOptions::from_config(&config).unwrap();

        assert!(options.verify_tls);
        assert_eq!(options.user_agent.as_deref(), Some("override/1"));
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.connect_timeout, Some(Duration::from_millis(500)));
        assert!(options.follow_redirects);
        assert_eq!(options.max_redirects, 3);
        assert!(options.http1_only);
        assert_eq!(options.proxy.as_deref(), Some("http://proxy:3128"));
    }

    #[test]
    fn test_unknown_options_are_ignored() {
        let config = config_with(&[("transport.CURLOPT_VERBOSE", "1")]);
        let options = TransportOptions::from_config(&config).unwrap();
        assert_eq!(options, TransportOptions::from_config(&Config::defaults()).unwrap());
    }

    #[test]
    fn test_malformed_values() {
        for (key, value) in [
            ("transport.timeout", "soon"),
            ("transport.timeout", "-1"),
            ("transport.verify_tls", "maybe"),
            ("transport.max_redirects", "many"),
            ("ssl.verifypeer", "sometimes"),
        ] {
            let config = config_with(&[(key, value)]);
            let err = TransportOptions::from_config(&config).unwrap_err();
            assert!(err.is_fatal(), "{} = {}", key, value);
        }
    }

    #[test]
    fn test_missing_transport_section() {
        let mut overrides = ConfigMap::new();
        overrides.insert(TRANSPORT_SECTION.to_string(), ConfigValue::from("flat"));
        let config = Config::defaults().merged(&overrides);

        assert!(config.lookup(TRANSPORT_SECTION).is_none());
        assert!(TransportOptions::from_config(&config).is_ok());
    }

    #[test]
    fn test_build_client() {
        let options = TransportOptions {
            timeout: Some(Duration::from_secs(1)),
            verify_tls: false,
            ..TransportOptions::default()
        };
        assert!(options.build_client().is_ok());
    }

    #[test]
    fn test_build_client_missing_ca_bundle() {
        let options = TransportOptions {
            ca_bundle: Some(PathBuf::from("/definitely/not/a/bundle.pem")),
            ..TransportOptions::default()
        };

        let err = options.build_client().unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.status_code(), "500");
    }
}
