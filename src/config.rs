//! Layered client configuration.
//!
//! A configuration is a tree of [`ConfigValue`]s. The client starts from
//! [`Config::defaults`], layers a configuration file over it and then the
//! caller's overrides, using [`merge`] for every layer.

use crate::metadata::EndpointType;
use crate::{ini, Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Well-known configuration file, read when it exists and no other file was named.
pub const DEFAULT_CONFIG_FILE: &str = "/usr/local/etc/nodegroups_client/config.ini";

/// Environment variable naming a configuration file to use instead of the default.
pub const ENV_CONFIG_FILE: &str = "NODEGROUPS_CLIENT_CONFIG";

/// Section holding raw transport options.
pub const TRANSPORT_SECTION: &str = "transport";

/// A mapping from keys to configuration values.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A single node of the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A leaf value.
    Scalar(String),
    /// A nested section.
    Mapping(ConfigMap),
}

impl ConfigValue {
    /// Builds a mapping from key/value pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::config::ConfigValue;
    ///
    /// let uri = ConfigValue::mapping([("ro", "https://ng.example.com/api")]);
    /// assert!(uri.is_mapping());
    /// ```
    pub fn mapping<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        ConfigValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the value if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s),
            ConfigValue::Mapping(_) => None,
        }
    }

    /// Returns the section if this is a mapping.
    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            ConfigValue::Scalar(_) => None,
        }
    }

    /// Returns `true` for a section.
    pub fn is_mapping(&self) -> bool {
        matches!(self, ConfigValue::Mapping(_))
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Scalar(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Scalar(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Scalar(if value { "1" } else { "0" }.to_string())
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        ConfigValue::Mapping(value)
    }
}

/// Layers `overrides` on top of `defaults`, key by key.
///
/// - keys only in `defaults` are kept
/// - keys only in `overrides` are added as they are
/// - a mapping in `defaults` merges recursively with a mapping in `overrides`
/// - a mapping in `defaults` facing a scalar override is dropped from the
///   result altogether, neither side survives
/// - a scalar in `defaults` is replaced by the override, whatever its shape
///
/// Neither input is modified.
///
/// # Examples
///
/// ```
/// use nodegroups_client::config::{merge, ConfigMap, ConfigValue};
///
/// let mut defaults = ConfigMap::new();
/// defaults.insert("uri".into(), ConfigValue::mapping([("ro", "a"), ("rw", "b")]));
/// defaults.insert("useragent".into(), "x/1".into());
///
/// let mut overrides = ConfigMap::new();
/// overrides.insert("uri".into(), ConfigValue::mapping([("ro", "c")]));
///
/// let merged = merge(&defaults, &overrides);
/// assert_eq!(merged["uri"], ConfigValue::mapping([("ro", "c"), ("rw", "b")]));
/// assert_eq!(merged["useragent"], ConfigValue::from("x/1"));
/// ```
pub fn merge(defaults: &ConfigMap, overrides: &ConfigMap) -> ConfigMap {
    let mut merged = defaults.clone();

    for (key, value) in overrides {
        match (defaults.get(key), value) {
            (Some(ConfigValue::Mapping(inner)), ConfigValue::Mapping(over)) => {
                merged.insert(key.clone(), ConfigValue::Mapping(merge(inner, over)));
            }
            (Some(ConfigValue::Mapping(_)), ConfigValue::Scalar(_)) => {
                tracing::warn!(key = %key, "Discarding scalar override of a configuration section");
                merged.remove(key);
            }
            (Some(ConfigValue::Scalar(_)), _) | (None, _) => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

/// Wraps `value` in one mapping per segment of the dotted `path`.
///
/// `nested("uri.ro", v)` is `{uri: {ro: v}}`.
pub fn nested(path: &str, value: ConfigValue) -> ConfigMap {
    let mut segments = path.rsplit('.');
    let leaf = segments.next().unwrap_or(path);

    let mut map = ConfigMap::new();
    map.insert(leaf.to_string(), value);

    for segment in segments {
        let mut outer = ConfigMap::new();
        outer.insert(segment.to_string(), ConfigValue::Mapping(map));
        map = outer;
    }

    map
}

/// The merged configuration of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    root: ConfigMap,
}

impl Config {
    /// Returns the compiled-in defaults.
    pub fn defaults() -> Self {
        let mut root = ConfigMap::new();
        root.insert(
            "uri".to_string(),
            ConfigValue::mapping([
                ("ro", "http://localhost/api"),
                ("rw", "http://localhost/api"),
            ]),
        );
        root.insert(
            "paths".to_string(),
            ConfigValue::mapping([
                ("get_nodegroup", "v1/r/get_nodegroup.php"),
                (
                    "list_nodegroups_from_nodes",
                    "v1/r/list_nodegroups_from_nodes.php",
                ),
                ("list_nodes", "v1/r/list_nodes.php"),
            ]),
        );
        root.insert(
            "ssl".to_string(),
            ConfigValue::mapping([("verifypeer", "1")]),
        );
        root.insert(
            "useragent".to_string(),
            concat!("nodegroups-client/", env!("CARGO_PKG_VERSION")).into(),
        );
        root.insert(
            TRANSPORT_SECTION.to_string(),
            ConfigValue::Mapping(ConfigMap::new()),
        );

        Self { root }
    }

    /// Wraps an already merged tree.
    pub fn from_map(root: ConfigMap) -> Self {
        Self { root }
    }

    /// Returns the root of the tree.
    pub fn as_map(&self) -> &ConfigMap {
        &self.root
    }

    /// Returns a new configuration with `overrides` merged on top.
    pub fn merged(&self, overrides: &ConfigMap) -> Self {
        Self {
            root: merge(&self.root, overrides),
        }
    }

    /// Looks up a dotted path such as `uri.ro`.
    pub fn lookup(&self, path: &str) -> Option<&ConfigValue> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;

        for segment in segments {
            current = current.as_mapping()?.get(segment)?;
        }

        Some(current)
    }

    /// Looks up a dotted path and returns it if it is a scalar.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.lookup(path)?.as_str()
    }

    /// Returns the base URI configured for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no scalar URI is configured.
    pub fn base_uri(&self, endpoint: EndpointType) -> Result<&str> {
        let key = format!("uri.{}", endpoint);
        self.get_str(&key)
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!("No URI configured for endpoint type `{}`", endpoint))
            })
    }

    /// Returns the path of a named endpoint from the `paths` section.
    pub fn endpoint_path(&self, name: &str) -> Result<&str> {
        let key = format!("paths.{}", name);
        self.get_str(&key).ok_or_else(|| {
            Error::Configuration(format!("No path configured for endpoint `{}`", name))
        })
    }

    /// Returns a copy with `value` stored at the dotted `path`.
    ///
    /// Unlike [`merge`], a value whose shape differs from what is already
    /// there is refused rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on a scalar/mapping mismatch anywhere
    /// along the path.
    pub fn with_value(&self, path: &str, value: ConfigValue) -> Result<Self> {
        if path.split('.').any(str::is_empty) {
            return Err(Error::Configuration(format!(
                "Invalid configuration key `{}`",
                path
            )));
        }

        let segments: Vec<&str> = path.split('.').collect();
        let mut current = Some(&self.root);

        for (idx, segment) in segments.iter().enumerate() {
            let Some(existing) = current.and_then(|map| map.get(*segment)) else {
                break;
            };

            let is_leaf = idx + 1 == segments.len();
            if is_leaf && existing.is_mapping() != value.is_mapping() {
                return Err(Error::Configuration(format!(
                    "Cannot change the shape of configuration key `{}`",
                    path
                )));
            }
            if !is_leaf && !existing.is_mapping() {
                return Err(Error::Configuration(format!(
                    "Configuration key `{}` is not a section",
                    segments[..=idx].join(".")
                )));
            }

            current = existing.as_mapping();
        }

        Ok(self.merged(&nested(path, value)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Reads and parses an INI configuration file.
///
/// # Errors
///
/// Returns a configuration error if the file does not exist, cannot be read,
/// fails to parse, or holds no settings.
pub fn load_file(path: &Path) -> Result<ConfigMap> {
    if !path.is_file() {
        return Err(Error::Configuration(format!(
            "No such file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("Unable to read config file {}: {}", path.display(), e))
    })?;

    let parsed = ini::parse(&content).map_err(|e| {
        Error::Configuration(format!(
            "Unable to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    if parsed.is_empty() {
        return Err(Error::Configuration(format!(
            "Unable to parse config file {}: no settings found",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), keys = parsed.len(), "Loaded configuration file");

    Ok(parsed)
}

/// Picks the configuration file to load, if any.
///
/// An explicit path wins, then [`ENV_CONFIG_FILE`], then
/// [`DEFAULT_CONFIG_FILE`] when it exists. Explicit and environment paths
/// are returned even if missing so that loading reports the error.
pub(crate) fn resolve_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(ENV_CONFIG_FILE).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let default = Path::new(DEFAULT_CONFIG_FILE);
    default.is_file().then(|| default.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map<const N: usize>(entries: [(&str, ConfigValue); N]) -> ConfigMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn sample_defaults() -> ConfigMap {
        map([
            ("uri", ConfigValue::mapping([("ro", "a"), ("rw", "b")])),
            ("ssl", ConfigValue::mapping([("verifypeer", "1")])),
            ("useragent", "agent/1".into()),
        ])
    }

    #[test]
    fn test_merge_keeps_and_adds_keys() {
        let defaults = sample_defaults();
        let overrides = map([("proxy", "http://proxy:3128".into())]);

        let merged = merge(&defaults, &overrides);

        assert_eq!(merged["uri"], defaults["uri"]);
        assert_eq!(merged["useragent"], ConfigValue::from("agent/1"));
        assert_eq!(merged["proxy"], ConfigValue::from("http://proxy:3128"));
    }

    #[test]
    fn test_merge_recurses_into_sections() {
        let defaults = sample_defaults();
        let overrides = map([(
            "uri",
            ConfigValue::mapping([("rw", "c"), ("extra", "d")]),
        )]);

        let merged = merge(&defaults, &overrides);

        assert_eq!(
            merged["uri"],
            ConfigValue::mapping([("ro", "a"), ("rw", "c"), ("extra", "d")])
        );
    }

    #[test]
    fn test_merge_drops_section_overridden_by_scalar() {
        let defaults = sample_defaults();
        let overrides = map([("uri", "http://flat".into())]);

        let merged = merge(&defaults, &overrides);

        assert!(!merged.contains_key("uri"));
        assert!(merged.contains_key("ssl"));
    }

    #[test]
    fn test_merge_scalar_replaced_by_any_shape() {
        let defaults = sample_defaults();
        let overrides = map([("useragent", ConfigValue::mapping([("name", "x")]))]);

        let merged = merge(&defaults, &overrides);

        assert_eq!(merged["useragent"], ConfigValue::mapping([("name", "x")]));
    }

    #[test]
    fn test_merge_idempotence() {
        let defaults = sample_defaults();

        assert_eq!(merge(&defaults, &ConfigMap::new()), defaults);
        assert_eq!(merge(&defaults, &defaults), defaults);
    }

    #[test]
    fn test_merge_does_not_touch_inputs() {
        let defaults = sample_defaults();
        let overrides = map([("uri", "flat".into()), ("useragent", "y".into())]);
        let defaults_before = defaults.clone();
        let overrides_before = overrides.clone();

        let _ = merge(&defaults, &overrides);

        assert_eq!(defaults, defaults_before);
        assert_eq!(overrides, overrides_before);
    }

    #[test]
    fn test_nested() {
        let built = nested("transport.timeout", "5".into());
        assert_eq!(
            built,
            map([("transport", ConfigValue::mapping([("timeout", "5")]))])
        );

        let flat = nested("useragent", "x".into());
        assert_eq!(flat, map([("useragent", ConfigValue::from("x"))]));
    }

    #[test]
    fn test_defaults_lookup() {
        let config = Config::defaults();

        assert_eq!(
            config.base_uri(EndpointType::ReadOnly).unwrap(),
            "http://localhost/api"
        );
        assert_eq!(config.get_str("ssl.verifypeer"), Some("1"));
        assert_eq!(config.endpoint_path("list_nodes").unwrap(), "v1/r/list_nodes.php");
        assert!(config.lookup("uri.nope").is_none());
        assert!(config.lookup("useragent.deeper").is_none());
    }

    #[test]
    fn test_base_uri_unresolved() {
        let config = Config::defaults().merged(&map([("uri", "flat".into())]));

        let err = config.base_uri(EndpointType::ReadWrite).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("rw"));
    }

    #[test]
    fn test_with_value() {
        let config = Config::defaults();

        let updated = config
            .with_value("uri.rw", "https://rw.example.com/api".into())
            .unwrap();
        assert_eq!(updated.get_str("uri.rw"), Some("https://rw.example.com/api"));
        assert_eq!(updated.get_str("uri.ro"), Some("http://localhost/api"));

        let updated = config.with_value("transport.timeout", "3".into()).unwrap();
        assert_eq!(updated.get_str("transport.timeout"), Some("3"));

        assert!(config.with_value("uri", "flat".into()).is_err());
        assert!(config
            .with_value("useragent", ConfigValue::mapping([("a", "b")]))
            .is_err());
        assert!(config.with_value("useragent.name", "x".into()).is_err());
        assert!(config.with_value("uri..ro", "x".into()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.ini")).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("No such file"));
    }

    // The only test touching the environment variable.
    #[test]
    fn test_resolve_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[uri]\nro = http://from-env.example.com/api\n")
            .unwrap();
        let explicit = Path::new("/explicit/client.ini");

        std::env::set_var(ENV_CONFIG_FILE, file.path());
        let from_env = resolve_file(None);
        let from_explicit = resolve_file(Some(explicit));
        let client = crate::Client::builder().build();

        std::env::set_var(ENV_CONFIG_FILE, "/no/such/nodegroups.ini");
        let missing = crate::Client::builder().build();
        std::env::remove_var(ENV_CONFIG_FILE);

        assert_eq!(from_env, Some(file.path().to_path_buf()));
        assert_eq!(from_explicit, Some(explicit.to_path_buf()));

        let client = client.unwrap();
        assert_eq!(
            client.config().get_str("uri.ro"),
            Some("http://from-env.example.com/api")
        );

        match missing {
            Err(Error::Configuration(message)) => {
                assert!(message.contains("/no/such/nodegroups.ini"))
            }
            Err(e) => panic!("expected a configuration error, got {:?}", e),
            Ok(_) => panic!("expected a configuration error, got a client"),
        }
    }
}
