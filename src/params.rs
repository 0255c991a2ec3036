//! Request parameters and their URL encoding.
//!
//! Parameters keep insertion order. A list value renders as one `key[]=value`
//! pair per element. Values are percent-encoded with everything outside the
//! RFC 3986 unreserved set escaped, so a space becomes `%20`. Query strings
//! and form bodies use the same encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in parameter values: all but `A-Z a-z 0-9 - _ . ~`.
const VALUE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The value of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Rendered as `key=value`.
    Single(String),
    /// Rendered as one `key[]=value` per element, in order.
    List(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for ParamValue {
    fn from(values: Vec<S>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// An ordered set of request parameters.
///
/// # Examples
///
/// ```
/// use nodegroups_client::Params;
///
/// let params = Params::new()
///     .with("a", "x")
///     .with("b", vec!["y", "z"]);
///
/// assert_eq!(params.encode(), "a=x&b[]=y&b[]=z");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing an earlier one with the same key in place.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a parameter, replacing an earlier one with the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the parameters as `&`-joined `key=value` pairs.
    ///
    /// Keys are written as given; values are percent-encoded.
    pub fn encode(&self) -> String {
        let mut pairs = Vec::new();

        for (key, value) in &self.entries {
            match value {
                ParamValue::Single(v) => pairs.push(format!("{}={}", key, encode_value(v))),
                ParamValue::List(values) => {
                    for v in values {
                        pairs.push(format!("{}[]={}", key, encode_value(v)));
                    }
                }
            }
        }

        pairs.join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Percent-encodes a single parameter value.
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, VALUE_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_and_list_rendering() {
        let params = Params::new().with("a", "x").with("b", vec!["y", "z"]);
        assert_eq!(params.encode(), "a=x&b[]=y&b[]=z");
    }

    #[test]
    fn test_reserved_characters_are_encoded() {
        let params = Params::new()
            .with("expression", "@web & db")
            .with("nodegroup_re", "^app-[0-9]+$");

        assert_eq!(
            params.encode(),
            "expression=%40web%20%26%20db&nodegroup_re=%5Eapp-%5B0-9%5D%2B%24"
        );
    }

    #[test]
    fn test_unreserved_characters_pass_through() {
        assert_eq!(encode_value("a-b_c.d~e"), "a-b_c.d~e");
        assert_eq!(encode_value("caf\u{e9}"), "caf%C3%A9");
    }

    #[test]
    fn test_insertion_order_and_replacement() {
        let mut params = Params::new();
        params.insert("z", "1");
        params.insert("a", "2");
        params.insert("z", "3");

        assert_eq!(params.len(), 2);
        assert_eq!(params.encode(), "z=3&a=2");
        assert_eq!(params.get("z"), Some(&ParamValue::Single("3".to_string())));
    }

    #[test]
    fn test_empty() {
        assert!(Params::new().is_empty());
        assert_eq!(Params::new().encode(), "");
        assert_eq!(Params::new().with("l", Vec::<String>::new()).encode(), "");
    }

    #[test]
    fn test_encoded_pairs_decode_back() {
        let params: Params = [
            ("node", "web01.example.com"),
            ("app", "search & rescue"),
            ("expression", "@ops,&db"),
        ]
        .into_iter()
        .collect();

        let decoded: Vec<(String, String)> =
            url::form_urlencoded::parse(params.encode().as_bytes())
                .into_owned()
                .collect();

        assert_eq!(
            decoded,
            vec![
                ("node".to_string(), "web01.example.com".to_string()),
                ("app".to_string(), "search & rescue".to_string()),
                ("expression".to_string(), "@ops,&db".to_string()),
            ]
        );
    }
}
