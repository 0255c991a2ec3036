//! Parser for INI-style configuration files.
//!
//! ```ini
//! ; comment
//! useragent = "my-tool/2.0"
//!
//! [uri]
//! ro = https://nodegroups.example.com/api
//! rw = https://nodegroups-master.example.com/api
//!
//! [transport]
//! timeout = 10   ; seconds
//! ```
//!
//! Keys before the first section land at the top level, every `[section]`
//! becomes a nested mapping. Values are kept as strings.

use crate::config::{ConfigMap, ConfigValue};
use std::collections::BTreeMap;

/// A syntax error in an INI document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-indexed line number
    pub line: usize,
    /// What was wrong with the line
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Parses an INI document into a configuration tree.
///
/// # Examples
///
/// ```
/// use nodegroups_client::config::ConfigValue;
/// use nodegroups_client::ini;
///
/// let parsed = ini::parse("useragent = x\n[uri]\nro = http://a/api\n").unwrap();
/// assert_eq!(parsed["useragent"], ConfigValue::from("x"));
/// assert_eq!(parsed["uri"], ConfigValue::mapping([("ro", "http://a/api")]));
/// ```
pub fn parse(input: &str) -> Result<ConfigMap, ParseError> {
    let mut globals = ConfigMap::new();
    let mut sections: BTreeMap<String, ConfigMap> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| ParseError::new(line_no, "unterminated section header"))?
                .trim();

            if name.is_empty() {
                return Err(ParseError::new(line_no, "empty section name"));
            }
            if globals.contains_key(name) {
                return Err(ParseError::new(
                    line_no,
                    format!("section `{}` clashes with a key of the same name", name),
                ));
            }

            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ParseError::new(line_no, format!("expected `key = value`, got `{}`", line)))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::new(line_no, "missing key"));
        }

        let value = parse_value(value.trim()).map_err(|reason| ParseError::new(line_no, reason))?;

        let target = match &current {
            Some(name) => sections.entry(name.clone()).or_default(),
            None => &mut globals,
        };
        target.insert(key.to_string(), ConfigValue::Scalar(value));
    }

    for (name, entries) in sections {
        globals.insert(name, ConfigValue::Mapping(entries));
    }

    Ok(globals)
}

fn parse_value(value: &str) -> Result<String, String> {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            let end = rest
                .find(quote)
                .ok_or_else(|| "unterminated quoted value".to_string())?;
            let trailing = rest[end + quote.len_utf8()..].trim_start();

            if !trailing.is_empty() && !trailing.starts_with(';') {
                return Err(format!("unexpected text after quoted value: `{}`", trailing));
            }

            return Ok(rest[..end].to_string());
        }
    }

    let unquoted = match value.find(';') {
        Some(pos) => &value[..pos],
        None => value,
    };

    Ok(unquoted.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_and_globals() {
        let parsed = parse(
            "useragent = agent/2\n\
             \n\
             [uri]\n\
             ro = http://ro.example.com/api\n\
             rw = http://rw.example.com/api\n\
             \n\
             [ssl]\n\
             verifypeer = 0\n",
        )
        .unwrap();

        assert_eq!(parsed["useragent"], ConfigValue::from("agent/2"));
        assert_eq!(
            parsed["uri"],
            ConfigValue::mapping([
                ("ro", "http://ro.example.com/api"),
                ("rw", "http://rw.example.com/api"),
            ])
        );
        assert_eq!(parsed["ssl"], ConfigValue::mapping([("verifypeer", "0")]));
    }

    #[test]
    fn test_comments_and_quotes() {
        let parsed = parse(
            "; leading comment\n\
             # another\n\
             [transport]\n\
             timeout = 5 ; seconds\n\
             user_agent = \"quoted; value\"\n\
             proxy = 'http://proxy:3128' ; trailing\n\
             empty =\n",
        )
        .unwrap();

        let transport = parsed["transport"].as_mapping().unwrap();
        assert_eq!(transport["timeout"], ConfigValue::from("5"));
        assert_eq!(transport["user_agent"], ConfigValue::from("quoted; value"));
        assert_eq!(transport["proxy"], ConfigValue::from("http://proxy:3128"));
        assert_eq!(transport["empty"], ConfigValue::from(""));
    }

    #[test]
    fn test_repeated_sections_merge() {
        let parsed = parse("[uri]\nro = a\n[ssl]\nverifypeer = 1\n[uri]\nrw = b\n").unwrap();

        assert_eq!(parsed["uri"], ConfigValue::mapping([("ro", "a"), ("rw", "b")]));
    }

    #[test]
    fn test_value_with_equals_sign() {
        let parsed = parse("[uri]\nro = http://a/api?x=1\n").unwrap();
        assert_eq!(
            parsed["uri"],
            ConfigValue::mapping([("ro", "http://a/api?x=1")])
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("[uri\nro = a\n").unwrap_err().line, 1);
        assert_eq!(parse("[uri]\njust words\n").unwrap_err().line, 2);
        assert_eq!(parse("= value\n").unwrap_err().line, 1);
        assert_eq!(parse("a = \"open\n").unwrap_err().line, 1);
        assert_eq!(parse("a = \"x\" y\n").unwrap_err().line, 1);
        assert_eq!(parse("uri = flat\n[uri]\nro = a\n").unwrap_err().line, 2);
        assert_eq!(parse("[ ]\n").unwrap_err().line, 1);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse("; nothing here\n\n").unwrap().is_empty());
    }
}
