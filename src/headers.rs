//! Response header capture.
//!
//! Headers are recorded line by line, the way they arrive on the wire: every
//! line is kept verbatim, and `Name: Value` lines are additionally indexed by
//! their exact name and by the lowercase name.

use std::collections::HashMap;

/// Headers captured from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    raw: Vec<String>,
    exact: HashMap<String, String>,
    folded: HashMap<String, String>,
}

impl ResponseHeaders {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one raw header line.
    ///
    /// The line is appended to the raw list as is. When it contains `": "`
    /// after at least one character, the trimmed value is stored under the
    /// name and its lowercase form, unless the trimmed value is empty. A
    /// later line with the same name replaces the earlier value.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodegroups_client::ResponseHeaders;
    ///
    /// let mut headers = ResponseHeaders::new();
    /// headers.record_line("HTTP/1.1 200 OK\r\n");
    /// headers.record_line("Content-Type: application/json\r\n");
    /// headers.record_line("X-Empty:   \r\n");
    ///
    /// assert_eq!(headers.get("Content-Type"), Some("application/json"));
    /// assert_eq!(headers.get("content-type"), Some("application/json"));
    /// assert_eq!(headers.get("x-empty"), None);
    /// assert_eq!(headers.raw_lines().len(), 3);
    /// ```
    pub fn record_line(&mut self, line: &str) {
        self.raw.push(line.to_string());

        let Some((name, value)) = line.split_once(": ") else {
            return;
        };
        if name.is_empty() {
            return;
        }

        let value = value.trim();
        if value.is_empty() {
            return;
        }

        self.exact.insert(name.to_string(), value.to_string());
        self.folded.insert(name.to_lowercase(), value.to_string());
    }

    /// Records the status line and header lines of an HTTP response.
    ///
    /// The lines are rebuilt from the parsed response and fed through
    /// [`ResponseHeaders::record_line`], ending with the blank separator line.
    pub fn record_response(
        &mut self,
        version: http::Version,
        status: http::StatusCode,
        headers: &http::HeaderMap,
    ) {
        let reason = status.canonical_reason().unwrap_or("");
        self.record_line(&format!(
            "{:?} {} {}\r\n",
            version,
            status.as_u16(),
            reason
        ));

        for (name, value) in headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            self.record_line(&format!("{}: {}\r\n", name, value));
        }

        self.record_line("\r\n");
    }

    /// Looks a header up by exact name, then case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.exact
            .get(name)
            .or_else(|| self.folded.get(&name.to_lowercase()))
            .map(String::as_str)
    }

    /// Returns the headers indexed by their exact names.
    pub fn exact(&self) -> &HashMap<String, String> {
        &self.exact
    }

    /// Returns the headers indexed by lowercase names.
    pub fn folded(&self) -> &HashMap<String, String> {
        &self.folded
    }

    /// Returns every recorded line, unmodified.
    pub fn raw_lines(&self) -> &[String] {
        &self.raw
    }

    /// Returns `true` if no line was recorded.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
