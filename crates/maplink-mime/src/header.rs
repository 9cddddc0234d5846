//! RFC 2822 header block handling.

use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of header fields.
///
/// Names are matched case-insensitively but kept as received, so a parsed
/// block renders back in its original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header, in order of appearance.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Parses a header block.
    ///
    /// Continuation lines (starting with space or tab) are joined to the
    /// previous field with a single space. Parsing stops at the first empty
    /// line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a non-continuation line without a
    /// colon.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();

        for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = headers.fields.last_mut() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
            headers.add(name.trim(), value.trim());
        }

        Ok(headers)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_get_all_keeps_order() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("Cc", "carol@example.com");
        headers.add("to", "bob@example.com");
        assert_eq!(
            headers.get_all("TO"),
            vec!["alice@example.com", "bob@example.com"]
        );
    }

    #[test]
    fn test_headers_parse_unfolds() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: a <a@example.com>;\r\n",
            " b <b@example.com>;\r\n",
            "Subject: Test Message\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(
            headers.get("To"),
            Some("a <a@example.com>; b <b@example.com>;")
        );
        assert_eq!(headers.get("Body"), None);
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        let err = Headers::parse("no colon here\r\n").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_headers_display_roundtrip() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi");
        headers.add("Message-Id", "<1@example.com>");

        let s = headers.to_string();
        assert_eq!(s, "Subject: Hi\r\nMessage-Id: <1@example.com>\r\n");
        assert_eq!(Headers::parse(&s).unwrap(), headers);
    }
}
