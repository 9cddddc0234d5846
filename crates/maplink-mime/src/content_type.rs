//! `Content-Type` field values.

use crate::error::{Error, Result};
use std::fmt;

/// A parsed `Content-Type` value: `type/subtype` plus ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`, e.g. `text/plain`.
    pub mime_type: String,
    /// Parameters in order of appearance, keys lowercased.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a content type without parameters.
    #[must_use]
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter, replacing an existing one with the same key.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    /// Looks up a parameter value.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.param("charset")
    }

    /// The `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    /// Returns `true` for `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.mime_type.starts_with("multipart/")
    }

    /// Returns `true` for `text/*`.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
    }

    /// Parses `type/subtype; key=value; key = "value"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has no `type/subtype` pair.
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments = s.split(';');
        let essence = segments.next().unwrap_or_default().trim();

        let Some((main, sub)) = essence.split_once('/') else {
            return Err(Error::InvalidContentType(s.to_string()));
        };
        if main.trim().is_empty() || sub.trim().is_empty() {
            return Err(Error::InvalidContentType(s.to_string()));
        }

        let mut content_type = Self::new(format!("{}/{}", main.trim(), sub.trim()));
        for segment in segments {
            if let Some((key, value)) = segment.split_once('=') {
                let value = value.trim().trim_matches('"');
                content_type = content_type.with_param(key.trim(), value);
            }
        }

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mime_type)?;
        for (key, value) in &self.params {
            write!(f, "; {key}=\"{value}\"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_params() {
        let ct = ContentType::parse("Text/Plain; charset=\"UTF-8\"").unwrap();
        assert_eq!(ct.mime_type, "text/plain");
        assert_eq!(ct.charset(), Some("UTF-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn test_parse_boundary_with_spaces() {
        let ct = ContentType::parse("multipart/mixed; boundary = MessageBoundary.7").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("MessageBoundary.7"));
    }

    #[test]
    fn test_parse_rejects_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn test_display_quotes_params() {
        let ct = ContentType::new("image/jpeg").with_param("name", "cat.jpg");
        assert_eq!(ct.to_string(), "image/jpeg; name=\"cat.jpg\"");
        assert_eq!(ContentType::parse(&ct.to_string()).unwrap(), ct);
    }
}
