//! Line reader over bMessage text.

use crate::error::{Error, Result};

/// Reads CRLF (or bare LF) terminated lines from a borrowed buffer.
#[derive(Debug, Clone)]
pub(crate) struct LineReader<'a> {
    rest: &'a str,
}

impl<'a> LineReader<'a> {
    pub(crate) const fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    /// Unconsumed input.
    pub(crate) const fn rest(&self) -> &'a str {
        self.rest
    }

    /// Next line without its terminator, or `None` at end of input.
    pub(crate) fn next_line(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (line, rest) = match self.rest.find('\n') {
            Some(i) => (&self.rest[..i], &self.rest[i + 1..]),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Next non-blank line, trimmed.
    pub(crate) fn next_structural(&mut self) -> Option<&'a str> {
        loop {
            let line = self.next_line()?.trim();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Like [`next_structural`](Self::next_structural) but end of input is an error.
    pub(crate) fn require(&mut self, context: &str) -> Result<&'a str> {
        self.next_structural()
            .ok_or_else(|| Error::Format(format!("unexpected end of bMessage in {context}")))
    }

    /// Consumes the next structural line, which must equal `token`.
    pub(crate) fn expect(&mut self, token: &str) -> Result<()> {
        let line = self.require(token)?;
        if line.eq_ignore_ascii_case(token) {
            Ok(())
        } else {
            Err(Error::Format(format!("expected {token}, found {line:?}")))
        }
    }

    /// Returns everything up to a line that is exactly `terminator` and
    /// consumes that line. Only the line break directly before the
    /// terminator is removed from the result.
    pub(crate) fn read_until(&mut self, terminator: &str) -> Result<&'a str> {
        let text = self.rest;
        let mut pos = 0;
        loop {
            let candidate = &text[pos..];
            if let Some(after) = candidate.strip_prefix(terminator) {
                let line_end = if after.is_empty() {
                    Some(0)
                } else if after.starts_with("\r\n") {
                    Some(2)
                } else if after.starts_with('\n') {
                    Some(1)
                } else {
                    None
                };
                if let Some(skip) = line_end {
                    let content = &text[..pos];
                    let content = content
                        .strip_suffix("\r\n")
                        .or_else(|| content.strip_suffix('\n'))
                        .unwrap_or(content);
                    self.rest = &after[skip..];
                    return Ok(content);
                }
            }
            match candidate.find('\n') {
                Some(i) => pos += i + 1,
                None => {
                    return Err(Error::Format(format!("missing {terminator}")));
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_structural() {
        let mut reader = LineReader::new("A\r\n\r\n  B \nC");
        assert_eq!(reader.next_line(), Some("A"));
        assert_eq!(reader.next_structural(), Some("B"));
        assert_eq!(reader.next_line(), Some("C"));
        assert_eq!(reader.next_line(), None);
        assert!(reader.require("test").is_err());
    }

    #[test]
    fn test_read_until_strips_only_last_break() {
        let mut reader = LineReader::new("one\r\n\r\ntwo\r\n\r\nEND:MSG\r\nEND:BBODY\r\n");
        assert_eq!(reader.read_until("END:MSG").unwrap(), "one\r\n\r\ntwo\r\n");
        assert_eq!(reader.next_structural(), Some("END:BBODY"));
    }

    #[test]
    fn test_read_until_empty_content() {
        let mut reader = LineReader::new("END:MSG\r\nX");
        assert_eq!(reader.read_until("END:MSG").unwrap(), "");
        assert_eq!(reader.rest(), "X");
    }

    #[test]
    fn test_read_until_needs_whole_line() {
        let mut reader = LineReader::new("END:MSGX\r\n/END:MSG\r\nEND:MSG");
        assert_eq!(reader.read_until("END:MSG").unwrap(), "END:MSGX\r\n/END:MSG");
        assert!(LineReader::new("no end").read_until("END:MSG").is_err());
    }
}
