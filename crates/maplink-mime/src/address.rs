//! Mailbox addresses and address-list headers.

use crate::MAX_LINE_LENGTH;
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox, optionally with a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name, without surrounding quotes.
    pub name: Option<String>,
    /// The `local@domain` part (or a phone number for MMS).
    pub email: String,
}

impl Address {
    /// Creates an address.
    #[must_use]
    pub fn new(name: Option<&str>, email: impl Into<String>) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()).map(ToString::to_string),
            email: email.into(),
        }
    }

    /// Parses one address token such as `"Bob" <bob@example.com>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if an angle bracket is left open or
    /// the mailbox is empty.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();

        if let Some(open) = token.rfind('<') {
            let close = token[open..]
                .find('>')
                .ok_or_else(|| Error::InvalidAddress(token.to_string()))?;
            let email = token[open + 1..open + close].trim();
            if email.is_empty() {
                return Err(Error::InvalidAddress(token.to_string()));
            }
            let name = token[..open].trim().trim_matches('"').trim();
            return Ok(Self::new(Some(name), email));
        }

        if token.is_empty() {
            return Err(Error::InvalidAddress(token.to_string()));
        }
        Ok(Self::new(None, token))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Splits an address-list header value into addresses.
///
/// Tokens are separated by `,` or `;` outside quotes and angle brackets.
/// Empty tokens and group labels such as `undisclosed-recipients:` are
/// skipped.
///
/// # Errors
///
/// Returns an error if a token cannot be parsed.
pub fn parse_address_list(value: &str) -> Result<Vec<Address>> {
    let mut addresses = Vec::new();
    let mut token = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    let mut flush = |token: &mut String| -> Result<()> {
        let trimmed = token.trim();
        if !trimmed.is_empty() && !trimmed.ends_with(':') {
            addresses.push(Address::parse(trimmed)?);
        }
        token.clear();
        Ok(())
    };

    for c in value.chars() {
        match c {
            '"' if !in_angle => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' | ';' if !in_quotes && !in_angle => {
                flush(&mut token)?;
                continue;
            }
            _ => {}
        }
        token.push(c);
    }
    flush(&mut token)?;

    Ok(addresses)
}

/// Renders an address-list header line, including the trailing CRLF.
///
/// Every address is written as `name <addr>;`. A folding `CRLF SP` is
/// inserted before a token that would take the line to the RFC 2822 limit.
#[must_use]
pub fn encode_address_header(name: &str, addresses: &[Address]) -> String {
    let mut out = format!("{name}: ");
    let mut line_len = out.len();

    for address in addresses {
        let part = format!("{address};");
        if line_len + part.len() >= MAX_LINE_LENGTH && line_len > 1 {
            out.push_str("\r\n ");
            line_len = 1;
        }
        // A token too long for any line is broken at character boundaries.
        for ch in part.chars() {
            if line_len + ch.len_utf8() >= MAX_LINE_LENGTH {
                out.push_str("\r\n ");
                line_len = 1;
            }
            out.push(ch);
            line_len += ch.len_utf8();
        }
    }

    out.push_str("\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::needless_collect)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_address() {
        let addr = Address::parse("\"Smith, Bob\" <bob@example.com>").unwrap();
        assert_eq!(addr.name.as_deref(), Some("Smith, Bob"));
        assert_eq!(addr.email, "bob@example.com");
        assert_eq!(addr.to_string(), "Smith, Bob <bob@example.com>");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = Address::parse("  +4512345678 ").unwrap();
        assert_eq!(addr.name, None);
        assert_eq!(addr.email, "+4512345678");
    }

    #[test]
    fn test_parse_unclosed_angle() {
        assert!(matches!(
            Address::parse("Bob <bob@example.com"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_list_respects_quotes() {
        let list = parse_address_list(
            "\"Smith, Bob\" <bob@example.com>; alice@example.com, Carol <c@x.org>;",
        )
        .unwrap();
        let emails: Vec<&str> = list.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["bob@example.com", "alice@example.com", "c@x.org"]);
    }

    #[test]
    fn test_parse_list_skips_group_label() {
        let list = parse_address_list(" undisclosed-recipients:;").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_encode_header_short() {
        let line = encode_address_header(
            "To",
            &[
                Address::new(Some("Bob"), "bob@example.com"),
                Address::new(None, "alice@example.com"),
            ],
        );
        assert_eq!(line, "To: Bob <bob@example.com>;alice@example.com;\r\n");
    }

    #[test]
    fn test_encode_header_folds_long_lists() {
        let addresses: Vec<Address> = (0..60)
            .map(|i| Address::new(Some("Recipient"), format!("person{i:03}@example.com")))
            .collect();
        let header = encode_address_header("Cc", &addresses);

        assert!(header.contains("\r\n "));
        for line in header.trim_end_matches("\r\n").split("\r\n") {
            assert!(line.len() < MAX_LINE_LENGTH);
        }

        let unfolded = header.replace("\r\n ", " ");
        let value = unfolded.trim_start_matches("Cc: ").trim_end();
        assert_eq!(parse_address_list(value).unwrap(), addresses);
    }
    #[test]
    fn test_encode_header_breaks_oversized_address() {
        let long = format!("{}@example.com", "x".repeat(2500));
        let addresses = vec![
            Address::new(None, "short@example.com"),
            Address::new(None, long.clone()),
        ];
        let header = encode_address_header("To", &addresses);

        let lines: Vec<&str> = header.trim_end_matches("\r\n").split("\r\n").collect();
        assert!(lines.len() >= 4);
        for line in &lines {
            assert!(line.len() < MAX_LINE_LENGTH);
        }
        assert_eq!(header.replace("\r\n ", ""), format!("To: short@example.com;{long};\r\n"));
    }
}
