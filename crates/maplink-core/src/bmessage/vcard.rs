//! vCard entries of a bMessage envelope.

use std::fmt::Write;

use super::reader::LineReader;
use crate::error::{Error, Result};

/// vCard format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VCardVersion {
    /// vCard 2.1.
    #[default]
    V21,
    /// vCard 3.0; carries a formatted name.
    V30,
}

impl VCardVersion {
    const fn as_str(self) -> &'static str {
        match self {
            Self::V21 => "2.1",
            Self::V30 => "3.0",
        }
    }
}

/// An originator or recipient vCard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VCard {
    /// Format version.
    pub version: VCardVersion,
    /// Structured name (`N`).
    pub name: Option<String>,
    /// Formatted name (`FN`), written for 3.0 only.
    pub formatted_name: Option<String>,
    /// Phone numbers, reduced to their dialable network portion.
    pub phone_numbers: Vec<String>,
    /// Email addresses.
    pub emails: Vec<String>,
    /// Envelope nesting level; 0 is the outermost.
    pub env_level: usize,
}

impl VCard {
    /// Creates a 2.1 vCard with a name and one phone number.
    #[must_use]
    pub fn phone(name: Option<&str>, number: &str) -> Self {
        Self {
            name: name.map(str::to_string),
            phone_numbers: vec![network_portion(number)],
            ..Self::default()
        }
    }

    /// Creates a 3.0 vCard with a name and one email address.
    #[must_use]
    pub fn email(name: Option<&str>, address: &str) -> Self {
        Self {
            version: VCardVersion::V30,
            name: name.map(str::to_string),
            formatted_name: name.map(str::to_string),
            emails: vec![address.to_string()],
            ..Self::default()
        }
    }

    /// First phone number or email address.
    #[must_use]
    pub fn first_address(&self) -> Option<&str> {
        self.phone_numbers
            .first()
            .or_else(|| self.emails.first())
            .map(String::as_str)
    }

    /// Display name, preferring the formatted name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.formatted_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// Parses the lines after `BEGIN:VCARD` up to and including `END:VCARD`.
    pub(crate) fn parse(reader: &mut LineReader<'_>, env_level: usize) -> Result<Self> {
        let mut card = Self {
            env_level,
            ..Self::default()
        };
        loop {
            let line = reader.require("vCard")?;
            if line.eq_ignore_ascii_case("END:VCARD") {
                return Ok(card);
            }
            let Some((key, value)) = split_unescaped(line, ':') else {
                continue;
            };
            let property = key.split(';').next().unwrap_or(key).to_ascii_uppercase();
            match property.as_str() {
                "VERSION" => {
                    card.version = match value.trim() {
                        "2.1" => VCardVersion::V21,
                        "3.0" => VCardVersion::V30,
                        other => {
                            return Err(Error::Format(format!("unsupported vCard version {other}")));
                        }
                    };
                }
                "N" => card.name = non_empty(value),
                "FN" => card.formatted_name = non_empty(value),
                "TEL" => card.phone_numbers.push(network_portion(last_segment(value))),
                "EMAIL" => {
                    let value = value.replace("&lt;", "<").replace("&gt;", ">");
                    card.emails.push(last_segment(&value).to_string());
                }
                _ => {}
            }
        }
    }

    /// Appends this vCard to `out`.
    pub(crate) fn encode(&self, out: &mut String) {
        out.push_str("BEGIN:VCARD\r\n");
        let _ = write!(out, "VERSION:{}\r\n", self.version.as_str());
        if self.version == VCardVersion::V30 {
            let _ = write!(out, "FN:{}\r\n", self.formatted_name.as_deref().unwrap_or(""));
        }
        let _ = write!(out, "N:{}\r\n", self.name.as_deref().unwrap_or(""));
        for number in &self.phone_numbers {
            let _ = write!(out, "TEL:{number}\r\n");
        }
        for email in &self.emails {
            let _ = write!(out, "EMAIL:{email}\r\n");
        }
        out.push_str("END:VCARD\r\n");
    }
}

/// Splits at the first `sep` not preceded by a backslash.
fn split_unescaped(line: &str, sep: char) -> Option<(&str, &str)> {
    let mut prev = None;
    for (i, c) in line.char_indices() {
        if c == sep && prev != Some('\\') {
            return Some((&line[..i], &line[i + c.len_utf8()..]));
        }
        prev = Some(c);
    }
    None
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn last_segment(value: &str) -> &str {
    value.rsplit(';').next().unwrap_or(value).trim()
}

/// Keeps the dialable part of a phone number.
///
/// Digits, `*` and `#` are kept, as is `+` in leading position. Reading stops
/// at the first pause (`,`) or wait (`;`) character.
#[must_use]
pub fn network_portion(number: &str) -> String {
    let mut out = String::with_capacity(number.len());
    for c in number.chars() {
        match c {
            '0'..='9' | '*' | '#' => out.push(c),
            '+' if out.is_empty() => out.push(c),
            ',' | ';' => break,
            _ => {}
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(text: &str) -> VCard {
        let mut reader = LineReader::new(text);
        VCard::parse(&mut reader, 2).unwrap()
    }

    #[test]
    fn test_parse_fields() {
        let card = parse(
            "VERSION:3.0\r\nFN:Jane Roe\r\nN:Roe;Jane\r\nTEL;TYPE=CELL:+1 (555) 010-2000\r\n\
             EMAIL;INTERNET:work;&lt;jane@example.com&gt;\r\nX-FOO:bar\r\nEND:VCARD\r\n",
        );
        assert_eq!(card.version, VCardVersion::V30);
        assert_eq!(card.formatted_name.as_deref(), Some("Jane Roe"));
        assert_eq!(card.name.as_deref(), Some("Roe;Jane"));
        assert_eq!(card.phone_numbers, vec!["+15550102000"]);
        assert_eq!(card.emails, vec!["<jane@example.com>"]);
        assert_eq!(card.env_level, 2);
    }

    #[test]
    fn test_escaped_colon_in_property_name() {
        let card = parse("N\\:X:value\r\nEND:VCARD\r\n");
        assert!(card.name.is_none());
    }

    #[test]
    fn test_tel_keeps_last_segment() {
        let card = parse("TEL:home;555-1234,99\r\nEND:VCARD\r\n");
        assert_eq!(card.phone_numbers, vec!["5551234"]);
    }

    #[test]
    fn test_unterminated_vcard() {
        let mut reader = LineReader::new("N:Roe\r\n");
        assert!(VCard::parse(&mut reader, 0).is_err());
    }

    #[test]
    fn test_encode_v21_and_v30() {
        let mut out = String::new();
        VCard::phone(Some("Bob"), "+4412345").encode(&mut out);
        assert_eq!(
            out,
            "BEGIN:VCARD\r\nVERSION:2.1\r\nN:Bob\r\nTEL:+4412345\r\nEND:VCARD\r\n"
        );

        let mut out = String::new();
        VCard::email(Some("Ann"), "ann@example.com").encode(&mut out);
        assert_eq!(
            out,
            "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Ann\r\nN:Ann\r\nEMAIL:ann@example.com\r\nEND:VCARD\r\n"
        );
    }

    #[test]
    fn test_network_portion() {
        assert_eq!(network_portion("+1-800-FLOWERS"), "+1800");
        assert_eq!(network_portion("12+34"), "1234");
        assert_eq!(network_portion("*21#"), "*21#");
        assert_eq!(network_portion(""), "");
    }
}
