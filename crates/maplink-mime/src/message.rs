//! MIME message structure, parsing and encoding.

use crate::address::{Address, encode_address_header, parse_address_list};
use crate::content_type::ContentType;
use crate::encoding::{
    decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047, encode_base64,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset};

/// Date layout used for the `Date` header.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Prefix of generated multipart boundaries.
const BOUNDARY_PREFIX: &str = "MessageBoundary.";

/// Content transfer encoding of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data in CRLF lines.
    #[default]
    EightBit,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Unencoded binary.
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value. Unknown values map to
    /// [`TransferEncoding::EightBit`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::EightBit,
        }
    }

    /// Header value for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7BIT",
            Self::EightBit => "8BIT",
            Self::Base64 => "Base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        }
    }

    fn decode(self, body: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.as_bytes().to_vec()),
        }
    }
}

/// One body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Part content type, including `charset` for text.
    pub content_type: ContentType,
    /// `Content-ID`, referenced from SMIL as `cid:`.
    pub content_id: Option<String>,
    /// `Content-Location`, referenced from SMIL by file name.
    pub content_location: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// Decoded body bytes.
    pub body: Vec<u8>,
}

impl MimePart {
    /// Creates a UTF-8 `text/plain` part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::new("text/plain").with_param("charset", "UTF-8"),
            content_id: None,
            content_location: None,
            content_disposition: None,
            body: text.into().into_bytes(),
        }
    }

    /// Creates a binary part such as an image or attachment.
    #[must_use]
    pub fn binary(mime_type: &str, name: Option<&str>, body: Vec<u8>) -> Self {
        Self {
            content_type: ContentType::new(mime_type),
            content_id: None,
            content_location: name.map(ToString::to_string),
            content_disposition: name.map(|n| format!("attachment; filename=\"{n}\"")),
            body,
        }
    }

    /// Returns `true` for `text/*` parts.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.content_type.is_text()
    }

    /// Body decoded with the part charset.
    #[must_use]
    pub fn body_text(&self) -> String {
        decode_charset(&self.body, self.content_type.charset())
    }

    fn encode_into(&self, out: &mut String, boundary: &str) {
        out.push_str("--");
        out.push_str(boundary);
        out.push_str("\r\n");
        out.push_str("Content-Type: ");
        out.push_str(&self.content_type.to_string());
        out.push_str("\r\n");
        if let Some(location) = &self.content_location {
            out.push_str("Content-Location: ");
            out.push_str(location);
            out.push_str("\r\n");
        }
        if let Some(id) = &self.content_id {
            out.push_str("Content-ID: ");
            out.push_str(id);
            out.push_str("\r\n");
        }
        if let Some(disposition) = &self.content_disposition {
            out.push_str("Content-Disposition: ");
            out.push_str(disposition);
            out.push_str("\r\n");
        }

        if self.is_text() {
            out.push_str("Content-Transfer-Encoding: 8BIT\r\n\r\n");
            out.push_str(&String::from_utf8_lossy(&self.body));
            out.push_str("\r\n");
        } else {
            out.push_str("Content-Transfer-Encoding: Base64\r\n\r\n");
            out.push_str(&encode_base64(&self.body));
        }
    }

    fn parse(segment: &str, default_type: &ContentType) -> Result<Self> {
        let (header_text, body) = split_head(segment);
        let headers = Headers::parse(header_text)?;

        let content_type = match headers.get("Content-Type") {
            Some(value) => ContentType::parse(value)?,
            None => default_type.clone(),
        };
        let encoding = headers
            .get("Content-Transfer-Encoding")
            .map(TransferEncoding::parse)
            .unwrap_or_default();

        Ok(Self {
            content_type,
            content_id: headers.get("Content-ID").map(ToString::to_string),
            content_location: headers.get("Content-Location").map(ToString::to_string),
            content_disposition: headers.get("Content-Disposition").map(ToString::to_string),
            body: encoding.decode(body)?,
        })
    }
}

/// A MIME message as carried in an email or MMS bMessage body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimeMessage {
    /// `Date` header.
    pub date: Option<DateTime<FixedOffset>>,
    /// Decoded `Subject`.
    pub subject: Option<String>,
    /// `From` addresses.
    pub from: Vec<Address>,
    /// `Sender` addresses.
    pub sender: Vec<Address>,
    /// `To` addresses.
    pub to: Vec<Address>,
    /// `Cc` addresses.
    pub cc: Vec<Address>,
    /// `Bcc` addresses.
    pub bcc: Vec<Address>,
    /// `Reply-To` addresses.
    pub reply_to: Vec<Address>,
    /// `Message-Id`.
    pub message_id: Option<String>,
    /// `Mime-Version`, written only when set.
    pub mime_version: Option<String>,
    /// Top-level content type. Defaults to `multipart/mixed` on encode.
    pub content_type: Option<ContentType>,
    /// Multipart boundary. Generated on encode when unset.
    pub boundary: Option<String>,
    /// Body parts in order.
    pub parts: Vec<MimePart>,
}

impl MimeMessage {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of the first `text/plain` part, falling back to any `text/*`
    /// part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingTextPart`] if the message has no text part.
    pub fn text(&self) -> Result<String> {
        self.parts
            .iter()
            .find(|p| p.content_type.mime_type == "text/plain")
            .or_else(|| self.parts.iter().find(|p| p.is_text()))
            .map(MimePart::body_text)
            .ok_or(Error::MissingTextPart)
    }

    /// Total size of the non-text parts in bytes.
    #[must_use]
    pub fn attachment_size(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| !p.is_text())
            .map(|p| p.body.len())
            .sum()
    }

    /// Drops every non-text part.
    pub fn retain_text_parts(&mut self) {
        self.parts.retain(MimePart::is_text);
    }

    /// The boundary used on encode.
    ///
    /// An explicit boundary is returned as-is. Otherwise the first
    /// `MessageBoundary.<n>` that occurs in no part body is chosen.
    #[must_use]
    pub fn effective_boundary(&self) -> String {
        if let Some(boundary) = &self.boundary {
            return boundary.clone();
        }
        (0u32..)
            .map(|n| format!("{BOUNDARY_PREFIX}{n}"))
            .find(|candidate| {
                !self
                    .parts
                    .iter()
                    .any(|p| contains_bytes(&p.body, candidate.as_bytes()))
            })
            .unwrap_or_else(|| BOUNDARY_PREFIX.to_string())
    }

    /// Serialises headers and parts.
    #[must_use]
    pub fn encode(&self) -> String {
        let boundary = self.effective_boundary();
        let mut out = String::new();

        if let Some(date) = &self.date {
            out.push_str(&format!("Date: {}\r\n", date.format(DATE_FORMAT)));
        }
        if let Some(subject) = &self.subject {
            out.push_str(&format!("Subject: {subject}\r\n"));
        }
        if !self.from.is_empty() {
            out.push_str(&encode_address_header("From", &self.from));
        }
        if !self.sender.is_empty() {
            out.push_str(&encode_address_header("Sender", &self.sender));
        }
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            out.push_str("To:  undisclosed-recipients:;\r\n");
        }
        for (name, list) in [
            ("To", &self.to),
            ("Cc", &self.cc),
            ("Bcc", &self.bcc),
            ("Reply-To", &self.reply_to),
        ] {
            if !list.is_empty() {
                out.push_str(&encode_address_header(name, list));
            }
        }
        if let Some(id) = &self.message_id {
            out.push_str(&format!("Message-Id: {id}\r\n"));
        }
        if let Some(version) = &self.mime_version {
            out.push_str(&format!("Mime-Version: {version}\r\n"));
        }

        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| ContentType::new("multipart/mixed"))
            .with_param("boundary", boundary.as_str());
        out.push_str(&format!("Content-Type: {content_type}\r\n\r\n"));

        for part in &self.parts {
            part.encode_into(&mut out, &boundary);
        }
        out.push_str(&format!("--{boundary}--\r\n"));

        out
    }

    /// Parses a message from its wire form.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed headers, a malformed address list or
    /// content type, a multipart body without any part, or undecodable part
    /// data.
    pub fn parse(raw: &str) -> Result<Self> {
        let (header_text, body) = split_head(raw);
        let headers = Headers::parse(header_text)?;

        let mut message = Self {
            date: headers
                .get("Date")
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok()),
            subject: headers.get("Subject").map(decode_rfc2047).transpose()?,
            message_id: headers.get("Message-Id").map(ToString::to_string),
            mime_version: headers.get("Mime-Version").map(ToString::to_string),
            ..Self::default()
        };
        message.from = addresses(&headers, "From")?;
        message.sender = addresses(&headers, "Sender")?;
        message.to = addresses(&headers, "To")?;
        message.cc = addresses(&headers, "Cc")?;
        message.bcc = addresses(&headers, "Bcc")?;
        message.reply_to = addresses(&headers, "Reply-To")?;

        if let Some(value) = headers.get("Content-Type") {
            let content_type = ContentType::parse(value)?;
            message.boundary = content_type.boundary().map(ToString::to_string);
            message.content_type = Some(ContentType::new(content_type.mime_type));
        }

        let default_type = ContentType::new("text/plain");
        match message.boundary.clone() {
            Some(boundary) => {
                message.parts = split_multipart(body, &boundary)?
                    .into_iter()
                    .map(|segment| MimePart::parse(segment, &default_type))
                    .collect::<Result<_>>()?;
            }
            None => {
                let content_type = message.content_type.clone().unwrap_or(default_type);
                let encoding = headers
                    .get("Content-Transfer-Encoding")
                    .map(TransferEncoding::parse)
                    .unwrap_or_default();
                message.parts.push(MimePart {
                    content_type,
                    content_id: None,
                    content_location: None,
                    content_disposition: None,
                    body: encoding.decode(body)?,
                });
            }
        }

        Ok(message)
    }
}

fn addresses(headers: &Headers, name: &str) -> Result<Vec<Address>> {
    let mut out = Vec::new();
    for value in headers.get_all(name) {
        out.extend(parse_address_list(value)?);
    }
    Ok(out)
}

/// Splits a header block from its body at the first blank line.
fn split_head(text: &str) -> (&str, &str) {
    if let Some(body) = text.strip_prefix("\r\n") {
        return ("", body);
    }
    match text.find("\r\n\r\n") {
        Some(pos) => (&text[..pos + 2], &text[pos + 4..]),
        None => (text, ""),
    }
}

/// Returns the part segments between boundary delimiters, without the
/// preamble or epilogue.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Result<Vec<&'a str>> {
    let delimiter = format!("--{boundary}");
    let mut segments = body.split(delimiter.as_str());
    segments.next();

    let mut parts = Vec::new();
    for segment in segments {
        if segment.starts_with("--") {
            break;
        }
        let segment = match segment.find("\r\n") {
            Some(pos) => &segment[pos + 2..],
            None => continue,
        };
        parts.push(segment.strip_suffix("\r\n").unwrap_or(segment));
    }

    if parts.is_empty() {
        return Err(Error::InvalidMultipart(format!(
            "no parts found for boundary {boundary}"
        )));
    }
    Ok(parts)
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
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

    fn sample() -> MimeMessage {
        let mut message = MimeMessage::new();
        message.date = DateTime::parse_from_rfc3339("2024-03-05T14:07:09+01:00").ok();
        message.subject = Some("Lunch".to_string());
        message.from.push(Address::new(Some("Alice"), "alice@example.com"));
        message.to.push(Address::new(Some("Bob"), "bob@example.com"));
        message.message_id = Some("<42@example.com>".to_string());
        message.parts.push(MimePart::text("See you at noon"));
        message
    }

    #[test]
    fn test_encode_header_order() {
        let wire = sample().encode();
        let lines: Vec<&str> = wire.split("\r\n").collect();

        assert_eq!(lines[0], "Date: Tue, 05 Mar 2024 14:07:09 +0100");
        assert_eq!(lines[1], "Subject: Lunch");
        assert_eq!(lines[2], "From: Alice <alice@example.com>;");
        assert_eq!(lines[3], "To: Bob <bob@example.com>;");
        assert_eq!(lines[4], "Message-Id: <42@example.com>");
        assert_eq!(
            lines[5],
            "Content-Type: multipart/mixed; boundary=\"MessageBoundary.0\""
        );
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "--MessageBoundary.0");
        assert!(wire.ends_with("See you at noon\r\n--MessageBoundary.0--\r\n"));
    }

    #[test]
    fn test_encode_undisclosed_recipients() {
        let mut message = MimeMessage::new();
        message.parts.push(MimePart::text("x"));
        assert!(
            message
                .encode()
                .starts_with("To:  undisclosed-recipients:;\r\n")
        );
    }

    #[test]
    fn test_boundary_avoids_body_text() {
        let mut message = MimeMessage::new();
        message.parts.push(MimePart::text("quoting MessageBoundary.0 here"));
        assert_eq!(message.effective_boundary(), "MessageBoundary.1");
    }

    #[test]
    fn test_roundtrip_with_attachment() {
        let mut message = sample();
        message
            .parts
            .push(MimePart::binary("image/jpeg", Some("cat.jpg"), vec![0xFF, 0xD8, 0x00, 0x10]));

        let parsed = MimeMessage::parse(&message.encode()).unwrap();
        assert_eq!(parsed.subject.as_deref(), Some("Lunch"));
        assert_eq!(parsed.from, message.from);
        assert_eq!(parsed.to, message.to);
        assert_eq!(parsed.date, message.date);
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.text().unwrap(), "See you at noon");
        assert_eq!(parsed.parts[1].body, vec![0xFF, 0xD8, 0x00, 0x10]);
        assert_eq!(parsed.parts[1].content_location.as_deref(), Some("cat.jpg"));
        assert_eq!(parsed.attachment_size(), 4);
    }

    #[test]
    fn test_parse_folded_encoded_subject() {
        let raw = concat!(
            "Subject: =?UTF-8?B?SGVq?=\r\n",
            "To: a <a@example.com>;\r\n",
            " b <b@example.com>;\r\n",
            "Content-Type: multipart/mixed; boundary=XYZ\r\n",
            "\r\n",
            "preamble\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain; charset=\"UTF-8\"\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=C3=A9\r\n",
            "--XYZ--\r\n",
            "epilogue\r\n"
        );

        let message = MimeMessage::parse(raw).unwrap();
        assert_eq!(message.subject.as_deref(), Some("Hej"));
        assert_eq!(message.to.len(), 2);
        assert_eq!(message.boundary.as_deref(), Some("XYZ"));
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.text().unwrap(), "café");
    }

    #[test]
    fn test_parse_single_part_without_boundary() {
        let raw = "Subject: Hi\r\nContent-Type: text/plain\r\n\r\nJust text";
        let message = MimeMessage::parse(raw).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.text().unwrap(), "Just text");
    }

    #[test]
    fn test_parse_bad_date_is_ignored() {
        let raw = "Date: yesterday\r\n\r\nbody";
        let message = MimeMessage::parse(raw).unwrap();
        assert_eq!(message.date, None);
    }

    #[test]
    fn test_parse_empty_multipart_fails() {
        let raw = "Content-Type: multipart/mixed; boundary=B\r\n\r\nno delimiters\r\n";
        assert!(matches!(
            MimeMessage::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_retain_text_parts() {
        let mut message = sample();
        message.parts.push(MimePart::binary("image/png", None, vec![1, 2, 3]));
        message.retain_text_parts();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.attachment_size(), 0);
    }
}
