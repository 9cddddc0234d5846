//! Transfer and header encodings.
//!
//! Base64 bodies are wrapped at 76 columns on output and accept embedded line
//! breaks on input. Quoted-Printable is decode only: outgoing text parts use
//! `8BIT`.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Column at which encoded Base64 lines are wrapped.
const BASE64_LINE: usize = 76;

/// Encodes data as Base64, one CRLF-terminated line per 76 characters.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    let flat = STANDARD.encode(data);
    let mut out = String::with_capacity(flat.len() + flat.len() / BASE64_LINE * 2 + 2);
    for chunk in flat.as_bytes().chunks(BASE64_LINE) {
        // chunks of an ASCII string are valid UTF-8
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the remaining input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Decodes Quoted-Printable text into raw bytes.
///
/// Soft line breaks (`=` before a line end) are removed.
///
/// # Errors
///
/// Returns an error for a truncated or non-hex escape.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        match bytes.get(i + 1..i + 3) {
            Some([b'\r', b'\n']) => i += 3,
            Some([b'\n', _]) => i += 2,
            None if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            Some(hex) => {
                let byte = std::str::from_utf8(hex)
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "bad quoted-printable escape at offset {i}"
                        ))
                    })?;
                out.push(byte);
                i += 3;
            }
            None => {
                return Err(Error::InvalidEncoding(
                    "truncated quoted-printable escape".to_string(),
                ));
            }
        }
    }

    Ok(out)
}

/// Converts bytes in `charset` to a string.
///
/// UTF-8 and US-ASCII are decoded lossily, ISO-8859-1 maps byte for byte.
/// Anything else is treated as UTF-8.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    match charset.map(str::to_ascii_lowercase).as_deref() {
        Some("iso-8859-1" | "latin1" | "windows-1252") => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Text that is not
/// an encoded word passes through unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word uses an unknown encoding or carries
/// invalid data.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let Some((word, consumed)) = split_encoded_word(candidate) else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            last_was_word = false;
            continue;
        };

        if !(last_was_word && before.trim().is_empty()) {
            out.push_str(before);
        }
        out.push_str(&decode_word(word)?);
        rest = &candidate[consumed..];
        last_was_word = true;
    }

    out.push_str(rest);
    Ok(out)
}

/// Finds the `charset?enc?text` body of an encoded word at the start of `s`.
fn split_encoded_word(s: &str) -> Option<(&str, usize)> {
    let inner = s.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let enc_end = charset_end + 1 + inner[charset_end + 1..].find('?')?;
    let text_end = enc_end + 1 + inner[enc_end + 1..].find("?=")?;
    Some((&inner[..text_end], text_end + 4))
}

fn decode_word(word: &str) -> Result<String> {
    let mut fields = word.splitn(3, '?');
    let charset = fields.next().unwrap_or_default();
    let encoding = fields.next().unwrap_or_default();
    let payload = fields.next().unwrap_or_default();

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload)?,
        "Q" | "q" => decode_quoted_printable(&payload.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "unknown header encoding {other}"
            )));
        }
    };

    Ok(decode_charset(&bytes, Some(charset)))
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_wraps_lines() {
        let data = vec![0xABu8; 120];
        let encoded = encode_base64(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines[0].len(), 76);
        assert!(encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert!(decode_base64("!!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(
            decode_quoted_printable("H=C3=A9llo=\r\n world").unwrap(),
            "Héllo world".as_bytes()
        );
        assert!(decode_quoted_printable("abc=4").is_err());
        assert!(decode_quoted_printable("abc=ZZ").is_err());
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("ISO-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("utf-8")), "café");
    }

    #[test]
    fn test_rfc2047_words() {
        assert_eq!(decode_rfc2047("plain subject").unwrap(), "plain subject");
        assert_eq!(
            decode_rfc2047("=?UTF-8?B?SGVsbG8=?= =?UTF-8?Q?_W=C3=B6rld?=").unwrap(),
            "Hello Wörld"
        );
        assert_eq!(
            decode_rfc2047("Re: =?iso-8859-1?Q?caf=E9?= time").unwrap(),
            "Re: café time"
        );
        assert!(decode_rfc2047("=?UTF-8?X?abc?=").is_err());
    }

    proptest! {
        #[test]
        fn base64_survives_wrapping(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode_base64(&encode_base64(&data)).unwrap(), data);
        }
    }
}
