//! OBEX headers.
//!
//! The two high bits of a header identifier select its encoding:
//!
//! | bits   | value                                             |
//! |--------|---------------------------------------------------|
//! | `0x00` | length-prefixed, NUL-terminated UTF-16BE text     |
//! | `0x40` | length-prefixed byte sequence                     |
//! | `0x80` | single byte                                       |
//! | `0xC0` | four-byte big-endian quantity                     |

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Header identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderId(pub u8);

impl HeaderId {
    /// Object name (unicode).
    pub const NAME: Self = Self(0x01);
    /// Object MIME type (NUL-terminated ASCII bytes).
    pub const TYPE: Self = Self(0x42);
    /// Service the CONNECT is aimed at.
    pub const TARGET: Self = Self(0x46);
    /// Body chunk.
    pub const BODY: Self = Self(0x48);
    /// Final body chunk.
    pub const END_OF_BODY: Self = Self(0x49);
    /// Service identity in a CONNECT response.
    pub const WHO: Self = Self(0x4A);
    /// Application parameters.
    pub const APP_PARAMETERS: Self = Self(0x4C);
    /// Object length.
    pub const LENGTH: Self = Self(0xC3);
    /// Connection identifier.
    pub const CONNECTION_ID: Self = Self(0xCB);

    /// The encoding selected by the high bits.
    #[must_use]
    pub const fn encoding(self) -> HeaderEncoding {
        match self.0 & 0xC0 {
            0x00 => HeaderEncoding::Unicode,
            0x40 => HeaderEncoding::Bytes,
            0x80 => HeaderEncoding::Byte,
            _ => HeaderEncoding::FourBytes,
        }
    }
}

/// Wire encoding of a header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderEncoding {
    /// UTF-16BE text with a terminating NUL.
    Unicode,
    /// Raw bytes.
    Bytes,
    /// One byte.
    Byte,
    /// Four bytes, big-endian.
    FourBytes,
}

/// A decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Text value.
    Unicode(String),
    /// Byte sequence value.
    Bytes(Bytes),
    /// Single byte value.
    Byte(u8),
    /// Four-byte value.
    U32(u32),
}

impl HeaderValue {
    const fn encoding(&self) -> HeaderEncoding {
        match self {
            Self::Unicode(_) => HeaderEncoding::Unicode,
            Self::Bytes(_) => HeaderEncoding::Bytes,
            Self::Byte(_) => HeaderEncoding::Byte,
            Self::U32(_) => HeaderEncoding::FourBytes,
        }
    }
}

/// Ordered set of headers, at most one per identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<(HeaderId, HeaderValue)>,
}

impl HeaderSet {
    /// Creates an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no header is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterates over the headers in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &(HeaderId, HeaderValue)> {
        self.headers.iter()
    }

    /// Looks up a header.
    #[must_use]
    pub fn get(&self, id: HeaderId) -> Option<&HeaderValue> {
        self.headers.iter().find(|(h, _)| *h == id).map(|(_, v)| v)
    }

    /// Returns `true` if the header is present.
    #[must_use]
    pub fn contains(&self, id: HeaderId) -> bool {
        self.get(id).is_some()
    }

    /// Sets a header, replacing a previous value with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the value kind does not match the
    /// encoding implied by the id.
    pub fn set(&mut self, id: HeaderId, value: HeaderValue) -> Result<()> {
        if value.encoding() != id.encoding() {
            return Err(Error::InvalidHeader {
                id: id.0,
                message: format!("{:?} value for {:?} header", value.encoding(), id.encoding()),
            });
        }
        self.insert(id, value);
        Ok(())
    }

    fn insert(&mut self, id: HeaderId, value: HeaderValue) {
        match self.headers.iter_mut().find(|(h, _)| *h == id) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((id, value)),
        }
    }

    /// Removes a header.
    pub fn remove(&mut self, id: HeaderId) -> Option<HeaderValue> {
        let pos = self.headers.iter().position(|(h, _)| *h == id)?;
        Some(self.headers.remove(pos).1)
    }

    fn bytes(&self, id: HeaderId) -> Option<&Bytes> {
        match self.get(id)? {
            HeaderValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn u32(&self, id: HeaderId) -> Option<u32> {
        match self.get(id)? {
            HeaderValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// The NAME header. An empty NAME is `Some("")`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self.get(HeaderId::NAME)? {
            HeaderValue::Unicode(s) => Some(s),
            _ => None,
        }
    }

    /// Sets the NAME header.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.insert(HeaderId::NAME, HeaderValue::Unicode(name.into()));
    }

    /// The TYPE header without its terminating NUL.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        let raw: &[u8] = self.bytes(HeaderId::TYPE)?;
        let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
        std::str::from_utf8(raw).ok()
    }

    /// Sets the TYPE header, adding the terminating NUL.
    pub fn set_mime_type(&mut self, mime_type: &str) {
        let mut raw = BytesMut::with_capacity(mime_type.len() + 1);
        raw.put_slice(mime_type.as_bytes());
        raw.put_u8(0);
        self.insert(HeaderId::TYPE, HeaderValue::Bytes(raw.freeze()));
    }

    /// The TARGET header.
    #[must_use]
    pub fn target(&self) -> Option<&[u8]> {
        self.bytes(HeaderId::TARGET).map(AsRef::as_ref)
    }

    /// Sets the TARGET header.
    pub fn set_target(&mut self, target: impl Into<Bytes>) {
        self.insert(HeaderId::TARGET, HeaderValue::Bytes(target.into()));
    }

    /// The WHO header.
    #[must_use]
    pub fn who(&self) -> Option<&[u8]> {
        self.bytes(HeaderId::WHO).map(AsRef::as_ref)
    }

    /// Sets the WHO header.
    pub fn set_who(&mut self, who: impl Into<Bytes>) {
        self.insert(HeaderId::WHO, HeaderValue::Bytes(who.into()));
    }

    /// The raw application-parameter block.
    #[must_use]
    pub fn app_params(&self) -> Option<&[u8]> {
        self.bytes(HeaderId::APP_PARAMETERS).map(AsRef::as_ref)
    }

    /// Sets the application-parameter block.
    pub fn set_app_params(&mut self, params: impl Into<Bytes>) {
        self.insert(HeaderId::APP_PARAMETERS, HeaderValue::Bytes(params.into()));
    }

    /// The CONNECTION ID header.
    #[must_use]
    pub fn connection_id(&self) -> Option<u32> {
        self.u32(HeaderId::CONNECTION_ID)
    }

    /// Sets the CONNECTION ID header.
    pub fn set_connection_id(&mut self, id: u32) {
        self.insert(HeaderId::CONNECTION_ID, HeaderValue::U32(id));
    }

    /// The LENGTH header.
    #[must_use]
    pub fn length(&self) -> Option<u32> {
        self.u32(HeaderId::LENGTH)
    }

    /// Body chunk carried in BODY or END-OF-BODY, and whether it was the
    /// final one.
    #[must_use]
    pub fn body_chunk(&self) -> Option<(&[u8], bool)> {
        if let Some(end) = self.bytes(HeaderId::END_OF_BODY) {
            return Some((end, true));
        }
        self.bytes(HeaderId::BODY).map(|b| (b.as_ref(), false))
    }

    /// Sets a body chunk, as END-OF-BODY when `last` is set.
    pub fn set_body_chunk(&mut self, chunk: impl Into<Bytes>, last: bool) {
        self.remove(HeaderId::BODY);
        self.remove(HeaderId::END_OF_BODY);
        let id = if last { HeaderId::END_OF_BODY } else { HeaderId::BODY };
        self.insert(id, HeaderValue::Bytes(chunk.into()));
    }

    /// Number of bytes [`HeaderSet::encode`] will write.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.headers
            .iter()
            .map(|(_, v)| match v {
                HeaderValue::Unicode(s) if s.is_empty() => 3,
                HeaderValue::Unicode(s) => 3 + (s.encode_utf16().count() + 1) * 2,
                HeaderValue::Bytes(b) => 3 + b.len(),
                HeaderValue::Byte(_) => 2,
                HeaderValue::U32(_) => 5,
            })
            .sum()
    }

    /// Appends the encoded headers to `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if a value does not fit the 16-bit
    /// length field.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        for (id, value) in &self.headers {
            buf.put_u8(id.0);
            match value {
                HeaderValue::Unicode(s) => {
                    let mut units: Vec<u16> = s.encode_utf16().collect();
                    if !units.is_empty() {
                        units.push(0);
                    }
                    put_length(buf, *id, 3 + units.len() * 2)?;
                    for unit in units {
                        buf.put_u16(unit);
                    }
                }
                HeaderValue::Bytes(b) => {
                    put_length(buf, *id, 3 + b.len())?;
                    buf.put_slice(b);
                }
                HeaderValue::Byte(b) => buf.put_u8(*b),
                HeaderValue::U32(v) => buf.put_u32(*v),
            }
        }
        Ok(())
    }

    /// Decodes a header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a header that overruns the input,
    /// declares a length below its prefix, or carries invalid UTF-16.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let mut set = Self::new();

        while let Some((&raw_id, rest)) = data.split_first() {
            let id = HeaderId(raw_id);
            let truncated = || Error::InvalidHeader {
                id: raw_id,
                message: "truncated header".to_string(),
            };

            let (value, consumed) = match id.encoding() {
                HeaderEncoding::Byte => {
                    (HeaderValue::Byte(*rest.first().ok_or_else(truncated)?), 2)
                }
                HeaderEncoding::FourBytes => {
                    let raw: [u8; 4] = rest
                        .get(..4)
                        .and_then(|s| s.try_into().ok())
                        .ok_or_else(truncated)?;
                    (HeaderValue::U32(u32::from_be_bytes(raw)), 5)
                }
                HeaderEncoding::Unicode | HeaderEncoding::Bytes => {
                    let len_bytes: [u8; 2] = rest
                        .get(..2)
                        .and_then(|s| s.try_into().ok())
                        .ok_or_else(truncated)?;
                    let len = usize::from(u16::from_be_bytes(len_bytes));
                    if len < 3 {
                        return Err(Error::InvalidHeader {
                            id: raw_id,
                            message: format!("length {len} shorter than prefix"),
                        });
                    }
                    let payload = data.get(3..len).ok_or_else(truncated)?;
                    let value = if id.encoding() == HeaderEncoding::Unicode {
                        HeaderValue::Unicode(decode_utf16(raw_id, payload)?)
                    } else {
                        HeaderValue::Bytes(Bytes::copy_from_slice(payload))
                    };
                    (value, len)
                }
            };

            set.insert(id, value);
            data = &data[consumed..];
        }

        Ok(set)
    }
}

fn put_length(buf: &mut BytesMut, id: HeaderId, len: usize) -> Result<()> {
    let len = u16::try_from(len).map_err(|_| Error::InvalidHeader {
        id: id.0,
        message: format!("{len} bytes exceed the header length field"),
    })?;
    buf.put_u16(len);
    Ok(())
}

fn decode_utf16(id: u8, payload: &[u8]) -> Result<String> {
    if payload.len() % 2 != 0 {
        return Err(Error::InvalidHeader {
            id,
            message: "odd-length unicode value".to_string(),
        });
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let units = units.strip_suffix(&[0]).unwrap_or(&units[..]);
    String::from_utf16(units).map_err(|e| Error::InvalidHeader {
        id,
        message: e.to_string(),
    })
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
    fn test_header_encoding_bits() {
        assert_eq!(HeaderId::NAME.encoding(), HeaderEncoding::Unicode);
        assert_eq!(HeaderId::TYPE.encoding(), HeaderEncoding::Bytes);
        assert_eq!(HeaderId(0x97).encoding(), HeaderEncoding::Byte);
        assert_eq!(HeaderId::CONNECTION_ID.encoding(), HeaderEncoding::FourBytes);
    }

    #[test]
    fn test_name_wire_format() {
        let mut headers = HeaderSet::new();
        headers.set_name("in");

        let mut buf = BytesMut::new();
        headers.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x00, 0x09, 0x00, b'i', 0x00, b'n', 0x00, 0x00]);
        assert_eq!(headers.encoded_len(), buf.len());

        let decoded = HeaderSet::decode(&buf).unwrap();
        assert_eq!(decoded.name(), Some("in"));
    }

    #[test]
    fn test_empty_name_is_present() {
        let decoded = HeaderSet::decode(&[0x01, 0x00, 0x03]).unwrap();
        assert_eq!(decoded.name(), Some(""));
    }

    #[test]
    fn test_type_strips_nul() {
        let mut headers = HeaderSet::new();
        headers.set_mime_type("x-bt/message");
        let mut buf = BytesMut::new();
        headers.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 3 + 13);

        let decoded = HeaderSet::decode(&buf).unwrap();
        assert_eq!(decoded.mime_type(), Some("x-bt/message"));
    }

    #[test]
    fn test_decode_mixed_headers() {
        let data = [
            0xCB, 0x00, 0x00, 0x00, 0x01, // connection id
            0x97, 0x01, // single byte (SRM)
            0x49, 0x00, 0x05, b'h', b'i', // end of body
        ];
        let headers = HeaderSet::decode(&data).unwrap();
        assert_eq!(headers.connection_id(), Some(1));
        assert_eq!(headers.get(HeaderId(0x97)), Some(&HeaderValue::Byte(1)));
        assert_eq!(headers.body_chunk(), Some((&b"hi"[..], true)));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(HeaderSet::decode(&[0x48, 0x00, 0x09, b'x']).is_err());
        assert!(HeaderSet::decode(&[0xCB, 0x00]).is_err());
        assert!(HeaderSet::decode(&[0x42, 0x00, 0x01]).is_err());
    }

    #[test]
    fn test_set_rejects_mismatched_kind() {
        let mut headers = HeaderSet::new();
        assert!(headers.set(HeaderId::NAME, HeaderValue::U32(1)).is_err());
        assert!(headers.set(HeaderId::LENGTH, HeaderValue::U32(1)).is_ok());
        assert_eq!(headers.length(), Some(1));
    }

    #[test]
    fn test_body_chunk_replaces_previous() {
        let mut headers = HeaderSet::new();
        headers.set_body_chunk(&b"one"[..], false);
        headers.set_body_chunk(&b"two"[..], true);
        assert_eq!(headers.body_chunk(), Some((&b"two"[..], true)));
        assert!(!headers.contains(HeaderId::BODY));
    }
}
