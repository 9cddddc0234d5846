//! OBEX request and response packets.
//!
//! Every packet starts with an opcode (or response code) byte and a 16-bit
//! packet length that includes those three bytes. CONNECT packets carry a
//! version, flags and maximum packet size before the headers; SETPATH
//! requests carry flags and a constants byte.

use bytes::{BufMut, Bytes, BytesMut};

use crate::header::HeaderSet;
use crate::{Error, Result};

/// OBEX protocol version sent in CONNECT.
pub const OBEX_VERSION: u8 = 0x10;

/// SETPATH flag: go to the parent folder first.
pub const SETPATH_BACKUP: u8 = 0x01;

/// SETPATH flag: do not create the folder if it is missing.
pub const SETPATH_NO_CREATE: u8 = 0x02;

/// The final bit of an opcode.
const FINAL_BIT: u8 = 0x80;

/// Request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Open a session.
    Connect,
    /// Close a session.
    Disconnect,
    /// Send an object.
    Put,
    /// Request an object.
    Get,
    /// Change the current folder.
    SetPath,
    /// Abort the current operation.
    Abort,
    /// Any other opcode.
    Unknown(u8),
}

impl Opcode {
    /// Splits an opcode byte into the operation and its final bit.
    #[must_use]
    pub const fn from_byte(byte: u8) -> (Self, bool) {
        let is_final = byte & FINAL_BIT != 0;
        let op = match byte {
            0x80 => Self::Connect,
            0x81 => Self::Disconnect,
            0x02 | 0x82 => Self::Put,
            0x03 | 0x83 => Self::Get,
            0x85 => Self::SetPath,
            0xFF => Self::Abort,
            other => Self::Unknown(other),
        };
        (op, is_final)
    }

    /// Opcode byte, with the final bit set when `is_final`.
    #[must_use]
    pub const fn to_byte(self, is_final: bool) -> u8 {
        let bit = if is_final { FINAL_BIT } else { 0 };
        match self {
            Self::Connect => 0x80,
            Self::Disconnect => 0x81,
            Self::Put => 0x02 | bit,
            Self::Get => 0x03 | bit,
            Self::SetPath => 0x85,
            Self::Abort => 0xFF,
            Self::Unknown(b) => b,
        }
    }
}

/// Response code, final bit included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// More packets follow.
    Continue,
    /// Success.
    Ok,
    /// Malformed request.
    BadRequest,
    /// Request not allowed in this state.
    Forbidden,
    /// Object or folder does not exist.
    NotFound,
    /// Request understood but refused.
    NotAcceptable,
    /// A required parameter is missing.
    PreconditionFailed,
    /// Server-side failure.
    InternalServerError,
    /// Operation not supported.
    NotImplemented,
    /// Backing service unavailable.
    ServiceUnavailable,
}

impl ResponseCode {
    /// Wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Continue => 0x90,
            Self::Ok => 0xA0,
            Self::BadRequest => 0xC0,
            Self::Forbidden => 0xC3,
            Self::NotFound => 0xC4,
            Self::NotAcceptable => 0xC6,
            Self::PreconditionFailed => 0xCC,
            Self::InternalServerError => 0xD0,
            Self::NotImplemented => 0xD1,
            Self::ServiceUnavailable => 0xD3,
        }
    }

    /// Parses a wire value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x90 => Self::Continue,
            0xA0 => Self::Ok,
            0xC0 => Self::BadRequest,
            0xC3 => Self::Forbidden,
            0xC4 => Self::NotFound,
            0xC6 => Self::NotAcceptable,
            0xCC => Self::PreconditionFailed,
            0xD0 => Self::InternalServerError,
            0xD1 => Self::NotImplemented,
            0xD3 => Self::ServiceUnavailable,
            _ => return None,
        })
    }

    /// Returns `true` for `Continue` and `Ok`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Continue | Self::Ok)
    }
}

/// Fields carried by CONNECT requests and responses before the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectFields {
    /// Protocol version.
    pub version: u8,
    /// Connect flags.
    pub flags: u8,
    /// Largest packet the sender accepts.
    pub max_packet_size: u16,
}

impl ConnectFields {
    /// Fields for the given maximum packet size.
    #[must_use]
    pub const fn new(max_packet_size: u16) -> Self {
        Self {
            version: OBEX_VERSION,
            flags: 0,
            max_packet_size,
        }
    }

    fn decode(data: &[u8]) -> Result<Self> {
        match data {
            [version, flags, hi, lo, ..] => Ok(Self {
                version: *version,
                flags: *flags,
                max_packet_size: u16::from_be_bytes([*hi, *lo]),
            }),
            _ => Err(Error::Format("truncated CONNECT fields".to_string())),
        }
    }

    fn encode(self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.flags);
        buf.put_u16(self.max_packet_size);
    }
}

/// A request packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Operation.
    pub opcode: Opcode,
    /// Final bit of the opcode.
    pub is_final: bool,
    /// CONNECT fields, for CONNECT requests.
    pub connect: Option<ConnectFields>,
    /// SETPATH flags, for SETPATH requests.
    pub setpath_flags: u8,
    /// Request headers.
    pub headers: HeaderSet,
}

impl Request {
    /// Creates a final request without headers.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            is_final: true,
            connect: None,
            setpath_flags: 0,
            headers: HeaderSet::new(),
        }
    }

    /// Decodes a whole packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the length field disagrees with the packet or the
    /// fields or headers are malformed.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let (&op, body) = split_packet(packet)?;
        let (opcode, is_final) = Opcode::from_byte(op);

        let mut request = Self::new(opcode);
        request.is_final = is_final;

        let header_block = match opcode {
            Opcode::Connect => {
                request.connect = Some(ConnectFields::decode(body)?);
                &body[4..]
            }
            Opcode::SetPath => {
                let [flags, _constants, rest @ ..] = body else {
                    return Err(Error::Format("truncated SETPATH fields".to_string()));
                };
                request.setpath_flags = *flags;
                rest
            }
            _ => body,
        };
        request.headers = HeaderSet::decode(header_block)?;

        Ok(request)
    }

    /// Encodes the request as one packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet does not fit the 16-bit length field.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        buf.put_u8(self.opcode.to_byte(self.is_final));
        buf.put_u16(0);
        if self.opcode == Opcode::Connect {
            self.connect
                .unwrap_or_else(|| ConnectFields::new(u16::MAX))
                .encode(&mut buf);
        }
        if self.opcode == Opcode::SetPath {
            buf.put_u8(self.setpath_flags);
            buf.put_u8(0);
        }
        self.headers.encode(&mut buf)?;
        finish_packet(buf)
    }
}

/// A response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response code.
    pub code: ResponseCode,
    /// CONNECT fields, for CONNECT responses.
    pub connect: Option<ConnectFields>,
    /// Response headers.
    pub headers: HeaderSet,
}

impl Response {
    /// Creates a response without headers.
    #[must_use]
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            connect: None,
            headers: HeaderSet::new(),
        }
    }

    /// Encodes the response as one packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet does not fit the 16-bit length field.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        buf.put_u8(self.code.as_u8());
        buf.put_u16(0);
        if let Some(fields) = self.connect {
            fields.encode(&mut buf);
        }
        self.headers.encode(&mut buf)?;
        finish_packet(buf)
    }

    /// Decodes a whole packet. CONNECT fields are read when `to_connect` is
    /// set, since the response itself does not say which request it answers.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown response code or malformed content.
    pub fn decode(packet: &[u8], to_connect: bool) -> Result<Self> {
        let (&code, body) = split_packet(packet)?;
        let code = ResponseCode::from_u8(code)
            .ok_or_else(|| Error::Protocol(format!("unknown response code 0x{code:02X}")))?;

        let mut response = Self::new(code);
        let header_block = if to_connect {
            response.connect = Some(ConnectFields::decode(body)?);
            &body[4..]
        } else {
            body
        };
        response.headers = HeaderSet::decode(header_block)?;

        Ok(response)
    }
}

/// Reads the declared packet length from the first three bytes.
///
/// # Errors
///
/// Returns [`Error::Format`] if the length is below the packet prefix.
pub fn packet_length(prefix: [u8; 3]) -> Result<usize> {
    let len = usize::from(u16::from_be_bytes([prefix[1], prefix[2]]));
    if len < 3 {
        return Err(Error::Format(format!("packet length {len} below prefix")));
    }
    Ok(len)
}

fn split_packet(packet: &[u8]) -> Result<(&u8, &[u8])> {
    let [first, hi, lo, body @ ..] = packet else {
        return Err(Error::Format("packet shorter than prefix".to_string()));
    };
    let len = packet_length([*first, *hi, *lo])?;
    if len != packet.len() {
        return Err(Error::Format(format!(
            "packet length field {len} but {} bytes received",
            packet.len()
        )));
    }
    Ok((first, body))
}

fn finish_packet(mut buf: BytesMut) -> Result<Bytes> {
    let len = u16::try_from(buf.len()).map_err(|_| Error::PacketTooLarge {
        size: buf.len(),
        max: usize::from(u16::MAX),
    })?;
    buf[1..3].copy_from_slice(&len.to_be_bytes());
    Ok(buf.freeze())
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
    fn test_opcode_final_bit() {
        assert_eq!(Opcode::from_byte(0x03), (Opcode::Get, false));
        assert_eq!(Opcode::from_byte(0x83), (Opcode::Get, true));
        assert_eq!(Opcode::from_byte(0x85), (Opcode::SetPath, true));
        assert_eq!(Opcode::from_byte(0x07), (Opcode::Unknown(0x07), false));
        assert_eq!(Opcode::Put.to_byte(false), 0x02);
        assert_eq!(Opcode::Put.to_byte(true), 0x82);
    }

    #[test]
    fn test_response_codes() {
        for code in [
            ResponseCode::Continue,
            ResponseCode::Ok,
            ResponseCode::BadRequest,
            ResponseCode::PreconditionFailed,
            ResponseCode::ServiceUnavailable,
        ] {
            assert_eq!(ResponseCode::from_u8(code.as_u8()), Some(code));
        }
        assert_eq!(ResponseCode::from_u8(0x20), None);
        assert!(!ResponseCode::NotFound.is_success());
    }

    #[test]
    fn test_decode_connect_request() {
        let packet = [
            0x80, 0x00, 0x1A, 0x10, 0x00, 0x04, 0x00, // connect fields, max 1024
            0x46, 0x00, 0x13, 0xBB, 0x58, 0x2B, 0x40, 0x42, 0x0C, 0x11, 0xDB, 0xB0, 0xDE, 0x08,
            0x00, 0x20, 0x0C, 0x9A, 0x66,
        ];
        let request = Request::decode(&packet).unwrap();
        assert_eq!(request.opcode, Opcode::Connect);
        assert_eq!(request.connect.unwrap().max_packet_size, 1024);
        assert_eq!(request.headers.target().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_decode_setpath_request() {
        let packet = [0x85, 0x00, 0x05, SETPATH_BACKUP | SETPATH_NO_CREATE, 0x00];
        let request = Request::decode(&packet).unwrap();
        assert_eq!(request.opcode, Opcode::SetPath);
        assert_eq!(request.setpath_flags & SETPATH_BACKUP, SETPATH_BACKUP);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        assert!(matches!(
            Request::decode(&[0x83, 0x00, 0x09, 0x01]),
            Err(Error::Format(_))
        ));
        assert!(Request::decode(&[0x83, 0x00]).is_err());
    }

    #[test]
    fn test_request_roundtrip() {
        let mut request = Request::new(Opcode::Get);
        request.headers.set_connection_id(7);
        request.headers.set_mime_type("x-obex/folder-listing");
        let decoded = Request::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_connect_response_layout() {
        let mut response = Response::new(ResponseCode::Ok);
        response.connect = Some(ConnectFields::new(0xFFFE));
        response.headers.set_connection_id(1);

        let bytes = response.encode().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0xA0, 0x00, 0x0C, 0x10, 0x00, 0xFF, 0xFE, 0xCB, 0x00, 0x00, 0x00, 0x01]
        );
        assert_eq!(Response::decode(&bytes, true).unwrap(), response);
    }

    #[test]
    fn test_packet_length() {
        assert_eq!(packet_length([0xA0, 0x01, 0x00]).unwrap(), 256);
        assert!(packet_length([0xA0, 0x00, 0x02]).is_err());
    }
}
