//! Framed I/O for OBEX packets.
//!
//! OBEX packets are self-delimiting: byte 0 is the opcode or response code
//! and bytes 1-2 the big-endian length of the whole packet.

#![allow(clippy::missing_errors_doc)]

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::packet::{Request, Response, packet_length};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Largest packet size a peer may negotiate.
pub const DEFAULT_MAX_PACKET_SIZE: u16 = 0xFFFE;

/// Smallest packet size OBEX allows.
pub const MIN_PACKET_SIZE: u16 = 255;

/// Framed connection carrying whole OBEX packets.
pub struct PacketStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    max_packet_size: usize,
}

impl<S> PacketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a packet stream accepting packets up to `max_packet_size`.
    pub fn new(stream: S, max_packet_size: u16) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            max_packet_size: usize::from(max_packet_size.max(MIN_PACKET_SIZE)),
        }
    }

    /// Largest packet accepted by [`PacketStream::read_packet`].
    #[must_use]
    pub const fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Reads one whole packet.
    ///
    /// Returns `Ok(None)` if the peer closed the stream between packets.
    pub async fn read_packet(&mut self) -> Result<Option<Bytes>> {
        if self.reader.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let mut prefix = [0u8; 3];
        self.reader.read_exact(&mut prefix).await?;
        let len = packet_length(prefix)?;
        if len > self.max_packet_size {
            return Err(Error::PacketTooLarge {
                size: len,
                max: self.max_packet_size,
            });
        }

        let mut packet = BytesMut::zeroed(len);
        packet[..3].copy_from_slice(&prefix);
        self.reader.read_exact(&mut packet[3..]).await?;
        trace!(opcode = prefix[0], len, "read packet");

        Ok(Some(packet.freeze()))
    }

    /// Reads and decodes one request.
    pub async fn read_request(&mut self) -> Result<Option<Request>> {
        match self.read_packet().await? {
            Some(packet) => Request::decode(&packet).map(Some),
            None => Ok(None),
        }
    }

    /// Reads and decodes one response.
    pub async fn read_response(&mut self, to_connect: bool) -> Result<Response> {
        let packet = self.read_packet().await?.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            ))
        })?;
        Response::decode(&packet, to_connect)
    }

    /// Encodes and writes a response.
    pub async fn write_response(&mut self, response: &Response) -> Result<()> {
        let packet = response.encode()?;
        self.write_packet(&packet).await
    }

    /// Encodes and writes a request.
    pub async fn write_request(&mut self, request: &Request) -> Result<()> {
        let packet = request.encode()?;
        self.write_packet(&packet).await
    }

    /// Writes an already encoded packet.
    pub async fn write_packet(&mut self, data: &[u8]) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Consumes the packet stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
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
    use crate::packet::{Opcode, ResponseCode};
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_packet_split_reads() {
        let mock = Builder::new()
            .read(&[0x83, 0x00])
            .read(&[0x08, 0xCB, 0x00])
            .read(&[0x00, 0x00, 0x01])
            .build();
        let mut stream = PacketStream::new(mock, 1024);

        let request = stream.read_request().await.unwrap().unwrap();
        assert_eq!(request.opcode, Opcode::Get);
        assert_eq!(request.headers.connection_id(), Some(1));
    }

    #[tokio::test]
    async fn test_read_packet_clean_eof() {
        let mock = Builder::new().build();
        let mut stream = PacketStream::new(mock, 1024);
        assert!(stream.read_packet().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_packet_too_large() {
        let mock = Builder::new().read(&[0x82, 0x10, 0x00]).build();
        let mut stream = PacketStream::new(mock, 1024);

        let err = stream.read_packet().await.unwrap_err();
        assert!(matches!(err, Error::PacketTooLarge { size: 4096, max: 1024 }));
    }

    #[tokio::test]
    async fn test_read_packet_truncated_body() {
        let mock = Builder::new().read(&[0x82, 0x00, 0x08, 0x48]).build();
        let mut stream = PacketStream::new(mock, 1024);
        assert!(matches!(stream.read_packet().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_write_response() {
        let mock = Builder::new().write(&[0xC4, 0x00, 0x03]).build();
        let mut stream = PacketStream::new(mock, 1024);

        stream
            .write_response(&Response::new(ResponseCode::NotFound))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_min_packet_size_enforced() {
        let mock = Builder::new().build();
        let stream = PacketStream::new(mock, 10);
        assert_eq!(stream.max_packet_size(), 255);
    }
}
