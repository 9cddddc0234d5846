//! Integration tests for the OBEX packet layer.
//!
//! These tests use a mock stream that replays client packets and captures
//! what the server side writes back.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use maplink_obex::map::{MAS_TARGET, object_type};
use maplink_obex::{
    AppParams, Charset, ConnectFields, Opcode, PacketStream, Request, Response, ResponseCode,
};

/// Mock stream that returns predefined client packets.
struct MockStream {
    /// Bytes to return (in order).
    incoming: Cursor<Vec<u8>>,
    /// Captured bytes written by the server.
    sent: Vec<u8>,
}

impl MockStream {
    fn new(incoming: &[u8]) -> Self {
        Self {
            incoming: Cursor::new(incoming.to_vec()),
            sent: Vec::new(),
        }
    }

    fn sent_data(&self) -> &[u8] {
        &self.sent
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.incoming.get_ref();
        let pos = self.incoming.position() as usize;

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.incoming.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn connect_request() -> Request {
    let mut request = Request::new(Opcode::Connect);
    request.connect = Some(ConnectFields::new(512));
    request.headers.set_target(&MAS_TARGET[..]);
    request
}

fn listing_request() -> Request {
    let params = AppParams {
        max_list_count: Some(10),
        charset: Some(Charset::Utf8),
        ..AppParams::default()
    };
    let mut request = Request::new(Opcode::Get);
    request.headers.set_connection_id(1);
    request.headers.set_mime_type(object_type::MESSAGE_LISTING);
    request.headers.set_name("inbox");
    request.headers.set_app_params(params.encode().unwrap());
    request
}

#[tokio::test]
async fn test_read_request_sequence() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&connect_request().encode().unwrap());
    wire.extend_from_slice(&listing_request().encode().unwrap());
    wire.extend_from_slice(&Request::new(Opcode::Disconnect).encode().unwrap());

    let mut stream = PacketStream::new(MockStream::new(&wire), 0xFFFE);

    let connect = stream.read_request().await.unwrap().unwrap();
    assert_eq!(connect.opcode, Opcode::Connect);
    assert_eq!(connect.connect.unwrap().max_packet_size, 512);
    assert_eq!(connect.headers.target(), Some(&MAS_TARGET[..]));

    let get = stream.read_request().await.unwrap().unwrap();
    assert_eq!(get.opcode, Opcode::Get);
    assert!(get.is_final);
    assert_eq!(get.headers.mime_type(), Some(object_type::MESSAGE_LISTING));
    assert_eq!(get.headers.name(), Some("inbox"));
    let params = AppParams::decode(get.headers.app_params().unwrap()).unwrap();
    assert_eq!(params.max_list_count, Some(10));
    assert_eq!(params.charset, Some(Charset::Utf8));

    let disconnect = stream.read_request().await.unwrap().unwrap();
    assert_eq!(disconnect.opcode, Opcode::Disconnect);

    assert!(stream.read_request().await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_responses_in_order() {
    let mut stream = PacketStream::new(MockStream::new(&[]), 0xFFFE);

    let mut connected = Response::new(ResponseCode::Ok);
    connected.connect = Some(ConnectFields::new(0xFFFE));
    connected.headers.set_who(&MAS_TARGET[..]);
    stream.write_response(&connected).await.unwrap();

    let mut chunk = Response::new(ResponseCode::Continue);
    chunk.headers.set_body_chunk(&b"<MAP-msg-listing"[..], false);
    stream.write_response(&chunk).await.unwrap();

    let sent = stream.into_inner().sent_data().to_vec();
    let first_len = usize::from(u16::from_be_bytes([sent[1], sent[2]]));

    let first = Response::decode(&sent[..first_len], true).unwrap();
    assert_eq!(first, connected);

    let second = Response::decode(&sent[first_len..], false).unwrap();
    assert_eq!(second.code, ResponseCode::Continue);
    assert_eq!(
        second.headers.body_chunk(),
        Some((&b"<MAP-msg-listing"[..], false))
    );
}

#[tokio::test]
async fn test_oversized_packet_rejected() {
    let mut request = Request::new(Opcode::Put);
    request.headers.set_body_chunk(vec![b'x'; 600], true);
    let wire = request.encode().unwrap();

    let mut stream = PacketStream::new(MockStream::new(&wire), 512);
    let err = stream.read_request().await.unwrap_err();
    assert!(err.to_string().contains("exceeds maximum"));
}

#[test]
fn test_response_code_mapping_is_stable() {
    assert_eq!(ResponseCode::PreconditionFailed.as_u8(), 0xCC);
    assert_eq!(ResponseCode::NotAcceptable.as_u8(), 0xC6);
    assert_eq!(ResponseCode::ServiceUnavailable.as_u8(), 0xD3);
}
