//! OBEX packet loop of a MAS session.
//!
//! Reads request packets, assembles multi-packet GET and PUT requests and
//! drives a [`RequestHandler`]. Response bodies are split over CONTINUE
//! packets sized to the peer's maximum packet size.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use maplink_obex::connection::MIN_PACKET_SIZE;
use maplink_obex::packet::SETPATH_BACKUP;
use maplink_obex::{
    ConnectFields, HeaderId, HeaderSet, Opcode, PacketStream, Request, Response, ResponseCode,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::handler::RequestHandler;
use super::operation::Operation;
use crate::error::{Error, Result};
use crate::mas::NotificationClient;
use crate::store::StoreProvider;

/// Response packet prefix plus the body header prefix.
const BODY_OVERHEAD: usize = 6;

/// Serves one MAS session until the peer disconnects or closes the stream.
///
/// The handler's store client is released when the session ends, however
/// it ends.
///
/// # Errors
///
/// Returns an error if the transport fails or the peer sends a packet that
/// cannot be decoded.
pub async fn serve_session<S, P, N>(
    stream: S,
    handler: &mut RequestHandler<P, N>,
    max_packet_size: u16,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: StoreProvider,
    N: NotificationClient,
{
    let max_packet_size = max_packet_size.max(MIN_PACKET_SIZE);
    let mut packets = PacketStream::new(stream, max_packet_size);
    let result = run(&mut packets, handler, max_packet_size).await;
    handler.handle_close().await;
    result
}

async fn run<S, P, N>(
    packets: &mut PacketStream<S>,
    handler: &mut RequestHandler<P, N>,
    max_packet_size: u16,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: StoreProvider,
    N: NotificationClient,
{
    let mut peer_max = usize::from(MIN_PACKET_SIZE);
    while let Some(request) = packets.read_request().await? {
        match request.opcode {
            Opcode::Connect => {
                let mut response = Response::new(ResponseCode::Ok);
                response.code = handler.handle_connect(&request.headers, &mut response.headers);
                response.connect = Some(ConnectFields::new(max_packet_size));
                if let Some(fields) = request.connect {
                    let negotiated = fields.max_packet_size.clamp(MIN_PACKET_SIZE, max_packet_size);
                    peer_max = usize::from(negotiated);
                    debug!(max_packet_size = negotiated, "packet size negotiated");
                }
                packets.write_response(&response).await?;
            }
            Opcode::Disconnect => {
                let code = handler.handle_disconnect();
                packets.write_response(&Response::new(code)).await?;
                if code == ResponseCode::Ok {
                    break;
                }
            }
            Opcode::SetPath => {
                let backup = request.setpath_flags & SETPATH_BACKUP != 0;
                let code = handler.handle_set_path(&request.headers, backup);
                packets.write_response(&Response::new(code)).await?;
            }
            Opcode::Abort => {
                let code = handler.handle_abort();
                packets.write_response(&Response::new(code)).await?;
            }
            Opcode::Get => serve_get(packets, handler, request, peer_max).await?,
            Opcode::Put => serve_put(packets, handler, request, peer_max).await?,
            Opcode::Unknown(opcode) => {
                warn!(opcode, "unsupported OBEX opcode");
                packets
                    .write_response(&Response::new(ResponseCode::NotImplemented))
                    .await?;
            }
        }
    }
    info!(mas_id = handler.mas_id(), "session ended");
    Ok(())
}

/// What happened while collecting the packets of one request.
enum Assembled {
    Complete(HeaderSet, Vec<u8>),
    Aborted,
    Closed,
}

/// Collects the headers and body of a request spread over several packets.
async fn assemble<S, P, N>(
    packets: &mut PacketStream<S>,
    handler: &RequestHandler<P, N>,
    first: Request,
) -> Result<Assembled>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: StoreProvider,
    N: NotificationClient,
{
    let opcode = first.opcode;
    let mut headers = HeaderSet::new();
    let mut body = Vec::new();
    let mut request = first;
    loop {
        for (id, value) in request.headers.iter() {
            if *id == HeaderId::BODY || *id == HeaderId::END_OF_BODY {
                continue;
            }
            headers.set(*id, value.clone())?;
        }
        if let Some((chunk, _)) = request.headers.body_chunk() {
            body.extend_from_slice(chunk);
        }
        if request.is_final {
            return Ok(Assembled::Complete(headers, body));
        }

        packets
            .write_response(&Response::new(ResponseCode::Continue))
            .await?;
        let Some(next) = packets.read_request().await? else {
            return Ok(Assembled::Closed);
        };
        match next.opcode {
            Opcode::Abort => {
                let code = handler.handle_abort();
                packets.write_response(&Response::new(code)).await?;
                return Ok(Assembled::Aborted);
            }
            op if op == opcode => request = next,
            other => {
                warn!(?other, ?opcode, "unexpected packet inside request");
                packets
                    .write_response(&Response::new(ResponseCode::BadRequest))
                    .await?;
                return Ok(Assembled::Aborted);
            }
        }
    }
}

async fn serve_get<S, P, N>(
    packets: &mut PacketStream<S>,
    handler: &mut RequestHandler<P, N>,
    first: Request,
    peer_max: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: StoreProvider,
    N: NotificationClient,
{
    let Assembled::Complete(headers, body) = assemble(packets, handler, first).await? else {
        return Ok(());
    };
    let mut op = PacketOperation::new(packets, headers, body, peer_max, handler.abort_flag());
    let code = handler.handle_get(&mut op).await;
    op.finish(code).await
}

async fn serve_put<S, P, N>(
    packets: &mut PacketStream<S>,
    handler: &mut RequestHandler<P, N>,
    first: Request,
    peer_max: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: StoreProvider,
    N: NotificationClient,
{
    let Assembled::Complete(headers, body) = assemble(packets, handler, first).await? else {
        return Ok(());
    };
    let mut op = PacketOperation::new(packets, headers, body, peer_max, handler.abort_flag());
    let code = handler.handle_put(&mut op).await;
    op.finish(code).await
}

/// An [`Operation`] backed by the session's packet stream.
///
/// A written chunk is held back until the next one arrives, so the last
/// chunk can travel in the final response as END_OF_BODY.
struct PacketOperation<'a, S> {
    packets: &'a mut PacketStream<S>,
    headers: HeaderSet,
    body: Vec<u8>,
    peer_max: usize,
    response_headers: Option<HeaderSet>,
    pending: Option<Vec<u8>>,
    abort: Arc<AtomicBool>,
    aborted: bool,
    closed: bool,
}

impl<'a, S> PacketOperation<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn new(
        packets: &'a mut PacketStream<S>,
        headers: HeaderSet,
        body: Vec<u8>,
        peer_max: usize,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            packets,
            headers,
            body,
            peer_max,
            response_headers: None,
            pending: None,
            abort,
            aborted: false,
            closed: false,
        }
    }

    async fn flush(&mut self, chunk: Vec<u8>) -> Result<()> {
        let mut response = Response::new(ResponseCode::Continue);
        if let Some(headers) = self.response_headers.take() {
            response.headers = headers;
        }
        response.headers.set_body_chunk(chunk, false);
        self.packets.write_response(&response).await?;

        match self.packets.read_request().await? {
            Some(request) if request.opcode == Opcode::Get => Ok(()),
            Some(request) if request.opcode == Opcode::Abort => {
                self.abort.store(true, Ordering::SeqCst);
                self.aborted = true;
                Ok(())
            }
            Some(request) => Err(Error::Obex(maplink_obex::Error::Protocol(format!(
                "{:?} while sending a response body",
                request.opcode
            )))),
            None => {
                self.closed = true;
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed during response body",
                )))
            }
        }
    }

    /// Sends the final response of the operation.
    async fn finish(mut self, code: ResponseCode) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.aborted {
            // Answers the ABORT request read while streaming.
            return self
                .packets
                .write_response(&Response::new(ResponseCode::Ok))
                .await
                .map_err(Error::from);
        }
        let mut response = Response::new(code);
        if let Some(headers) = self.response_headers.take() {
            response.headers = headers;
        }
        if code == ResponseCode::Ok {
            if let Some(chunk) = self.pending.take() {
                response.headers.set_body_chunk(chunk, true);
            }
        }
        self.packets.write_response(&response).await?;
        Ok(())
    }
}

impl<S> Operation for PacketOperation<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn request_headers(&self) -> &HeaderSet {
        &self.headers
    }

    fn request_body(&self) -> &[u8] {
        &self.body
    }

    fn max_body_chunk(&self) -> usize {
        let headers = self
            .response_headers
            .as_ref()
            .map_or(0, HeaderSet::encoded_len);
        self.peer_max
            .saturating_sub(BODY_OVERHEAD + headers)
            .max(1)
    }

    fn set_response_headers(&mut self, headers: HeaderSet) {
        self.response_headers = Some(headers);
    }

    async fn write_body(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(previous) = self.pending.replace(chunk.to_vec()) {
            self.flush(previous).await?;
        }
        Ok(())
    }
}
