//! Integration tests for MAS sessions.
//!
//! Scripted sessions run over a mock stream that replays client packets
//! and captures the server's responses. Interactive exchanges (streamed
//! bodies, abort) use an in-memory duplex pipe with a client on the other
//! end.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::NaiveDate;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use maplink_core::config::PhoneType;
use maplink_core::store::StoredMessage;
use maplink_core::{
    AccountKey, InstanceKind, MemoryProvider, MemoryStore, MessageHandle, MessageType,
    NotificationHub, RequestHandler, ServerConfig, serve_session,
};
use maplink_obex::map::{MAS_TARGET, object_type};
use maplink_obex::packet::{SETPATH_BACKUP, SETPATH_NO_CREATE};
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

/// Splits captured bytes into decoded responses; the first answers CONNECT.
fn responses(mut sent: &[u8]) -> Vec<Response> {
    let mut out = Vec::new();
    while !sent.is_empty() {
        let len = usize::from(u16::from_be_bytes([sent[1], sent[2]]));
        out.push(Response::decode(&sent[..len], out.is_empty()).unwrap());
        sent = &sent[len..];
    }
    out
}

fn sms(id: u64, folder: &str, body: &str) -> StoredMessage {
    StoredMessage {
        id,
        msg_type: MessageType::SmsGsm,
        folder: folder.to_string(),
        datetime: NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        subject: String::new(),
        sender_name: "Bob".into(),
        sender_address: "+15550100".into(),
        recipient_name: String::new(),
        recipient_address: String::new(),
        reply_to: String::new(),
        read: false,
        priority: false,
        sent: false,
        protected: false,
        thread_id: None,
        body: body.to_string(),
        deleted_from: None,
    }
}

fn inbox_store(count: u64) -> Arc<MemoryStore> {
    let messages = (1..=count)
        .map(|id| sms(id, "telecom/msg/inbox", &format!("message number {id}")))
        .collect();
    Arc::new(MemoryStore::with_messages(
        AccountKey::SmsMms,
        messages,
        Vec::new(),
    ))
}

async fn handler(store: Arc<MemoryStore>) -> RequestHandler<MemoryProvider, NotificationHub> {
    RequestHandler::open(
        0,
        InstanceKind::SmsMms {
            phone_type: PhoneType::Gsm,
        },
        &ServerConfig::default(),
        Arc::new(MemoryProvider::new(store)),
        None,
        Arc::new(maplink_core::time::MockClock::new()),
    )
    .await
    .unwrap()
}

fn connect_request(max_packet_size: u16) -> Request {
    let mut request = Request::new(Opcode::Connect);
    request.connect = Some(ConnectFields::new(max_packet_size));
    request.headers.set_target(&MAS_TARGET[..]);
    request.headers.set_who(&b"peer"[..]);
    request
}

fn set_path(name: &str, backup: bool) -> Request {
    let mut request = Request::new(Opcode::SetPath);
    request.setpath_flags = SETPATH_NO_CREATE | if backup { SETPATH_BACKUP } else { 0 };
    request.headers.set_name(name);
    request
}

fn get(mime_type: &str, name: Option<&str>, params: &AppParams) -> Request {
    let mut request = Request::new(Opcode::Get);
    request.headers.set_connection_id(1);
    request.headers.set_mime_type(mime_type);
    if let Some(name) = name {
        request.headers.set_name(name);
    }
    if !params.is_empty() {
        request.headers.set_app_params(params.encode().unwrap());
    }
    request
}

fn push(name: &str, body: &[u8], is_final: bool) -> Request {
    let params = AppParams {
        charset: Some(Charset::Utf8),
        ..AppParams::default()
    };
    let mut request = Request::new(Opcode::Put);
    request.is_final = is_final;
    request.headers.set_connection_id(1);
    request.headers.set_mime_type(object_type::MESSAGE);
    request.headers.set_name(name);
    request.headers.set_app_params(params.encode().unwrap());
    request.headers.set_body_chunk(body.to_vec(), is_final);
    request
}

fn wire(requests: &[Request]) -> Vec<u8> {
    requests
        .iter()
        .flat_map(|r| r.encode().unwrap().to_vec())
        .collect()
}

const EMAIL_BMESSAGE: &[u8] = b"BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:UNREAD\r\nTYPE:EMAIL\r\n\
FOLDER:telecom/msg/outbox\r\nBEGIN:BENV\r\nBEGIN:BBODY\r\nCHARSET:UTF-8\r\nLENGTH:60\r\n\
BEGIN:MSG\r\nSubject: hi\r\n\r\nbody\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n";

fn sms_bmessage(text: &str) -> Vec<u8> {
    format!(
        "BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:READ\r\nTYPE:SMS_GSM\r\n\
         FOLDER:telecom/msg/outbox\r\nBEGIN:BENV\r\nBEGIN:VCARD\r\nVERSION:2.1\r\n\
         TEL:+15550199\r\nEND:VCARD\r\nBEGIN:BBODY\r\nCHARSET:UTF-8\r\nLENGTH:{}\r\n\
         BEGIN:MSG\r\n{text}\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n",
        text.len() + 22
    )
    .into_bytes()
}

#[tokio::test]
async fn test_scripted_browse_session() {
    let store = inbox_store(3);
    let mut handler = handler(Arc::clone(&store)).await;

    let mut raw_listing = get(object_type::FOLDER_LISTING, None, &AppParams::default());
    raw_listing.headers.set_app_params(&[0x01, 0x02, 0x00, 0x0A][..]);
    let wire = wire(&[
        connect_request(0xFFFE),
        set_path("telecom", false),
        set_path("msg", false),
        raw_listing,
        set_path("nowhere", false),
        get(object_type::MESSAGE_LISTING, Some("inbox"), &AppParams::default()),
        set_path("", true),
        Request::new(Opcode::Disconnect),
    ]);

    let mut stream = MockStream::new(&wire);
    serve_session(&mut stream, &mut handler, 0xFFFE)
        .await
        .unwrap();
    assert!(handler.is_closed());

    let responses = responses(&stream.sent);
    assert_eq!(responses.len(), 8);

    let connect = &responses[0];
    assert_eq!(connect.code, ResponseCode::Ok);
    assert_eq!(connect.connect.unwrap().max_packet_size, 0xFFFE);
    assert_eq!(connect.headers.who(), Some(&MAS_TARGET[..]));
    assert_eq!(connect.headers.target(), Some(&b"peer"[..]));
    assert_eq!(connect.headers.connection_id(), Some(1));

    assert_eq!(responses[1].code, ResponseCode::Ok);
    assert_eq!(responses[2].code, ResponseCode::Ok);

    let folders = &responses[3];
    assert_eq!(folders.code, ResponseCode::Ok);
    let params = AppParams::decode(folders.headers.app_params().unwrap()).unwrap();
    assert_eq!(params.folder_listing_size, Some(5));
    let (body, last) = folders.headers.body_chunk().unwrap();
    assert!(last);
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(body.matches("<folder ").count(), 5);

    assert_eq!(responses[4].code, ResponseCode::NotFound);

    let listing = &responses[5];
    assert_eq!(listing.code, ResponseCode::Ok);
    let params = AppParams::decode(listing.headers.app_params().unwrap()).unwrap();
    assert_eq!(params.messages_listing_size, Some(3));
    assert_eq!(params.new_message, Some(true));
    let body = String::from_utf8(listing.headers.body_chunk().unwrap().0.to_vec()).unwrap();
    assert_eq!(body.matches("<msg ").count(), 3);

    assert_eq!(responses[6].code, ResponseCode::Ok);
    assert_eq!(responses[7].code, ResponseCode::Ok);
}

#[tokio::test]
async fn test_requests_before_connect() {
    let mut handler = handler(inbox_store(1)).await;
    let wire = wire(&[
        set_path("telecom", false),
        get(object_type::FOLDER_LISTING, None, &AppParams::default()),
    ]);
    let mut stream = MockStream::new(&wire);
    serve_session(&mut stream, &mut handler, 0xFFFE)
        .await
        .unwrap();

    // No CONNECT, so every packet is an ordinary response.
    let mut sent = stream.sent.as_slice();
    let mut codes = Vec::new();
    while !sent.is_empty() {
        let len = usize::from(u16::from_be_bytes([sent[1], sent[2]]));
        codes.push(Response::decode(&sent[..len], false).unwrap().code);
        sent = &sent[len..];
    }
    assert_eq!(codes, vec![ResponseCode::Forbidden, ResponseCode::Forbidden]);
}

#[tokio::test]
async fn test_email_push_into_sms_outbox_is_rejected() {
    let store = inbox_store(2);
    let mut handler = handler(Arc::clone(&store)).await;
    let wire = wire(&[
        connect_request(1024),
        set_path("telecom", false),
        set_path("msg", false),
        push("outbox", EMAIL_BMESSAGE, true),
        push("outbox", &sms_bmessage("see you at 8"), true),
        Request::new(Opcode::Disconnect),
    ]);
    let mut stream = MockStream::new(&wire);
    serve_session(&mut stream, &mut handler, 0xFFFE)
        .await
        .unwrap();

    let responses = responses(&stream.sent);
    assert_eq!(responses[3].code, ResponseCode::NotAcceptable);
    assert_eq!(responses[4].code, ResponseCode::Ok);
    let handle = MessageHandle::parse(responses[4].headers.name().unwrap()).unwrap();
    assert_eq!(handle.msg_type(), MessageType::SmsGsm);

    assert_eq!(store.len().unwrap(), 3);
    let pushed = store.message(handle.id()).unwrap().unwrap();
    assert_eq!(pushed.body, "see you at 8");
}

/// Client end of a duplex pipe.
struct Client {
    packets: PacketStream<tokio::io::DuplexStream>,
}

impl Client {
    async fn send(&mut self, request: &Request) {
        self.packets.write_request(request).await.unwrap();
    }

    async fn receive(&mut self) -> Response {
        self.packets.read_response(false).await.unwrap()
    }

    async fn connect(&mut self, max_packet_size: u16) -> Response {
        self.send(&connect_request(max_packet_size)).await;
        self.packets.read_response(true).await.unwrap()
    }

    async fn enter(&mut self, path: &[&str]) {
        for name in path {
            self.send(&set_path(name, false)).await;
            assert_eq!(self.receive().await.code, ResponseCode::Ok);
        }
    }
}

fn spawn_session(
    store: Arc<MemoryStore>,
) -> (
    Client,
    tokio::task::JoinHandle<RequestHandler<MemoryProvider, NotificationHub>>,
) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let task = tokio::spawn(async move {
        let mut handler = handler(store).await;
        serve_session(server, &mut handler, 0xFFFE).await.unwrap();
        handler
    });
    (
        Client {
            packets: PacketStream::new(client, 0xFFFE),
        },
        task,
    )
}

#[tokio::test]
async fn test_listing_streams_over_continue_packets() {
    let (mut client, task) = spawn_session(inbox_store(30));
    assert_eq!(client.connect(512).await.code, ResponseCode::Ok);
    client.enter(&["telecom", "msg", "inbox"]).await;

    client
        .send(&get(object_type::MESSAGE_LISTING, None, &AppParams::default()))
        .await;

    let mut body = Vec::new();
    let mut continues = 0;
    loop {
        let response = client.receive().await;
        assert!(response.encode().unwrap().len() <= 512);
        if let Some((chunk, _)) = response.headers.body_chunk() {
            body.extend_from_slice(chunk);
        }
        match response.code {
            ResponseCode::Continue => {
                continues += 1;
                if continues == 1 {
                    let params = AppParams::decode(response.headers.app_params().unwrap()).unwrap();
                    assert_eq!(params.messages_listing_size, Some(30));
                }
                client.send(&Request::new(Opcode::Get)).await;
            }
            ResponseCode::Ok => {
                assert!(response.headers.body_chunk().unwrap().1);
                break;
            }
            other => panic!("unexpected response {other:?}"),
        }
    }
    assert!(continues > 1);
    let body = String::from_utf8(body).unwrap();
    assert!(body.ends_with("</MAP-msg-listing>"));
    assert_eq!(body.matches("<msg ").count(), 30);

    client.send(&Request::new(Opcode::Disconnect)).await;
    assert_eq!(client.receive().await.code, ResponseCode::Ok);
    let handler = task.await.unwrap();
    assert!(handler.is_closed());
}

#[tokio::test]
async fn test_abort_during_streamed_listing() {
    let (mut client, task) = spawn_session(inbox_store(30));
    client.connect(512).await;
    client.enter(&["telecom", "msg", "inbox"]).await;

    client
        .send(&get(object_type::MESSAGE_LISTING, None, &AppParams::default()))
        .await;
    assert_eq!(client.receive().await.code, ResponseCode::Continue);

    client.send(&Request::new(Opcode::Abort)).await;
    assert_eq!(client.receive().await.code, ResponseCode::Ok);

    // The session is still usable after the abort.
    client
        .send(&get(object_type::FOLDER_LISTING, None, &AppParams::default()))
        .await;
    assert_eq!(client.receive().await.code, ResponseCode::Ok);

    client.send(&Request::new(Opcode::Disconnect)).await;
    assert_eq!(client.receive().await.code, ResponseCode::Ok);
    task.await.unwrap();
}

#[tokio::test]
async fn test_push_spanning_several_packets() {
    let store = inbox_store(0);
    let (mut client, task) = spawn_session(Arc::clone(&store));
    client.connect(0xFFFE).await;
    client.enter(&["telecom", "msg"]).await;

    let body = sms_bmessage("split across packets");
    let (head, tail) = body.split_at(body.len() / 2);
    client.send(&push("outbox", head, false)).await;
    assert_eq!(client.receive().await.code, ResponseCode::Continue);

    let mut rest = Request::new(Opcode::Put);
    rest.headers.set_body_chunk(tail.to_vec(), true);
    client.send(&rest).await;
    let response = client.receive().await;
    assert_eq!(response.code, ResponseCode::Ok);
    let handle = MessageHandle::parse(response.headers.name().unwrap()).unwrap();

    drop(client);
    let handler = task.await.unwrap();
    assert!(handler.is_closed());
    let stored = store.message(handle.id()).unwrap().unwrap();
    assert_eq!(stored.body, "split across packets");
    assert_eq!(stored.folder, "telecom/msg/sent");
}
