//! MAP request handling for one MAS session.
//!
//! The handler owns the session state (connection, current folder, store
//! client) and turns OBEX requests into store calls. Every failure is
//! mapped to a response code; nothing here tears the session down.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use maplink_obex::map::{FEATURE_MESSAGES_LISTING_V11, MAS_TARGET, object_type};
use maplink_obex::{
    AppParams, Charset, ConnectedState, FractionDeliver, FractionRequest, HeaderSet,
    ResponseCode, SessionState, StatusIndicator,
};
use tracing::{debug, info, warn};

use super::operation::Operation;
use crate::bmessage::{BMessage, BMessageBody};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::folder::{FolderId, FolderTree};
use crate::listing::{DEFAULT_MAX_LIST_COUNT, ListingOptions, MessageFilter, MessageListing};
use crate::mas::{InstanceKind, NotificationClient};
use crate::store::{FetchOptions, MessageStore, PushOptions, StoreProvider};
use crate::time::Clock;
use crate::types::{MessageHandle, MessageType};

/// Folders a message may be pushed into.
const PUSH_FOLDERS: [&str; 3] = ["outbox", "draft", "drafts"];

/// Serves the requests of one MAS session.
pub struct RequestHandler<P: StoreProvider, N: NotificationClient> {
    mas_id: u8,
    kind: InstanceKind,
    provider: Arc<P>,
    store: Option<Arc<P::Store>>,
    notifier: Option<Arc<N>>,
    clock: Arc<dyn Clock>,
    tree: FolderTree,
    cursor: FolderId,
    state: SessionState,
    abort: Arc<AtomicBool>,
    next_connection_id: u32,
    provider_timeout: Duration,
    fraction_threshold: usize,
    notifications_on: bool,
    closed: bool,
}

impl<P: StoreProvider, N: NotificationClient> RequestHandler<P, N> {
    /// Opens a session: acquires a store client and builds the folder tree
    /// of the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be acquired or the email folder
    /// tree cannot be read in time.
    pub async fn open(
        mas_id: u8,
        kind: InstanceKind,
        config: &ServerConfig,
        provider: Arc<P>,
        notifier: Option<Arc<N>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = provider.acquire()?;
        let tree = match &kind {
            InstanceKind::SmsMms { .. } => FolderTree::for_sms_mms(),
            InstanceKind::Email { .. } => tokio::time::timeout(
                config.provider_timeout,
                FolderTree::for_email(store.as_ref(), config.max_folder_depth),
            )
            .await
            .map_err(|_| Error::Timeout(config.provider_timeout))??,
        };
        let cursor = tree.root();
        info!(mas_id, "session opened");
        Ok(Self {
            mas_id,
            kind,
            provider,
            store: Some(store),
            notifier,
            clock,
            tree,
            cursor,
            state: SessionState::Disconnected,
            abort: Arc::new(AtomicBool::new(false)),
            next_connection_id: 1,
            provider_timeout: config.provider_timeout,
            fraction_threshold: config.fraction_threshold,
            notifications_on: false,
            closed: false,
        })
    }

    /// Instance id.
    #[must_use]
    pub const fn mas_id(&self) -> u8 {
        self.mas_id
    }

    /// Connection state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Folder tree of the session.
    #[must_use]
    pub const fn tree(&self) -> &FolderTree {
        &self.tree
    }

    /// Path of the current folder; empty at the root.
    #[must_use]
    pub fn current_folder(&self) -> String {
        self.tree.full_path(self.cursor)
    }

    /// Flag raised when the peer aborts the running operation.
    #[must_use]
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Whether the store client has been released.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Handles CONNECT.
    pub fn handle_connect(
        &mut self,
        request: &HeaderSet,
        response: &mut HeaderSet,
    ) -> ResponseCode {
        if request.target() != Some(&MAS_TARGET[..]) {
            warn!(mas_id = self.mas_id, "CONNECT with foreign target");
            return ResponseCode::NotAcceptable;
        }
        let params = match decode_params(request) {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "bad CONNECT parameters");
                return ResponseCode::BadRequest;
            }
        };
        let connection_id = self.next_connection_id;
        self.next_connection_id = self.next_connection_id.wrapping_add(1).max(1);
        let peer_features = params.map_supported_features.unwrap_or(0);

        response.set_who(&MAS_TARGET[..]);
        if let Some(who) = request.who() {
            response.set_target(bytes::Bytes::copy_from_slice(who));
        }
        response.set_connection_id(connection_id);

        self.state = SessionState::Connected(ConnectedState {
            connection_id,
            peer_who: request.who().map(bytes::Bytes::copy_from_slice),
            peer_features,
        });
        self.cursor = self.tree.root();
        info!(mas_id = self.mas_id, connection_id, peer_features, "peer connected");
        ResponseCode::Ok
    }

    /// Handles DISCONNECT.
    pub fn handle_disconnect(&mut self) -> ResponseCode {
        if !self.state.is_connected() {
            return ResponseCode::Forbidden;
        }
        self.state = SessionState::Disconnected;
        self.cursor = self.tree.root();
        info!(mas_id = self.mas_id, "peer disconnected");
        ResponseCode::Ok
    }

    /// Handles SETPATH. The current folder only changes on success.
    pub fn handle_set_path(&mut self, request: &HeaderSet, backup: bool) -> ResponseCode {
        if !self.state.is_connected() {
            return ResponseCode::Forbidden;
        }
        let name = request.name().filter(|n| !n.is_empty());
        let target = if backup {
            let Some(parent) = self.tree.parent(self.cursor) else {
                debug!("SETPATH up from the root");
                return ResponseCode::BadRequest;
            };
            match name {
                Some(name) => self.tree.child(parent, name),
                None => Some(parent),
            }
        } else {
            match name {
                Some(name) => self.tree.child(self.cursor, name),
                None => Some(self.tree.root()),
            }
        };
        let Some(target) = target else {
            debug!(name = ?name, from = %self.current_folder(), "SETPATH to unknown folder");
            return ResponseCode::NotFound;
        };
        self.cursor = target;
        debug!(path = %self.current_folder(), "folder changed");
        ResponseCode::Ok
    }

    /// Handles ABORT of the running operation.
    pub fn handle_abort(&self) -> ResponseCode {
        self.abort.store(true, Ordering::SeqCst);
        info!(mas_id = self.mas_id, "operation aborted by peer");
        ResponseCode::Ok
    }

    /// Releases the store client and turns off any notification
    /// registration the session made. Further calls do nothing.
    pub async fn handle_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.store = None;
        self.state = SessionState::Disconnected;
        if std::mem::take(&mut self.notifications_on) {
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.set_registration(self.mas_id, false).await {
                    warn!(
                        mas_id = self.mas_id,
                        error = %e,
                        "could not clear notification registration"
                    );
                }
            }
        }
        info!(mas_id = self.mas_id, "session closed, store released");
    }

    /// Handles a GET.
    pub async fn handle_get<O: Operation>(&mut self, op: &mut O) -> ResponseCode {
        if !self.state.is_connected() {
            return ResponseCode::Forbidden;
        }
        self.abort.store(false, Ordering::SeqCst);
        let result = self.dispatch_get(op).await;
        self.finish("GET", result)
    }

    /// Handles a PUT.
    pub async fn handle_put<O: Operation>(&mut self, op: &mut O) -> ResponseCode {
        if !self.state.is_connected() {
            return ResponseCode::Forbidden;
        }
        self.abort.store(false, Ordering::SeqCst);
        let result = self.dispatch_put(op).await;
        self.finish("PUT", result)
    }

    fn finish(&self, operation: &str, result: Result<ResponseCode>) -> ResponseCode {
        match result {
            Ok(code) => code,
            Err(e) => {
                let code = e.response_code();
                warn!(mas_id = self.mas_id, operation, error = %e, code = ?code, "request failed");
                code
            }
        }
    }

    async fn dispatch_get<O: Operation>(&mut self, op: &mut O) -> Result<ResponseCode> {
        let headers = op.request_headers();
        let mime_type = headers
            .mime_type()
            .map(str::to_string)
            .ok_or_else(|| Error::Format("GET without TYPE".into()))?;
        let params = decode_params(headers)?;
        let name = headers.name().map(str::to_string);
        debug!(mas_id = self.mas_id, mime_type, name = ?name, "GET");

        match mime_type.as_str() {
            object_type::FOLDER_LISTING => {
                self.get_folder_listing(op, name.as_deref(), &params).await
            }
            object_type::MESSAGE_LISTING => {
                self.get_message_listing(op, name.as_deref(), &params).await
            }
            object_type::MESSAGE => self.get_message(op, name.as_deref(), &params).await,
            other => Err(Error::Forbidden(format!("GET of {other}"))),
        }
    }

    async fn dispatch_put<O: Operation>(&mut self, op: &mut O) -> Result<ResponseCode> {
        let headers = op.request_headers();
        let mime_type = headers
            .mime_type()
            .map(str::to_string)
            .ok_or_else(|| Error::Format("PUT without TYPE".into()))?;
        let params = decode_params(headers)?;
        let name = headers.name().map(str::to_string);
        debug!(mas_id = self.mas_id, mime_type, name = ?name, "PUT");

        match mime_type.as_str() {
            object_type::MESSAGE_UPDATE => self.update_inbox().await,
            object_type::NOTIFICATION_REGISTRATION => self.register_notifications(&params).await,
            object_type::MESSAGE_STATUS => self.set_message_status(name.as_deref(), &params).await,
            object_type::MESSAGE => self.push_message(op, name.as_deref(), &params).await,
            other => Err(Error::Forbidden(format!("PUT of {other}"))),
        }
    }

    async fn get_folder_listing<O: Operation>(
        &mut self,
        op: &mut O,
        name: Option<&str>,
        params: &AppParams,
    ) -> Result<ResponseCode> {
        let folder = match name.filter(|n| !n.is_empty()) {
            Some(name) => self
                .tree
                .child(self.cursor, name)
                .ok_or_else(|| Error::NotFound(format!("folder {name}")))?,
            None => self.cursor,
        };
        let max_count = params.max_list_count.unwrap_or(DEFAULT_MAX_LIST_COUNT);
        let offset = usize::from(params.start_offset.unwrap_or(0));
        let size = self.tree.child_count(folder);
        if offset > size {
            return Err(Error::Range(format!("offset {offset} beyond {size} folders")));
        }

        let response = AppParams {
            folder_listing_size: Some(saturating_u16(size)),
            ..AppParams::default()
        };
        op.set_response_headers(params_header(&response)?);
        if max_count == 0 {
            return Ok(ResponseCode::Ok);
        }
        let body = self
            .tree
            .encode_listing(folder, offset, usize::from(max_count))?;
        self.send_body(op, &body).await
    }

    async fn get_message_listing<O: Operation>(
        &mut self,
        op: &mut O,
        name: Option<&str>,
        params: &AppParams,
    ) -> Result<ResponseCode> {
        let folder = match name.filter(|n| !n.is_empty()) {
            Some(name) => self
                .tree
                .child(self.cursor, name)
                .ok_or_else(|| Error::Format(format!("no folder {name} to list")))?,
            None => self.cursor,
        };
        let filter = MessageFilter::from_params(params)?;
        let include_thread_id = self.state.peer_features() & FEATURE_MESSAGES_LISTING_V11 != 0;
        let options = ListingOptions::from_params(params, include_thread_id);
        let max_count = options.max_list_count;
        let folder_ref = self.tree.folder_ref(folder);

        let entries = self
            .call(move |store| async move { store.list_messages(&folder_ref, &filter).await })
            .await?;
        let listing = MessageListing::build(entries, options);
        debug!(total = listing.total(), window = listing.entries().len(), "message listing");

        let response = AppParams {
            messages_listing_size: Some(saturating_u16(listing.total())),
            new_message: Some(listing.has_unread()),
            mse_time: Some(self.clock.now()),
            ..AppParams::default()
        };
        op.set_response_headers(params_header(&response)?);
        if max_count == 0 {
            return Ok(ResponseCode::Ok);
        }
        let body = listing.encode()?;
        self.send_body(op, &body).await
    }

    async fn get_message<O: Operation>(
        &mut self,
        op: &mut O,
        name: Option<&str>,
        params: &AppParams,
    ) -> Result<ResponseCode> {
        let name = name.ok_or_else(|| Error::Format("GET message without NAME".into()))?;
        let handle = MessageHandle::parse(name)?;
        let charset = params
            .charset
            .ok_or_else(|| Error::Precondition("charset".into()))?;
        if charset == Charset::Native && !handle.msg_type().is_sms() {
            return Err(Error::Format(format!(
                "native charset for {} message",
                handle.msg_type()
            )));
        }
        let options = FetchOptions {
            charset,
            attachments: params.attachment != Some(false),
        };

        let mut message = self
            .call(move |store| async move { store.get_message(handle, options).await })
            .await?;
        if !options.attachments {
            if let BMessageBody::Mime(mime) = &mut message.body {
                mime.retain_text_parts();
            }
        }

        let response = AppParams {
            fraction_deliver: params
                .fraction_request
                .map(|request| self.fraction(&mut message, request)),
            ..AppParams::default()
        };
        if !response.is_empty() {
            op.set_response_headers(params_header(&response)?);
        }
        let body = message.encode();
        self.send_body(op, &body).await
    }

    /// Cuts an SMS body down to the requested fraction.
    fn fraction(&self, message: &mut BMessage, request: FractionRequest) -> FractionDeliver {
        let BMessageBody::Sms(sms) = &mut message.body else {
            return FractionDeliver::Last;
        };
        let text = sms.text();
        if text.len() <= self.fraction_threshold {
            return FractionDeliver::Last;
        }
        let mut split = self.fraction_threshold;
        while !text.is_char_boundary(split) {
            split -= 1;
        }
        match request {
            FractionRequest::First => {
                sms.fragments = vec![text[..split].to_string()];
                FractionDeliver::More
            }
            FractionRequest::Next => {
                sms.fragments = vec![text[split..].to_string()];
                FractionDeliver::Last
            }
        }
    }

    async fn update_inbox(&mut self) -> Result<ResponseCode> {
        if !matches!(self.kind, InstanceKind::Email { .. }) {
            return Err(Error::Unsupported("inbox update of SMS/MMS instance".into()));
        }
        self.call(|store| async move { store.update_inbox().await })
            .await?;
        Ok(ResponseCode::Ok)
    }

    async fn register_notifications(&mut self, params: &AppParams) -> Result<ResponseCode> {
        let enabled = params
            .notification_status
            .ok_or_else(|| Error::Precondition("notification status".into()))?;
        let notifier = self
            .notifier
            .as_ref()
            .ok_or_else(|| Error::RemoteUnavailable("no notification client".into()))?;
        notifier.set_registration(self.mas_id, enabled).await?;
        self.notifications_on = enabled;
        Ok(ResponseCode::Ok)
    }

    async fn set_message_status(
        &mut self,
        name: Option<&str>,
        params: &AppParams,
    ) -> Result<ResponseCode> {
        let indicator = params
            .status_indicator
            .ok_or_else(|| Error::Precondition("status indicator".into()))?;
        let value = params
            .status_value
            .ok_or_else(|| Error::Precondition("status value".into()))?;
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Precondition("message handle".into()))?;
        let handle =
            MessageHandle::parse(name).map_err(|e| Error::Precondition(e.to_string()))?;

        let changed = match indicator {
            StatusIndicator::DeletedStatus => {
                self.call(move |store| async move { store.set_deleted(handle, value).await })
                    .await?
            }
            StatusIndicator::ReadStatus => {
                self.call(move |store| async move { store.set_read(handle, value).await })
                    .await?
            }
        };
        if changed {
            Ok(ResponseCode::Ok)
        } else {
            warn!(%handle, ?indicator, value, "message status not changed");
            Ok(ResponseCode::ServiceUnavailable)
        }
    }

    async fn push_message<O: Operation>(
        &mut self,
        op: &mut O,
        name: Option<&str>,
        params: &AppParams,
    ) -> Result<ResponseCode> {
        let charset = params
            .charset
            .ok_or_else(|| Error::Precondition("charset".into()))?;
        let folder = match name.filter(|n| !n.is_empty()) {
            Some(name) => self
                .tree
                .child(self.cursor, name)
                .ok_or_else(|| Error::Forbidden(format!("push into unknown folder {name}")))?,
            None => self.cursor,
        };
        let folder_name = self.tree.name(folder).to_ascii_lowercase();
        if !PUSH_FOLDERS.contains(&folder_name.as_str()) {
            return Err(Error::Forbidden(format!("push into {folder_name}")));
        }

        let message = BMessage::parse(op.request_body(), charset)
            .map_err(|e| Error::Precondition(format!("invalid bMessage: {e}")))?;
        let folder_ref = self.tree.folder_ref(folder);
        let msg_type = message.msg_type;
        match msg_type {
            MessageType::Email if folder_ref.email_folder_id.is_none() => {
                return Err(Error::Forbidden(format!(
                    "email push into {}",
                    folder_ref.path
                )));
            }
            MessageType::Email => {}
            _ if !folder_ref.has_sms_mms => {
                return Err(Error::Forbidden(format!(
                    "{msg_type} push into {}",
                    folder_ref.path
                )));
            }
            _ => {}
        }

        let options = PushOptions {
            transparent: params.transparent.unwrap_or(false),
            retry: params.retry.unwrap_or(true),
        };
        let id = self
            .call(move |store| async move {
                store.push_message(&folder_ref, &message, options).await
            })
            .await?;
        let handle = MessageHandle::new(id, msg_type)?;
        info!(%handle, folder = %self.tree.full_path(folder), "message pushed");

        let mut headers = HeaderSet::new();
        headers.set_name(handle.to_string());
        op.set_response_headers(headers);
        Ok(ResponseCode::Ok)
    }

    /// Sends a body in transport-sized chunks, stopping early on abort.
    async fn send_body<O: Operation>(&self, op: &mut O, body: &[u8]) -> Result<ResponseCode> {
        let chunk_size = op.max_body_chunk().max(1);
        let mut sent = 0;
        while sent < body.len() && !self.abort.load(Ordering::SeqCst) {
            let end = (sent + chunk_size).min(body.len());
            if let Err(e) = op.write_body(&body[sent..end]).await {
                if self.abort.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, sent, total = body.len(), "body transfer failed");
                return Ok(ResponseCode::BadRequest);
            }
            sent = end;
        }
        if sent < body.len() {
            info!(sent, total = body.len(), "body transfer aborted");
        }
        Ok(ResponseCode::Ok)
    }

    /// Runs one store call under the provider timeout.
    ///
    /// The store client is dropped after a timeout or an unreachable store
    /// and acquired again on the next call.
    async fn call<T, F, Fut>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<P::Store>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let store = self.acquire_store()?;
        match tokio::time::timeout(self.provider_timeout, f(store)).await {
            Ok(Err(e @ Error::RemoteUnavailable(_))) => {
                self.store = None;
                Err(e)
            }
            Ok(result) => result,
            Err(_) => {
                warn!(
                    mas_id = self.mas_id,
                    timeout = ?self.provider_timeout,
                    "store call timed out"
                );
                self.store = None;
                Err(Error::Timeout(self.provider_timeout))
            }
        }
    }

    fn acquire_store(&mut self) -> Result<Arc<P::Store>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }
        if self.closed {
            return Err(Error::RemoteUnavailable("session closed".into()));
        }
        let store = self.provider.acquire()?;
        info!(mas_id = self.mas_id, "store client re-acquired");
        self.store = Some(Arc::clone(&store));
        Ok(store)
    }
}

fn decode_params(headers: &HeaderSet) -> Result<AppParams> {
    Ok(headers
        .app_params()
        .map(AppParams::decode)
        .transpose()?
        .unwrap_or_default())
}

fn params_header(params: &AppParams) -> Result<HeaderSet> {
    let mut headers = HeaderSet::new();
    headers.set_app_params(params.encode()?);
    Ok(headers)
}

fn saturating_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
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
    use crate::config::PhoneType;
    use crate::mas::{AccountKey, NotificationHub};
    use crate::server::BufferedOperation;
    use crate::store::{EmailFolder, MemoryProvider, MemoryStore, StoredMessage};
    use crate::time::MockClock;
    use chrono::NaiveDate;
    use maplink_obex::{MessageTypeFilter, ReadStatusFilter};

    type Handler = RequestHandler<MemoryProvider, NotificationHub>;

    fn stored(id: u64, msg_type: MessageType, folder: &str, body: &str) -> StoredMessage {
        StoredMessage {
            id,
            msg_type,
            folder: folder.to_string(),
            datetime: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            subject: String::new(),
            sender_name: "Alice".into(),
            sender_address: "+15550001".into(),
            recipient_name: String::new(),
            recipient_address: String::new(),
            reply_to: String::new(),
            read: id % 2 == 0,
            priority: false,
            sent: false,
            protected: false,
            thread_id: Some(7),
            body: body.to_string(),
            deleted_from: None,
        }
    }

    fn sms_handle(id: u64) -> String {
        MessageHandle::new(id, MessageType::SmsGsm).unwrap().to_string()
    }

    const MMS_BODY: &str = "Content-Type: text/plain\r\n\r\npicture\r\n";

    fn sms_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_messages(
            AccountKey::SmsMms,
            vec![
                stored(1, MessageType::SmsGsm, "telecom/msg/inbox", "first"),
                stored(2, MessageType::SmsGsm, "telecom/msg/inbox", "second"),
                stored(3, MessageType::Mms, "telecom/msg/inbox", MMS_BODY),
                stored(4, MessageType::SmsGsm, "telecom/msg/sent", "third"),
            ],
            Vec::new(),
        ))
    }

    fn config() -> ServerConfig {
        ServerConfig::builder()
            .provider_timeout(Duration::from_millis(100))
            .fraction_threshold(8)
            .build()
    }

    async fn open(store: Arc<MemoryStore>, notifier: Option<Arc<NotificationHub>>) -> Handler {
        RequestHandler::open(
            0,
            InstanceKind::SmsMms {
                phone_type: PhoneType::Gsm,
            },
            &config(),
            Arc::new(MemoryProvider::new(store)),
            notifier,
            MockClock::shared(),
        )
        .await
        .unwrap()
    }

    fn connect_headers(features: Option<u32>) -> HeaderSet {
        let mut headers = HeaderSet::new();
        headers.set_target(&MAS_TARGET[..]);
        headers.set_who(&b"client"[..]);
        if let Some(features) = features {
            let params = AppParams {
                map_supported_features: Some(features),
                ..AppParams::default()
            };
            headers.set_app_params(params.encode().unwrap());
        }
        headers
    }

    async fn connected(store: Arc<MemoryStore>) -> Handler {
        let mut handler = open(store, None).await;
        let mut response = HeaderSet::new();
        assert_eq!(
            handler.handle_connect(&connect_headers(None), &mut response),
            ResponseCode::Ok
        );
        handler
    }

    fn enter(handler: &mut Handler, path: &[&str]) {
        for name in path {
            let mut headers = HeaderSet::new();
            headers.set_name(*name);
            assert_eq!(handler.handle_set_path(&headers, false), ResponseCode::Ok);
        }
    }

    fn request(mime_type: &str, name: Option<&str>, params: &AppParams) -> HeaderSet {
        let mut headers = HeaderSet::new();
        headers.set_mime_type(mime_type);
        if let Some(name) = name {
            headers.set_name(name);
        }
        if !params.is_empty() {
            headers.set_app_params(params.encode().unwrap());
        }
        headers
    }

    fn response_params(op: &BufferedOperation) -> AppParams {
        AppParams::decode(op.response_headers().app_params().unwrap()).unwrap()
    }

    fn utf8() -> AppParams {
        AppParams {
            charset: Some(Charset::Utf8),
            ..AppParams::default()
        }
    }

    #[tokio::test]
    async fn test_requests_before_connect_are_forbidden() {
        let mut handler = open(sms_store(), None).await;
        let mut op = BufferedOperation::new(request(
            object_type::FOLDER_LISTING,
            None,
            &AppParams::default(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Forbidden);
        assert_eq!(
            handler.handle_set_path(&HeaderSet::new(), false),
            ResponseCode::Forbidden
        );
        assert_eq!(handler.handle_disconnect(), ResponseCode::Forbidden);
    }

    #[tokio::test]
    async fn test_connect() {
        let mut handler = open(sms_store(), None).await;

        let mut wrong = HeaderSet::new();
        wrong.set_target(&b"not-map"[..]);
        let mut response = HeaderSet::new();
        assert_eq!(
            handler.handle_connect(&wrong, &mut response),
            ResponseCode::NotAcceptable
        );
        assert!(!handler.state().is_connected());

        let mut response = HeaderSet::new();
        let code = handler.handle_connect(
            &connect_headers(Some(FEATURE_MESSAGES_LISTING_V11)),
            &mut response,
        );
        assert_eq!(code, ResponseCode::Ok);
        assert_eq!(response.who(), Some(&MAS_TARGET[..]));
        assert_eq!(response.target(), Some(&b"client"[..]));
        assert_eq!(response.connection_id(), Some(1));
        assert_eq!(handler.state().connection_id(), Some(1));
        assert_eq!(handler.state().peer_features(), FEATURE_MESSAGES_LISTING_V11);
    }

    #[tokio::test]
    async fn test_set_path_navigation() {
        let mut handler = connected(sms_store()).await;

        let backup = HeaderSet::new();
        assert_eq!(handler.handle_set_path(&backup, true), ResponseCode::BadRequest);

        enter(&mut handler, &["telecom", "MSG", "inbox"]);
        assert_eq!(handler.current_folder(), "telecom/msg/inbox");

        let mut missing = HeaderSet::new();
        missing.set_name("nowhere");
        assert_eq!(handler.handle_set_path(&missing, false), ResponseCode::NotFound);
        assert_eq!(handler.current_folder(), "telecom/msg/inbox");

        let mut sibling = HeaderSet::new();
        sibling.set_name("sent");
        assert_eq!(handler.handle_set_path(&sibling, true), ResponseCode::Ok);
        assert_eq!(handler.current_folder(), "telecom/msg/sent");

        assert_eq!(handler.handle_set_path(&backup, true), ResponseCode::Ok);
        assert_eq!(handler.current_folder(), "telecom/msg");

        assert_eq!(handler.handle_set_path(&backup, false), ResponseCode::Ok);
        assert_eq!(handler.current_folder(), "");
    }

    #[tokio::test]
    async fn test_folder_listing() {
        let mut handler = connected(sms_store()).await;
        enter(&mut handler, &["telecom"]);

        let params = AppParams {
            max_list_count: Some(10),
            ..AppParams::default()
        };
        let mut op =
            BufferedOperation::new(request(object_type::FOLDER_LISTING, Some("msg"), &params));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(response_params(&op).folder_listing_size, Some(5));
        let body = String::from_utf8(op.written().to_vec()).unwrap();
        assert!(body.contains("<folder name=\"inbox\" />"));
        assert!(body.contains("<folder name=\"draft\" />"));

        let size_only = AppParams {
            max_list_count: Some(0),
            ..AppParams::default()
        };
        let mut op =
            BufferedOperation::new(request(object_type::FOLDER_LISTING, Some("msg"), &size_only));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(response_params(&op).folder_listing_size, Some(5));
        assert!(op.written().is_empty());

        let mut op = BufferedOperation::new(request(
            object_type::FOLDER_LISTING,
            Some("nothing"),
            &params,
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::NotFound);

        let beyond = AppParams {
            start_offset: Some(9),
            ..AppParams::default()
        };
        let mut op = BufferedOperation::new(request(object_type::FOLDER_LISTING, None, &beyond));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);
    }

    #[tokio::test]
    async fn test_message_listing() {
        let mut handler = connected(sms_store()).await;
        enter(&mut handler, &["telecom", "msg"]);

        let params = AppParams {
            max_list_count: Some(1),
            filter_message_type: Some(MessageTypeFilter::new(MessageTypeFilter::MMS).unwrap()),
            ..AppParams::default()
        };
        let mut op =
            BufferedOperation::new(request(object_type::MESSAGE_LISTING, Some("inbox"), &params));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);

        let response = response_params(&op);
        assert_eq!(response.messages_listing_size, Some(2));
        assert_eq!(response.new_message, Some(true));
        assert!(response.mse_time.is_some());
        let body = String::from_utf8(op.written().to_vec()).unwrap();
        assert_eq!(body.matches("<msg ").count(), 1);
        assert!(body.contains(&format!("handle=\"{}\"", sms_handle(1))));
        assert!(!body.contains("thread_id"));

        let read_only = AppParams {
            filter_read_status: Some(ReadStatusFilter::ReadOnly),
            ..AppParams::default()
        };
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_LISTING,
            Some("inbox"),
            &read_only,
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        let response = response_params(&op);
        assert_eq!(response.messages_listing_size, Some(1));
        assert_eq!(response.new_message, Some(false));

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_LISTING,
            Some("nowhere"),
            &AppParams::default(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);
    }

    #[tokio::test]
    async fn test_message_listing_thread_id_needs_feature() {
        let mut handler = open(sms_store(), None).await;
        let mut response = HeaderSet::new();
        handler.handle_connect(
            &connect_headers(Some(FEATURE_MESSAGES_LISTING_V11)),
            &mut response,
        );
        enter(&mut handler, &["telecom", "msg", "inbox"]);

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_LISTING,
            None,
            &AppParams::default(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        let body = String::from_utf8(op.written().to_vec()).unwrap();
        assert!(body.contains("thread_id=\"7\""));
    }

    #[tokio::test]
    async fn test_get_message() {
        let mut handler = connected(sms_store()).await;

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(2)),
            &utf8(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        let message = BMessage::parse(op.written(), Charset::Utf8).unwrap();
        assert_eq!(message.text().unwrap(), "second");
        assert!(op.response_headers().is_empty());

        let mut op =
            BufferedOperation::new(request(object_type::MESSAGE, Some("zz"), &utf8()));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(2)),
            &AppParams::default(),
        ));
        assert_eq!(
            handler.handle_get(&mut op).await,
            ResponseCode::PreconditionFailed
        );

        let native = AppParams {
            charset: Some(Charset::Native),
            ..AppParams::default()
        };
        let mms = MessageHandle::new(3, MessageType::Mms).unwrap().to_string();
        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some(&mms), &native));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(9)),
            &utf8(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::NotFound);
    }

    #[tokio::test]
    async fn test_get_message_without_attachments() {
        let body = "MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
                    --b\r\nContent-Type: text/plain\r\n\r\nhello\r\n\
                    --b\r\nContent-Type: image/png\r\nContent-Disposition: attachment\r\n\r\nPNG\r\n\
                    --b--\r\n";
        let store = Arc::new(MemoryStore::with_messages(
            AccountKey::SmsMms,
            vec![stored(5, MessageType::Mms, "telecom/msg/inbox", body)],
            Vec::new(),
        ));
        let mut handler = connected(store).await;
        let handle = MessageHandle::new(5, MessageType::Mms).unwrap().to_string();
        let params = AppParams {
            attachment: Some(false),
            ..utf8()
        };
        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some(&handle), &params));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        let message = BMessage::parse(op.written(), Charset::Utf8).unwrap();
        let BMessageBody::Mime(mime) = &message.body else {
            panic!("expected MIME body");
        };
        assert_eq!(mime.parts.len(), 1);
        assert_eq!(mime.text().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_fractioned_message() {
        let store = Arc::new(MemoryStore::with_messages(
            AccountKey::SmsMms,
            vec![stored(1, MessageType::SmsGsm, "telecom/msg/inbox", "abcdefghijkl")],
            Vec::new(),
        ));
        let mut handler = connected(store).await;

        let first = AppParams {
            fraction_request: Some(FractionRequest::First),
            ..utf8()
        };
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &first,
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(response_params(&op).fraction_deliver, Some(FractionDeliver::More));
        let message = BMessage::parse(op.written(), Charset::Utf8).unwrap();
        assert_eq!(message.text().unwrap(), "abcdefgh");

        let next = AppParams {
            fraction_request: Some(FractionRequest::Next),
            ..utf8()
        };
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &next,
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(response_params(&op).fraction_deliver, Some(FractionDeliver::Last));
        let message = BMessage::parse(op.written(), Charset::Utf8).unwrap();
        assert_eq!(message.text().unwrap(), "ijkl");
    }

    #[tokio::test]
    async fn test_body_is_chunked() {
        let mut handler = connected(sms_store()).await;
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ))
        .with_max_chunk(16);
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert!(op.chunks() > 1);
        assert_eq!(op.written().len().div_ceil(16), op.chunks());
    }

    #[tokio::test]
    async fn test_abort_stops_body_transfer() {
        let mut handler = connected(sms_store()).await;
        let flag = handler.abort_flag();
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ))
        .with_max_chunk(16)
        .abort_after(2, flag);
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(op.chunks(), 2);
        assert_eq!(op.written().len(), 32);
    }

    #[tokio::test]
    async fn test_failed_body_transfer() {
        let mut handler = connected(sms_store()).await;
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ))
        .with_max_chunk(16)
        .fail_after(1);
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);
    }

    #[tokio::test]
    async fn test_unknown_and_missing_type() {
        let mut handler = connected(sms_store()).await;
        let mut op = BufferedOperation::new(request("x-bt/unknown", None, &AppParams::default()));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::NotAcceptable);

        let mut op = BufferedOperation::new(HeaderSet::new());
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::BadRequest);
        let mut op = BufferedOperation::new(HeaderSet::new());
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::BadRequest);
    }

    fn sms_bmessage(msg_type: &str, text: &str) -> Vec<u8> {
        let bmessage = format!(
            "BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:UNREAD\r\nTYPE:{msg_type}\r\n\
             FOLDER:telecom/msg/outbox\r\nBEGIN:BENV\r\nBEGIN:VCARD\r\nVERSION:2.1\r\n\
             TEL:+15550002\r\nEND:VCARD\r\nBEGIN:BBODY\r\nCHARSET:UTF-8\r\n\
             LENGTH:{}\r\nBEGIN:MSG\r\n{text}\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n",
            text.len() + 22
        );
        bmessage.into_bytes()
    }

    #[tokio::test]
    async fn test_push_sms_to_outbox() {
        let store = sms_store();
        let mut handler = connected(Arc::clone(&store)).await;
        enter(&mut handler, &["telecom", "msg"]);

        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some("outbox"), &utf8()))
            .with_body(sms_bmessage("SMS_GSM", "hello"));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::Ok);
        let handle = MessageHandle::parse(op.response_headers().name().unwrap()).unwrap();
        assert_eq!(handle.msg_type(), MessageType::SmsGsm);
        let stored = store.message(handle.id()).unwrap().unwrap();
        assert_eq!(stored.body, "hello");
        assert_eq!(stored.folder, "telecom/msg/sent");
    }

    #[tokio::test]
    async fn test_push_email_into_sms_folder_is_rejected() {
        let store = sms_store();
        let mut handler = connected(Arc::clone(&store)).await;
        enter(&mut handler, &["telecom", "msg", "outbox"]);

        let email = b"BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:UNREAD\r\nTYPE:EMAIL\r\n\
FOLDER:telecom/msg/outbox\r\nBEGIN:BENV\r\nBEGIN:BBODY\r\nCHARSET:UTF-8\r\n\
LENGTH:60\r\nBEGIN:MSG\r\nSubject: hi\r\n\r\nbody\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n";
        let mut op = BufferedOperation::new(request(object_type::MESSAGE, None, &utf8()))
            .with_body(&email[..]);
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::NotAcceptable);
        assert_eq!(store.len().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_push_rejections() {
        let mut handler = connected(sms_store()).await;
        enter(&mut handler, &["telecom", "msg"]);

        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some("inbox"), &utf8()))
            .with_body(sms_bmessage("SMS_GSM", "hello"));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::NotAcceptable);

        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some("nope"), &utf8()))
            .with_body(sms_bmessage("SMS_GSM", "hello"));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::NotAcceptable);

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some("outbox"),
            &AppParams::default(),
        ))
        .with_body(sms_bmessage("SMS_GSM", "hello"));
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::PreconditionFailed
        );

        let mut op = BufferedOperation::new(request(object_type::MESSAGE, Some("outbox"), &utf8()))
            .with_body(&b"BEGIN:BMSG\r\nnonsense"[..]);
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::PreconditionFailed
        );
    }

    fn status(indicator: StatusIndicator, value: bool) -> AppParams {
        AppParams {
            status_indicator: Some(indicator),
            status_value: Some(value),
            ..AppParams::default()
        }
    }

    #[tokio::test]
    async fn test_message_status() {
        let store = sms_store();
        let mut handler = connected(Arc::clone(&store)).await;

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_STATUS,
            Some(&sms_handle(1)),
            &status(StatusIndicator::ReadStatus, true),
        ));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::Ok);
        assert!(store.message(1).unwrap().unwrap().read);

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_STATUS,
            Some(&sms_handle(1)),
            &status(StatusIndicator::DeletedStatus, true),
        ));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::Ok);
        assert_eq!(store.message(1).unwrap().unwrap().folder, "telecom/msg/deleted");

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_STATUS,
            Some(&sms_handle(99)),
            &status(StatusIndicator::ReadStatus, true),
        ));
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::ServiceUnavailable
        );

        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_STATUS,
            Some("bogus"),
            &status(StatusIndicator::ReadStatus, true),
        ));
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::PreconditionFailed
        );

        let missing_value = AppParams {
            status_indicator: Some(StatusIndicator::ReadStatus),
            ..AppParams::default()
        };
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_STATUS,
            Some(&sms_handle(1)),
            &missing_value,
        ));
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::PreconditionFailed
        );
    }

    #[tokio::test]
    async fn test_notification_registration() {
        let (hub, _outbox) = NotificationHub::new(4);
        let hub = Arc::new(hub);
        let mut handler = open(sms_store(), Some(Arc::clone(&hub))).await;
        let mut response = HeaderSet::new();
        handler.handle_connect(&connect_headers(None), &mut response);

        let on = AppParams {
            notification_status: Some(true),
            ..AppParams::default()
        };
        let mut op =
            BufferedOperation::new(request(object_type::NOTIFICATION_REGISTRATION, None, &on));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::Ok);
        assert!(hub.is_registered(0));

        let mut op = BufferedOperation::new(request(
            object_type::NOTIFICATION_REGISTRATION,
            None,
            &AppParams::default(),
        ));
        assert_eq!(
            handler.handle_put(&mut op).await,
            ResponseCode::PreconditionFailed
        );

        let mut without_client = connected(sms_store()).await;
        let mut op =
            BufferedOperation::new(request(object_type::NOTIFICATION_REGISTRATION, None, &on));
        assert_eq!(
            without_client.handle_put(&mut op).await,
            ResponseCode::ServiceUnavailable
        );
    }

    #[tokio::test]
    async fn test_close_turns_off_notifications() {
        let (hub, _outbox) = NotificationHub::new(4);
        let hub = Arc::new(hub);
        let mut handler = open(sms_store(), Some(Arc::clone(&hub))).await;
        let mut response = HeaderSet::new();
        handler.handle_connect(&connect_headers(None), &mut response);

        let on = AppParams {
            notification_status: Some(true),
            ..AppParams::default()
        };
        let mut op =
            BufferedOperation::new(request(object_type::NOTIFICATION_REGISTRATION, None, &on));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::Ok);
        assert!(hub.is_registered(0));

        assert_eq!(handler.handle_disconnect(), ResponseCode::Ok);
        handler.handle_close().await;
        assert!(!hub.is_registered(0));
    }

    #[tokio::test]
    async fn test_close_keeps_other_sessions_registration() {
        let (hub, _outbox) = NotificationHub::new(4);
        let hub = Arc::new(hub);
        hub.set_registration(0, true).await.unwrap();

        let mut handler = open(sms_store(), Some(Arc::clone(&hub))).await;
        handler.handle_close().await;
        assert!(hub.is_registered(0));
    }

    #[tokio::test]
    async fn test_message_update() {
        let mut handler = connected(sms_store()).await;
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_UPDATE,
            None,
            &AppParams::default(),
        ));
        assert_eq!(handler.handle_put(&mut op).await, ResponseCode::NotImplemented);

        let store = Arc::new(MemoryStore::with_messages(
            AccountKey::Email(1),
            Vec::new(),
            vec![EmailFolder {
                id: 3,
                parent_id: 0,
                name: "INBOX".into(),
            }],
        ));
        let mut email = RequestHandler::<MemoryProvider, NotificationHub>::open(
            1,
            InstanceKind::Email {
                account_id: 1,
                display_name: "Work".into(),
            },
            &config(),
            Arc::new(MemoryProvider::new(store)),
            None,
            MockClock::shared(),
        )
        .await
        .unwrap();
        let mut response = HeaderSet::new();
        email.handle_connect(&connect_headers(None), &mut response);
        assert!(email.tree().find_email_folder_by_id(3).is_some());
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE_UPDATE,
            None,
            &AppParams::default(),
        ));
        assert_eq!(email.handle_put(&mut op).await, ResponseCode::Ok);
    }

    #[tokio::test]
    async fn test_unavailable_store_is_reacquired() {
        let store = sms_store();
        let provider = Arc::new(MemoryProvider::new(Arc::clone(&store)));
        let mut handler = RequestHandler::<_, NotificationHub>::open(
            0,
            InstanceKind::SmsMms {
                phone_type: PhoneType::Gsm,
            },
            &config(),
            Arc::clone(&provider),
            None,
            MockClock::shared(),
        )
        .await
        .unwrap();
        let mut response = HeaderSet::new();
        handler.handle_connect(&connect_headers(None), &mut response);
        assert_eq!(provider.acquisitions(), 1);

        store.set_available(false);
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ));
        assert_eq!(
            handler.handle_get(&mut op).await,
            ResponseCode::ServiceUnavailable
        );

        store.set_available(true);
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ));
        assert_eq!(handler.handle_get(&mut op).await, ResponseCode::Ok);
        assert_eq!(provider.acquisitions(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let store = sms_store();
        let mut handler = connected(Arc::clone(&store)).await;
        store.set_latency(Duration::from_secs(2));
        let mut op = BufferedOperation::new(request(
            object_type::MESSAGE,
            Some(&sms_handle(1)),
            &utf8(),
        ));
        assert_eq!(
            handler.handle_get(&mut op).await,
            ResponseCode::ServiceUnavailable
        );
        assert!(op.written().is_empty());
    }

    #[tokio::test]
    async fn test_close_releases_store_once() {
        let mut handler = connected(sms_store()).await;
        handler.handle_close().await;
        assert!(handler.is_closed());
        assert!(!handler.state().is_connected());
        handler.handle_close().await;
        assert!(handler.is_closed());
    }
}
