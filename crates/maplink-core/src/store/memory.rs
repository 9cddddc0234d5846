//! In-memory message store.
//!
//! Backs the daemon and the tests. Messages are seeded from a JSON
//! [`StoreSnapshot`]; MMS and email bodies are kept as raw MIME text.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use maplink_mime::MimeMessage;
use maplink_obex::Charset;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{EmailFolder, FetchOptions, MessageStore, PushOptions, StoreProvider};
use crate::bmessage::{BMessage, BMessageBody, SmsBody, VCard};
use crate::error::{Error, Result};
use crate::folder::FolderRef;
use crate::listing::{ListingEntry, MessageFilter, ReceptionStatus};
use crate::mas::{AccountKey, StoreEvent};
use crate::types::{MessageHandle, MessageType, ReadStatus};

/// Longest SMS subject derived from the message text.
const SMS_SUBJECT_CHARS: usize = 256;

/// A message record in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store id.
    pub id: u64,
    /// Message type.
    pub msg_type: MessageType,
    /// Folder path, e.g. `telecom/msg/inbox`.
    pub folder: String,
    /// Local send or receive time.
    pub datetime: NaiveDateTime,
    /// Subject; SMS subjects are derived from the body when empty.
    #[serde(default)]
    pub subject: String,
    /// Originator name.
    #[serde(default)]
    pub sender_name: String,
    /// Originator phone number or address.
    #[serde(default)]
    pub sender_address: String,
    /// Recipient name.
    #[serde(default)]
    pub recipient_name: String,
    /// Recipient phone number or address.
    #[serde(default)]
    pub recipient_address: String,
    /// Reply-to address.
    #[serde(default)]
    pub reply_to: String,
    /// Read flag.
    #[serde(default)]
    pub read: bool,
    /// High priority flag.
    #[serde(default)]
    pub priority: bool,
    /// Sent flag.
    #[serde(default)]
    pub sent: bool,
    /// DRM protected flag.
    #[serde(default)]
    pub protected: bool,
    /// Conversation id.
    #[serde(default)]
    pub thread_id: Option<u64>,
    /// SMS text, or the full MIME message for MMS and email.
    pub body: String,
    /// Folder a deleted message came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_from: Option<String>,
}

impl StoredMessage {
    fn handle(&self) -> Result<MessageHandle> {
        MessageHandle::new(self.id, self.msg_type)
    }

    fn entry(&self) -> Result<ListingEntry> {
        let mut entry = ListingEntry::new(self.handle()?, self.subject.clone(), self.datetime);
        if self.msg_type.is_sms() {
            if entry.subject.is_empty() {
                entry.subject = self.body.chars().take(SMS_SUBJECT_CHARS).collect();
            }
        } else {
            let mime = MimeMessage::parse(&self.body)?;
            entry.text = mime.text().is_ok();
            entry.attachment_size = mime.attachment_size();
            if entry.subject.is_empty() {
                entry.subject = mime.subject.unwrap_or_default();
            }
        }
        entry.sender_name.clone_from(&self.sender_name);
        entry.sender_addressing.clone_from(&self.sender_address);
        entry.replyto_addressing.clone_from(&self.reply_to);
        entry.recipient_name.clone_from(&self.recipient_name);
        entry.recipient_addressing.clone_from(&self.recipient_address);
        entry.size = self.body.len();
        entry.reception_status = ReceptionStatus::Complete;
        entry.priority = self.priority;
        entry.read = self.read;
        entry.sent = self.sent;
        entry.protected = self.protected;
        entry.thread_id = self.thread_id;
        Ok(entry)
    }

    fn vcard(&self, name: &str, address: &str) -> VCard {
        let name = Some(name).filter(|n| !n.is_empty());
        if self.msg_type == MessageType::Email {
            VCard::email(name, address)
        } else {
            VCard::phone(name, address)
        }
    }
}

/// Messages and folders of one email account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAccountSnapshot {
    /// Backing account id.
    pub account_id: u64,
    /// Account folders.
    #[serde(default)]
    pub folders: Vec<EmailFolder>,
    /// Account messages.
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Seed data for the in-memory stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// SMS and MMS messages.
    #[serde(default)]
    pub sms_mms: Vec<StoredMessage>,
    /// Email accounts.
    #[serde(default)]
    pub email_accounts: Vec<EmailAccountSnapshot>,
}

impl StoreSnapshot {
    /// Reads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Data of one email account, empty if the snapshot has none.
    #[must_use]
    pub fn email_account(&self, account_id: u64) -> EmailAccountSnapshot {
        self.email_accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .cloned()
            .unwrap_or_else(|| EmailAccountSnapshot {
                account_id,
                ..EmailAccountSnapshot::default()
            })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    messages: Vec<StoredMessage>,
    folders: Vec<EmailFolder>,
    next_id: u64,
}

/// A message store held entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    account: AccountKey,
    state: Mutex<MemoryState>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    events: Option<mpsc::Sender<StoreEvent>>,
}

impl MemoryStore {
    /// Creates an empty store for an account.
    #[must_use]
    pub fn new(account: AccountKey) -> Self {
        Self::with_messages(account, Vec::new(), Vec::new())
    }

    /// Creates a store seeded with messages and email folders.
    #[must_use]
    pub fn with_messages(
        account: AccountKey,
        messages: Vec<StoredMessage>,
        folders: Vec<EmailFolder>,
    ) -> Self {
        let next_id = messages.iter().map(|m| m.id).max().map_or(1, |id| id + 1);
        Self {
            account,
            state: Mutex::new(MemoryState {
                messages,
                folders,
                next_id,
            }),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            events: None,
        }
    }

    /// Publishes content changes on `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: mpsc::Sender<StoreEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the store is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Delays every store call.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of stored messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] if the store lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.messages.len())
    }

    /// Copy of a stored message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`] if the store lock is poisoned.
    pub fn message(&self, id: u64) -> Result<Option<StoredMessage>> {
        Ok(self.lock()?.messages.iter().find(|m| m.id == id).cloned())
    }

    /// Adds an incoming message and announces it.
    ///
    /// The message id is replaced by the next free id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned or the id space is
    /// exhausted.
    pub fn deliver(&self, mut message: StoredMessage) -> Result<MessageHandle> {
        let handle = {
            let mut state = self.lock()?;
            message.id = state.next_id;
            let handle = message.handle()?;
            state.next_id += 1;
            state.messages.push(message.clone());
            handle
        };
        self.emit(StoreEvent::NewMessage {
            account: self.account,
            handle,
            folder: message.folder,
        });
        Ok(handle)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::RemoteUnavailable("message store lock poisoned".into()))
    }

    async fn simulate(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::RemoteUnavailable("message store offline".into()))
        }
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                warn!(error = %e, "dropping store event");
            }
        }
    }
}

fn sibling(path: &str, name: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => format!("{parent}/{name}"),
        None => name.to_string(),
    }
}

fn is_folder(path: &str, name: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| last.eq_ignore_ascii_case(name))
}

impl MessageStore for MemoryStore {
    async fn list_messages(
        &self,
        folder: &FolderRef,
        filter: &MessageFilter,
    ) -> Result<Vec<ListingEntry>> {
        self.simulate().await?;
        let state = self.lock()?;
        let mut entries = Vec::new();
        for message in state
            .messages
            .iter()
            .filter(|m| m.folder.eq_ignore_ascii_case(&folder.path))
        {
            let entry = match message.entry() {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(id = message.id, error = %e, "unreadable stored message, not listed");
                    continue;
                }
            };
            if filter.matches(&entry) {
                entries.push(entry);
            }
        }
        debug!(folder = %folder.path, count = entries.len(), "listed messages");
        Ok(entries)
    }

    async fn get_message(&self, handle: MessageHandle, options: FetchOptions) -> Result<BMessage> {
        self.simulate().await?;
        if options.charset == Charset::Native {
            return Err(Error::Unsupported("native SMS PDU encoding".into()));
        }
        let stored = {
            let state = self.lock()?;
            state
                .messages
                .iter()
                .find(|m| m.id == handle.id() && m.msg_type == handle.msg_type())
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("message {handle}")))?
        };

        let body = if stored.msg_type.is_sms() {
            BMessageBody::Sms(SmsBody::new(stored.body.clone()))
        } else {
            BMessageBody::Mime(MimeMessage::parse(&stored.body)?)
        };
        let mut message = BMessage::new(stored.msg_type, stored.folder.clone(), body);
        message.status = if stored.read {
            ReadStatus::Read
        } else {
            ReadStatus::Unread
        };
        if !stored.sender_address.is_empty() {
            message
                .originators
                .push(stored.vcard(&stored.sender_name, &stored.sender_address));
        }
        if !stored.recipient_address.is_empty() {
            message
                .recipients
                .push(stored.vcard(&stored.recipient_name, &stored.recipient_address));
        }
        message.properties.charset = Some("UTF-8".into());
        if stored.msg_type == MessageType::Email {
            message.properties.encoding = Some("8BIT".into());
        }
        Ok(message)
    }

    async fn push_message(
        &self,
        folder: &FolderRef,
        message: &BMessage,
        options: PushOptions,
    ) -> Result<u64> {
        self.simulate().await?;
        let (subject, body) = match &message.body {
            BMessageBody::Sms(sms) => (String::new(), sms.text()),
            BMessageBody::Mime(mime) => (mime.subject.clone().unwrap_or_default(), mime.encode()),
        };
        let originator = message.originators.first();
        let recipient = message.recipients.first();
        let mut stored = StoredMessage {
            id: 0,
            msg_type: message.msg_type,
            folder: folder.path.clone(),
            datetime: chrono::Local::now().naive_local(),
            subject,
            sender_name: originator
                .and_then(VCard::display_name)
                .unwrap_or_default()
                .to_string(),
            sender_address: originator
                .and_then(VCard::first_address)
                .unwrap_or_default()
                .to_string(),
            recipient_name: recipient
                .and_then(VCard::display_name)
                .unwrap_or_default()
                .to_string(),
            recipient_address: recipient
                .and_then(VCard::first_address)
                .unwrap_or_default()
                .to_string(),
            reply_to: String::new(),
            read: true,
            priority: false,
            sent: false,
            protected: false,
            thread_id: None,
            body,
            deleted_from: None,
        };

        let sending = is_folder(&folder.path, "outbox");
        let (id, handle) = {
            let mut state = self.lock()?;
            stored.id = state.next_id;
            let handle = stored.handle()?;
            state.next_id += 1;
            if sending {
                stored.sent = true;
                stored.folder = sibling(&folder.path, "sent");
            }
            if !(sending && options.transparent) {
                state.messages.push(stored.clone());
            }
            (stored.id, handle)
        };
        info!(%handle, folder = %folder.path, retry = options.retry, "stored pushed message");

        if sending {
            self.emit(StoreEvent::SendingSuccess {
                account: self.account,
                handle,
                folder: folder.path.clone(),
            });
            if !options.transparent {
                self.emit(StoreEvent::MessageShift {
                    account: self.account,
                    handle,
                    folder: stored.folder,
                    old_folder: folder.path.clone(),
                });
            }
        }
        Ok(id)
    }

    async fn set_read(&self, handle: MessageHandle, read: bool) -> Result<bool> {
        self.simulate().await?;
        let mut state = self.lock()?;
        Ok(state
            .messages
            .iter_mut()
            .find(|m| m.id == handle.id() && m.msg_type == handle.msg_type())
            .map(|m| m.read = read)
            .is_some())
    }

    async fn set_deleted(&self, handle: MessageHandle, deleted: bool) -> Result<bool> {
        self.simulate().await?;
        let event = {
            let mut state = self.lock()?;
            let Some(message) = state
                .messages
                .iter_mut()
                .find(|m| m.id == handle.id() && m.msg_type == handle.msg_type())
            else {
                return Ok(false);
            };
            let in_deleted = is_folder(&message.folder, "deleted");
            if deleted == in_deleted {
                return Ok(true);
            }
            if deleted {
                let target = sibling(&message.folder, "deleted");
                let from = std::mem::replace(&mut message.folder, target);
                message.deleted_from = Some(from.clone());
                StoreEvent::MessageDeleted {
                    account: self.account,
                    handle,
                    folder: from,
                }
            } else {
                let target = message
                    .deleted_from
                    .take()
                    .unwrap_or_else(|| sibling(&message.folder, "inbox"));
                let old_folder = std::mem::replace(&mut message.folder, target.clone());
                StoreEvent::MessageShift {
                    account: self.account,
                    handle,
                    folder: target,
                    old_folder,
                }
            }
        };
        self.emit(event);
        Ok(true)
    }

    async fn email_folders(&self, parent_id: u64) -> Result<Vec<EmailFolder>> {
        self.simulate().await?;
        Ok(self
            .lock()?
            .folders
            .iter()
            .filter(|f| f.parent_id == parent_id)
            .cloned()
            .collect())
    }

    async fn update_inbox(&self) -> Result<()> {
        self.simulate().await?;
        info!(account = ?self.account, "inbox update requested");
        Ok(())
    }
}

/// Provider handing out a shared [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryProvider {
    store: Arc<MemoryStore>,
    acquisitions: AtomicUsize,
}

impl MemoryProvider {
    /// Wraps a store.
    #[must_use]
    pub const fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Number of successful acquisitions so far.
    #[must_use]
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl StoreProvider for MemoryProvider {
    type Store = MemoryStore;

    fn acquire(&self) -> Result<Arc<MemoryStore>> {
        if !self.store.is_available() {
            return Err(Error::RemoteUnavailable("message store offline".into()));
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.store))
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
    use crate::folder::FolderTree;
    use chrono::NaiveDate;

    fn sms(id: u64, folder: &str, body: &str) -> StoredMessage {
        StoredMessage {
            id,
            msg_type: MessageType::SmsGsm,
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
            read: false,
            priority: false,
            sent: false,
            protected: false,
            thread_id: None,
            body: body.to_string(),
            deleted_from: None,
        }
    }

    fn folder(path: &str) -> FolderRef {
        FolderRef {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            email_folder_id: None,
            has_sms_mms: true,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::with_messages(
            AccountKey::SmsMms,
            vec![
                sms(1, "telecom/msg/inbox", "first"),
                sms(2, "telecom/msg/inbox", "second"),
                sms(3, "telecom/msg/sent", "third"),
            ],
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_list_by_folder() {
        let store = store();
        let entries = store
            .list_messages(&folder("telecom/msg/INBOX"), &MessageFilter::default())
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject, "first");
        assert_eq!(entries[0].sender_addressing, "+15550001");
        assert_eq!(entries[1].size, 6);
    }

    #[tokio::test]
    async fn test_listing_skips_unreadable_message() {
        let mut broken = sms(7, "telecom/msg/inbox", "no header separator here\r\n\r\nbody");
        broken.msg_type = MessageType::Mms;
        let mut mms = sms(8, "telecom/msg/inbox", "Subject: hello\r\n\r\npicture");
        mms.msg_type = MessageType::Mms;
        let store = MemoryStore::with_messages(
            AccountKey::SmsMms,
            vec![sms(1, "telecom/msg/inbox", "first"), broken, mms],
            Vec::new(),
        );

        let entries = store
            .list_messages(&folder("telecom/msg/inbox"), &MessageFilter::default())
            .await
            .unwrap();
        let ids: Vec<u64> = entries.iter().map(|e| e.handle.id()).collect();
        assert_eq!(ids, vec![1, 8]);
        assert_eq!(entries[1].subject, "hello");
    }

    #[tokio::test]
    async fn test_get_message() {
        let store = store();
        let handle = MessageHandle::new(2, MessageType::SmsGsm).unwrap();
        let options = FetchOptions {
            charset: Charset::Utf8,
            attachments: true,
        };
        let message = store.get_message(handle, options).await.unwrap();
        assert_eq!(message.text().unwrap(), "second");
        assert_eq!(message.originators[0].phone_numbers, vec!["+15550001"]);
        assert_eq!(message.status, ReadStatus::Unread);

        let missing = MessageHandle::new(9, MessageType::SmsGsm).unwrap();
        assert!(matches!(
            store.get_message(missing, options).await,
            Err(Error::NotFound(_))
        ));

        let native = FetchOptions {
            charset: Charset::Native,
            attachments: true,
        };
        assert!(matches!(
            store.get_message(handle, native).await,
            Err(Error::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_push_to_outbox_moves_to_sent() {
        let (tx, mut rx) = mpsc::channel(8);
        let store = store().with_events(tx);
        let message = BMessage::new(
            MessageType::SmsGsm,
            "telecom/msg/outbox",
            BMessageBody::Sms(SmsBody::new("hi")),
        );
        let id = store
            .push_message(&folder("telecom/msg/outbox"), &message, PushOptions::default())
            .await
            .unwrap();
        assert_eq!(id, 4);
        let stored = store.message(id).unwrap().unwrap();
        assert_eq!(stored.folder, "telecom/msg/sent");
        assert!(stored.sent);

        assert!(matches!(rx.recv().await, Some(StoreEvent::SendingSuccess { .. })));
        assert!(matches!(rx.recv().await, Some(StoreEvent::MessageShift { .. })));
    }

    #[tokio::test]
    async fn test_transparent_push_keeps_no_copy() {
        let store = store();
        let message = BMessage::new(
            MessageType::SmsGsm,
            "",
            BMessageBody::Sms(SmsBody::new("hi")),
        );
        let options = PushOptions {
            transparent: true,
            retry: false,
        };
        let id = store
            .push_message(&folder("telecom/msg/outbox"), &message, options)
            .await
            .unwrap();
        assert!(store.message(id).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_status_changes() {
        let (tx, mut rx) = mpsc::channel(8);
        let store = store().with_events(tx);
        let handle = MessageHandle::new(1, MessageType::SmsGsm).unwrap();

        assert!(store.set_read(handle, true).await.unwrap());
        assert!(store.message(1).unwrap().unwrap().read);

        assert!(store.set_deleted(handle, true).await.unwrap());
        assert_eq!(store.message(1).unwrap().unwrap().folder, "telecom/msg/deleted");
        assert!(matches!(rx.recv().await, Some(StoreEvent::MessageDeleted { .. })));

        assert!(store.set_deleted(handle, false).await.unwrap());
        assert_eq!(store.message(1).unwrap().unwrap().folder, "telecom/msg/inbox");

        let missing = MessageHandle::new(1, MessageType::Mms).unwrap();
        assert!(!store.set_read(missing, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_and_provider() {
        let provider = MemoryProvider::new(Arc::new(store()));
        let store = provider.acquire().unwrap();
        assert_eq!(provider.acquisitions(), 1);

        store.set_available(false);
        assert!(matches!(
            store.update_inbox().await,
            Err(Error::RemoteUnavailable(_))
        ));
        assert!(provider.acquire().is_err());
        assert_eq!(provider.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_deliver_announces_new_message() {
        let (tx, mut rx) = mpsc::channel(8);
        let store = store().with_events(tx);
        let handle = store.deliver(sms(0, "telecom/msg/inbox", "new")).unwrap();
        assert_eq!(handle.id(), 4);
        assert_eq!(
            rx.recv().await,
            Some(StoreEvent::NewMessage {
                account: AccountKey::SmsMms,
                handle,
                folder: "telecom/msg/inbox".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_email_folder_tree_is_bounded() {
        let folders = vec![
            EmailFolder { id: 10, parent_id: 0, name: "INBOX".into() },
            EmailFolder { id: 11, parent_id: 10, name: "Receipts".into() },
            EmailFolder { id: 12, parent_id: 11, name: "2024".into() },
            EmailFolder { id: 10, parent_id: 12, name: "loop".into() },
            EmailFolder { id: 20, parent_id: 0, name: "Archive".into() },
        ];
        let store = MemoryStore::with_messages(AccountKey::Email(1), Vec::new(), folders);

        let tree = FolderTree::for_email(&store, 32).await.unwrap();
        let inbox = tree.find_email_folder_by_name("inbox").unwrap();
        assert_eq!(tree.email_folder_id(inbox), Some(10));
        let leaf = tree.find_email_folder_by_id(12).unwrap();
        assert_eq!(tree.full_path(leaf), "telecom/msg/inbox/Receipts/2024");
        assert_eq!(tree.child_count(leaf), 0);
        assert!(tree.find_email_folder_by_name("archive").is_some());
        assert!(tree.find_email_folder_by_name("outbox").is_none());

        let shallow = FolderTree::for_email(&store, 1).await.unwrap();
        assert!(shallow.find_email_folder_by_id(10).is_some());
        assert!(shallow.find_email_folder_by_id(11).is_none());
    }

    #[test]
    fn test_snapshot_json() {
        let json = r#"{
            "sms_mms": [{
                "id": 1, "msg_type": "SMS_GSM", "folder": "telecom/msg/inbox",
                "datetime": "2024-03-05T09:00:00", "body": "hello"
            }],
            "email_accounts": [{
                "account_id": 2,
                "folders": [{ "id": 5, "parent_id": 0, "name": "INBOX" }]
            }]
        }"#;
        let snapshot: StoreSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.sms_mms[0].body, "hello");
        assert!(!snapshot.sms_mms[0].read);
        assert_eq!(snapshot.email_account(2).folders.len(), 1);
        assert!(snapshot.email_account(3).folders.is_empty());
    }
}
