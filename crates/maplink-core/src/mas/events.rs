//! Content-change events and MAP event reports.

use xml::writer::{EmitterConfig, XmlEvent};

use crate::error::Result;
use crate::types::{MessageHandle, MessageType};

/// Account a store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKey {
    /// The shared SMS/MMS store.
    SmsMms,
    /// An email account by backing-store id.
    Email(u64),
}

/// A change observed in a backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A message arrived.
    NewMessage {
        /// Owning account.
        account: AccountKey,
        /// New message.
        handle: MessageHandle,
        /// Folder path.
        folder: String,
    },
    /// A message was moved to the deleted folder.
    MessageDeleted {
        /// Owning account.
        account: AccountKey,
        /// Deleted message.
        handle: MessageHandle,
        /// Folder path the message left.
        folder: String,
    },
    /// A message moved between folders.
    MessageShift {
        /// Owning account.
        account: AccountKey,
        /// Moved message.
        handle: MessageHandle,
        /// New folder path.
        folder: String,
        /// Previous folder path.
        old_folder: String,
    },
    /// A pushed message was sent.
    SendingSuccess {
        /// Owning account.
        account: AccountKey,
        /// Sent message.
        handle: MessageHandle,
        /// Folder path.
        folder: String,
    },
    /// Folders of an account were added, renamed or removed.
    FoldersChanged {
        /// Owning account.
        account: AccountKey,
    },
    /// Accounts were added or removed.
    AccountsChanged,
}

impl StoreEvent {
    /// Account the event concerns, if any.
    #[must_use]
    pub const fn account(&self) -> Option<AccountKey> {
        match self {
            Self::NewMessage { account, .. }
            | Self::MessageDeleted { account, .. }
            | Self::MessageShift { account, .. }
            | Self::SendingSuccess { account, .. }
            | Self::FoldersChanged { account } => Some(*account),
            Self::AccountsChanged => None,
        }
    }
}

/// MAP event report types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `NewMessage`
    NewMessage,
    /// `MessageDeleted`
    MessageDeleted,
    /// `MessageShift`
    MessageShift,
    /// `SendingSuccess`
    SendingSuccess,
}

impl EventKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "NewMessage",
            Self::MessageDeleted => "MessageDeleted",
            Self::MessageShift => "MessageShift",
            Self::SendingSuccess => "SendingSuccess",
        }
    }
}

/// An `x-bt/MAP-event-report` sent to a notification client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEvent {
    /// Event type.
    pub kind: EventKind,
    /// Affected message.
    pub handle: MessageHandle,
    /// Current folder path.
    pub folder: String,
    /// Previous folder path, for shifts.
    pub old_folder: Option<String>,
}

impl MapEvent {
    /// Converts a store event into a report; folder and account changes
    /// have none.
    #[must_use]
    pub fn from_store_event(event: &StoreEvent) -> Option<Self> {
        let (kind, handle, folder, old_folder) = match event {
            StoreEvent::NewMessage { handle, folder, .. } => {
                (EventKind::NewMessage, handle, folder, None)
            }
            StoreEvent::MessageDeleted { handle, folder, .. } => {
                (EventKind::MessageDeleted, handle, folder, None)
            }
            StoreEvent::MessageShift {
                handle,
                folder,
                old_folder,
                ..
            } => (EventKind::MessageShift, handle, folder, Some(old_folder.clone())),
            StoreEvent::SendingSuccess { handle, folder, .. } => {
                (EventKind::SendingSuccess, handle, folder, None)
            }
            StoreEvent::FoldersChanged { .. } | StoreEvent::AccountsChanged => return None,
        };
        Some(Self {
            kind,
            handle: *handle,
            folder: folder.clone(),
            old_folder,
        })
    }

    /// Message type of the affected message.
    #[must_use]
    pub const fn msg_type(&self) -> MessageType {
        self.handle.msg_type()
    }

    /// Renders the event report XML.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML writer fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let handle = self.handle.to_string();
        let mut buf = Vec::new();
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .create_writer(&mut buf);
        writer.write(XmlEvent::start_element("MAP-event-report").attr("version", "1.0"))?;
        let mut event = XmlEvent::start_element("event")
            .attr("type", self.kind.as_str())
            .attr("handle", handle.as_str())
            .attr("folder", self.folder.as_str());
        if let Some(old) = &self.old_folder {
            event = event.attr("old_folder", old.as_str());
        }
        writer.write(event.attr("msg_type", self.msg_type().as_str()))?;
        writer.write(XmlEvent::end_element())?;
        writer.write(XmlEvent::end_element())?;
        Ok(buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn handle() -> MessageHandle {
        MessageHandle::new(5, MessageType::SmsGsm).unwrap()
    }

    #[test]
    fn test_event_report_xml() {
        let event = MapEvent::from_store_event(&StoreEvent::NewMessage {
            account: AccountKey::SmsMms,
            handle: handle(),
            folder: "telecom/msg/inbox".into(),
        })
        .unwrap();
        let xml = String::from_utf8(event.encode().unwrap()).unwrap();
        assert!(xml.contains("<MAP-event-report version=\"1.0\">"));
        assert!(xml.contains(
            "<event type=\"NewMessage\" handle=\"2000000000000005\" \
             folder=\"telecom/msg/inbox\" msg_type=\"SMS_GSM\" />"
        ));
    }

    #[test]
    fn test_shift_carries_old_folder() {
        let event = MapEvent::from_store_event(&StoreEvent::MessageShift {
            account: AccountKey::Email(2),
            handle: handle(),
            folder: "telecom/msg/sent".into(),
            old_folder: "telecom/msg/outbox".into(),
        })
        .unwrap();
        assert_eq!(event.kind, EventKind::MessageShift);
        let xml = String::from_utf8(event.encode().unwrap()).unwrap();
        assert!(xml.contains("old_folder=\"telecom/msg/outbox\""));
    }

    #[test]
    fn test_structural_events_have_no_report() {
        let changed = StoreEvent::FoldersChanged {
            account: AccountKey::Email(1),
        };
        assert!(MapEvent::from_store_event(&changed).is_none());
        assert_eq!(changed.account(), Some(AccountKey::Email(1)));
        assert!(MapEvent::from_store_event(&StoreEvent::AccountsChanged).is_none());
        assert_eq!(StoreEvent::AccountsChanged.account(), None);
    }
}
