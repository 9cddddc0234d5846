//! Message listing rows.

use chrono::NaiveDateTime;

use crate::types::{MessageHandle, MessageType};

/// How much of a message the server holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceptionStatus {
    /// Fully downloaded.
    #[default]
    Complete,
    /// Partially downloaded.
    Fractioned,
    /// Only a notification was received.
    Notification,
}

impl ReceptionStatus {
    /// Listing attribute value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Fractioned => "fractioned",
            Self::Notification => "notification",
        }
    }
}

/// Summary of one message in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Message handle; also carries the message type.
    pub handle: MessageHandle,
    /// Subject, or the leading text of an SMS.
    pub subject: String,
    /// Local time the message was sent or received.
    pub datetime: NaiveDateTime,
    /// Originator display name.
    pub sender_name: String,
    /// Originator phone number or email address.
    pub sender_addressing: String,
    /// Reply-to address (email only).
    pub replyto_addressing: String,
    /// Recipient display name.
    pub recipient_name: String,
    /// Recipient phone number or email address.
    pub recipient_addressing: String,
    /// Message size in bytes.
    pub size: usize,
    /// Whether the message has a text part.
    pub text: bool,
    /// Download state.
    pub reception_status: ReceptionStatus,
    /// Total attachment size in bytes.
    pub attachment_size: usize,
    /// High priority flag.
    pub priority: bool,
    /// Read flag.
    pub read: bool,
    /// Whether the message has been sent.
    pub sent: bool,
    /// DRM protected flag.
    pub protected: bool,
    /// Conversation id, reported only to peers that support it.
    pub thread_id: Option<u64>,
}

impl ListingEntry {
    /// Creates an entry with empty addressing and default flags.
    #[must_use]
    pub fn new(handle: MessageHandle, subject: impl Into<String>, datetime: NaiveDateTime) -> Self {
        Self {
            handle,
            subject: subject.into(),
            datetime,
            sender_name: String::new(),
            sender_addressing: String::new(),
            replyto_addressing: String::new(),
            recipient_name: String::new(),
            recipient_addressing: String::new(),
            size: 0,
            text: true,
            reception_status: ReceptionStatus::Complete,
            attachment_size: 0,
            priority: false,
            read: false,
            sent: false,
            protected: false,
            thread_id: None,
        }
    }

    /// Message type from the handle.
    #[must_use]
    pub const fn msg_type(&self) -> MessageType {
        self.handle.msg_type()
    }
}
