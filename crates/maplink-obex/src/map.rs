//! MAP service identifiers and object types.

/// Target UUID of the Message Access Service,
/// `BB582B40-420C-11DB-B0DE-0800200C9A66`.
pub static MAS_TARGET: [u8; 16] = [
    0xBB, 0x58, 0x2B, 0x40, 0x42, 0x0C, 0x11, 0xDB, 0xB0, 0xDE, 0x08, 0x00, 0x20, 0x0C, 0x9A, 0x66,
];

/// Target UUID of the Message Notification Service,
/// `BB582B41-420C-11DB-B0DE-0800200C9A66`.
pub static MNS_TARGET: [u8; 16] = [
    0xBB, 0x58, 0x2B, 0x41, 0x42, 0x0C, 0x11, 0xDB, 0xB0, 0xDE, 0x08, 0x00, 0x20, 0x0C, 0x9A, 0x66,
];

/// `MapSupportedFeatures` bit announcing messages-listing format v1.1.
pub const FEATURE_MESSAGES_LISTING_V11: u32 = 1 << 9;

/// Object types carried in the TYPE header.
pub mod object_type {
    /// Folder listing.
    pub const FOLDER_LISTING: &str = "x-obex/folder-listing";
    /// Message listing.
    pub const MESSAGE_LISTING: &str = "x-bt/MAP-msg-listing";
    /// A single bMessage.
    pub const MESSAGE: &str = "x-bt/message";
    /// Inbox update request.
    pub const MESSAGE_UPDATE: &str = "x-bt/MAP-messageUpdate";
    /// Notification registration.
    pub const NOTIFICATION_REGISTRATION: &str = "x-bt/MAP-NotificationRegistration";
    /// Read or deleted status change.
    pub const MESSAGE_STATUS: &str = "x-bt/messageStatus";
    /// Event report sent to the notification service.
    pub const EVENT_REPORT: &str = "x-bt/MAP-event-report";
}
