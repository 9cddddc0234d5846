//! Core MAP value types: message types, handles and read status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use maplink_obex::MessageTypeFilter;

/// Number of bits reserved for the store id inside a handle.
const HANDLE_TYPE_SHIFT: u32 = 59;

/// Largest store id that fits in a handle.
pub const MAX_STORE_ID: u64 = (1 << HANDLE_TYPE_SHIFT) - 1;

/// The kind of message served by a MAS instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// GSM SMS.
    SmsGsm,
    /// CDMA SMS.
    SmsCdma,
    /// Multimedia message.
    Mms,
    /// Email.
    Email,
}

impl MessageType {
    /// Wire name used in bMessage and listings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmsGsm => "SMS_GSM",
            Self::SmsCdma => "SMS_CDMA",
            Self::Mms => "MMS",
            Self::Email => "EMAIL",
        }
    }

    /// Parses a wire name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a format error for unknown names.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SMS_GSM" => Ok(Self::SmsGsm),
            "SMS_CDMA" => Ok(Self::SmsCdma),
            "MMS" => Ok(Self::Mms),
            "EMAIL" => Ok(Self::Email),
            other => Err(Error::Format(format!("unknown message type: {other}"))),
        }
    }

    /// Whether this is one of the SMS variants.
    #[must_use]
    pub const fn is_sms(self) -> bool {
        matches!(self, Self::SmsGsm | Self::SmsCdma)
    }

    /// Bit used by the filter-message-type exclusion mask.
    #[must_use]
    pub const fn filter_bit(self) -> u8 {
        match self {
            Self::SmsGsm => MessageTypeFilter::SMS_GSM,
            Self::SmsCdma => MessageTypeFilter::SMS_CDMA,
            Self::Email => MessageTypeFilter::EMAIL,
            Self::Mms => MessageTypeFilter::MMS,
        }
    }

    /// Bit advertised in the SDP supported-message-types field.
    #[must_use]
    pub const fn sdp_bit(self) -> u8 {
        match self {
            Self::Email => 0x01,
            Self::SmsGsm => 0x02,
            Self::SmsCdma => 0x04,
            Self::Mms => 0x08,
        }
    }

    const fn handle_mask(self) -> u64 {
        let tag: u64 = match self {
            Self::Mms => 1,
            Self::Email => 2,
            Self::SmsGsm => 4,
            Self::SmsCdma => 8,
        };
        tag << HANDLE_TYPE_SHIFT
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read state of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadStatus {
    /// Message has been read.
    Read,
    /// Message has not been read.
    #[default]
    Unread,
}

impl ReadStatus {
    /// Wire name used in bMessage `STATUS`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Unread => "UNREAD",
        }
    }

    /// Parses a wire name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a format error for anything other than READ or UNREAD.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(Self::Read),
            "UNREAD" => Ok(Self::Unread),
            other => Err(Error::Format(format!("unknown status: {other}"))),
        }
    }
}

/// A message handle: a store id tagged with its message type.
///
/// Rendered as 16 uppercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle {
    id: u64,
    msg_type: MessageType,
}

impl MessageHandle {
    /// Creates a handle.
    ///
    /// # Errors
    ///
    /// Returns a range error if the id does not fit below the type bits.
    pub fn new(id: u64, msg_type: MessageType) -> Result<Self> {
        if id > MAX_STORE_ID {
            return Err(Error::Range(format!("message id {id} too large for handle")));
        }
        Ok(Self { id, msg_type })
    }

    /// Store id without the type mask.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Message type encoded in the handle.
    #[must_use]
    pub const fn msg_type(self) -> MessageType {
        self.msg_type
    }

    /// Parses a hex handle string.
    ///
    /// # Errors
    ///
    /// Returns a format error for non-hex input or an unknown type mask.
    pub fn parse(value: &str) -> Result<Self> {
        let raw = u64::from_str_radix(value.trim(), 16)
            .map_err(|e| Error::Format(format!("invalid handle {value:?}: {e}")))?;
        let msg_type = match raw >> HANDLE_TYPE_SHIFT {
            1 => MessageType::Mms,
            2 => MessageType::Email,
            4 => MessageType::SmsGsm,
            8 => MessageType::SmsCdma,
            other => {
                return Err(Error::Format(format!(
                    "invalid handle type bits {other:#x} in {value:?}"
                )));
            }
        };
        Ok(Self {
            id: raw & MAX_STORE_ID,
            msg_type,
        })
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.id | self.msg_type.handle_mask())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_handle_display() {
        let handle = MessageHandle::new(0x2A, MessageType::SmsGsm).unwrap();
        assert_eq!(handle.to_string(), "200000000000002A");

        let handle = MessageHandle::new(1, MessageType::Mms).unwrap();
        assert_eq!(handle.to_string(), "0800000000000001");
    }

    #[test]
    fn test_handle_parse() {
        let handle = MessageHandle::parse("400000000000000F").unwrap();
        assert_eq!(handle.msg_type(), MessageType::SmsCdma);
        assert_eq!(handle.id(), 15);

        let handle = MessageHandle::parse("1000000000000007").unwrap();
        assert_eq!(handle.msg_type(), MessageType::Email);
        assert_eq!(handle.id(), 7);
    }

    #[test]
    fn test_handle_rejects_bad_input() {
        assert!(MessageHandle::parse("zz").is_err());
        assert!(MessageHandle::parse("0000000000000001").is_err());
        assert!(MessageHandle::parse("").is_err());
        assert!(matches!(
            MessageHandle::new(1 << 59, MessageType::Email),
            Err(Error::Range(_))
        ));
    }

    #[test]
    fn test_message_type_names() {
        for t in [
            MessageType::SmsGsm,
            MessageType::SmsCdma,
            MessageType::Mms,
            MessageType::Email,
        ] {
            assert_eq!(MessageType::parse(t.as_str()).unwrap(), t);
        }
        assert!(MessageType::parse("FAX").is_err());
        assert_eq!(
            serde_json::to_string(&MessageType::SmsGsm).unwrap(),
            "\"SMS_GSM\""
        );
    }

    fn any_type() -> impl Strategy<Value = MessageType> {
        prop_oneof![
            Just(MessageType::SmsGsm),
            Just(MessageType::SmsCdma),
            Just(MessageType::Mms),
            Just(MessageType::Email),
        ]
    }

    proptest! {
        #[test]
        fn handle_round_trip(id in 0..=MAX_STORE_ID, msg_type in any_type()) {
            let handle = MessageHandle::new(id, msg_type).unwrap();
            let text = handle.to_string();
            prop_assert_eq!(text.len(), 16);
            prop_assert_eq!(MessageHandle::parse(&text).unwrap(), handle);
        }
    }
}
