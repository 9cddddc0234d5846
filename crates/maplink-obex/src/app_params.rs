//! MAP application parameters.
//!
//! The `AppParameters` OBEX header carries a flat sequence of
//! `tag:u8 len:u8 value[len]` entries. Every field is optional; `None` is the
//! unset state and encodes to nothing.
//!
//! Decoding is lenient where peers are known to be sloppy (unknown tags, wrong
//! fixed lengths) and strict where a value would be misinterpreted (truncated
//! entries, out-of-range enums, unparsable dates).

use std::num::NonZeroU8;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tracing::debug;

use crate::{Error, Result};

/// Layout of filter period values.
pub const PERIOD_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Layout of the MSE time value.
pub const MSE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%z";

mod tag {
    pub const MAX_LIST_COUNT: u8 = 0x01;
    pub const START_OFFSET: u8 = 0x02;
    pub const FILTER_MESSAGE_TYPE: u8 = 0x03;
    pub const FILTER_PERIOD_BEGIN: u8 = 0x04;
    pub const FILTER_PERIOD_END: u8 = 0x05;
    pub const FILTER_READ_STATUS: u8 = 0x06;
    pub const FILTER_RECIPIENT: u8 = 0x07;
    pub const FILTER_ORIGINATOR: u8 = 0x08;
    pub const FILTER_PRIORITY: u8 = 0x09;
    pub const ATTACHMENT: u8 = 0x0A;
    pub const TRANSPARENT: u8 = 0x0B;
    pub const RETRY: u8 = 0x0C;
    pub const NEW_MESSAGE: u8 = 0x0D;
    pub const NOTIFICATION_STATUS: u8 = 0x0E;
    pub const MAS_INSTANCE_ID: u8 = 0x0F;
    pub const PARAMETER_MASK: u8 = 0x10;
    pub const FOLDER_LISTING_SIZE: u8 = 0x11;
    pub const MESSAGES_LISTING_SIZE: u8 = 0x12;
    pub const SUBJECT_LENGTH: u8 = 0x13;
    pub const CHARSET: u8 = 0x14;
    pub const FRACTION_REQUEST: u8 = 0x15;
    pub const FRACTION_DELIVER: u8 = 0x16;
    pub const STATUS_INDICATOR: u8 = 0x17;
    pub const STATUS_VALUE: u8 = 0x18;
    pub const MSE_TIME: u8 = 0x19;
    pub const MAP_SUPPORTED_FEATURES: u8 = 0x29;
}

/// Declares a one-byte enum with a checked `TryFrom<u8>`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Wire value.
            #[must_use]
            pub const fn as_u8(self) -> u8 {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = Error;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(Error::Range(format!(
                        concat!(stringify!($name), " value {}"),
                        other
                    ))),
                }
            }
        }
    };
}

wire_enum! {
    /// Read-status filter of a listing request.
    ReadStatusFilter {
        /// No filtering.
        All = 0,
        /// Unread messages only.
        UnreadOnly = 1,
        /// Read messages only.
        ReadOnly = 2,
    }
}

wire_enum! {
    /// Priority filter of a listing request.
    PriorityFilter {
        /// No filtering.
        All = 0,
        /// High-priority messages only.
        HighOnly = 1,
        /// Non-high-priority messages only.
        NonHighOnly = 2,
    }
}

wire_enum! {
    /// Requested message charset.
    Charset {
        /// Native (SMS PDU) encoding.
        Native = 0,
        /// UTF-8 text.
        Utf8 = 1,
    }
}

wire_enum! {
    /// Which fraction of a message the client asks for.
    FractionRequest {
        /// The first fraction.
        First = 0,
        /// The following fraction.
        Next = 1,
    }
}

wire_enum! {
    /// Whether more fractions follow the delivered one.
    FractionDeliver {
        /// More fractions are available.
        More = 0,
        /// This is the last fraction.
        Last = 1,
    }
}

wire_enum! {
    /// Which status a `messageStatus` PUT changes.
    StatusIndicator {
        /// The read flag.
        ReadStatus = 0,
        /// The deleted flag.
        DeletedStatus = 1,
    }
}

/// Message-type exclusion mask of a listing request.
///
/// A set bit removes that type from the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageTypeFilter(u8);

impl MessageTypeFilter {
    /// Excludes GSM SMS.
    pub const SMS_GSM: u8 = 0x01;
    /// Excludes CDMA SMS.
    pub const SMS_CDMA: u8 = 0x02;
    /// Excludes email.
    pub const EMAIL: u8 = 0x04;
    /// Excludes MMS.
    pub const MMS: u8 = 0x08;

    /// Creates a mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if bits above `0x0F` are set.
    pub fn new(bits: u8) -> Result<Self> {
        if bits > 0x0F {
            return Err(Error::Range(format!("filter message type 0x{bits:02X}")));
        }
        Ok(Self(bits))
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if `bit` is excluded.
    #[must_use]
    pub const fn excludes(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Decoded MAP application parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppParams {
    /// Maximum number of entries in a listing.
    pub max_list_count: Option<u16>,
    /// Offset of the first listing entry.
    pub start_offset: Option<u16>,
    /// Message types to exclude.
    pub filter_message_type: Option<MessageTypeFilter>,
    /// Oldest message time to include.
    pub filter_period_begin: Option<NaiveDateTime>,
    /// Newest message time to include.
    pub filter_period_end: Option<NaiveDateTime>,
    /// Read-status filter.
    pub filter_read_status: Option<ReadStatusFilter>,
    /// Recipient pattern (`*` wildcards).
    pub filter_recipient: Option<String>,
    /// Originator pattern (`*` wildcards).
    pub filter_originator: Option<String>,
    /// Priority filter.
    pub filter_priority: Option<PriorityFilter>,
    /// Include attachments in a fetched message.
    pub attachment: Option<bool>,
    /// Do not keep a copy of a pushed message in the sent folder.
    pub transparent: Option<bool>,
    /// Retry sending a pushed message.
    pub retry: Option<bool>,
    /// Unread messages exist in the listing.
    pub new_message: Option<bool>,
    /// Turn event notifications on or off.
    pub notification_status: Option<bool>,
    /// MAS instance the request concerns.
    pub mas_instance_id: Option<u8>,
    /// Listing attribute selection.
    pub parameter_mask: Option<u32>,
    /// Number of folders in a folder listing.
    pub folder_listing_size: Option<u16>,
    /// Number of messages in a message listing.
    pub messages_listing_size: Option<u16>,
    /// Maximum subject length in a listing.
    pub subject_length: Option<NonZeroU8>,
    /// Requested message charset.
    pub charset: Option<Charset>,
    /// Requested message fraction.
    pub fraction_request: Option<FractionRequest>,
    /// Delivered message fraction.
    pub fraction_deliver: Option<FractionDeliver>,
    /// Status changed by a `messageStatus` PUT.
    pub status_indicator: Option<StatusIndicator>,
    /// New value for the status.
    pub status_value: Option<bool>,
    /// Current time on the server.
    pub mse_time: Option<DateTime<FixedOffset>>,
    /// Feature bits the peer supports.
    pub map_supported_features: Option<u32>,
}

impl AppParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Decodes a TLV block.
    ///
    /// # Errors
    ///
    /// - [`Error::Format`] if an entry overruns the input or a string or date
    ///   value cannot be parsed.
    /// - [`Error::Range`] if an enumerated value is out of range.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut params = Self::default();
        let mut pos = 0;

        while pos < bytes.len() {
            let Some(&[id, len]) = bytes.get(pos..pos + 2) else {
                return Err(Error::Format(format!(
                    "truncated app parameter header at offset {pos}"
                )));
            };
            pos += 2;

            let len = usize::from(len);
            let value = bytes.get(pos..pos + len).ok_or_else(|| {
                Error::Format(format!(
                    "app parameter 0x{id:02X} declares {len} bytes, {} remain",
                    bytes.len() - pos
                ))
            })?;
            pos += len;

            params.apply(id, value)?;
        }

        Ok(params)
    }

    fn apply(&mut self, id: u8, value: &[u8]) -> Result<()> {
        match id {
            tag::MAX_LIST_COUNT => {
                set(&mut self.max_list_count, fixed(id, value).map(u16::from_be_bytes));
            }
            tag::START_OFFSET => {
                set(&mut self.start_offset, fixed(id, value).map(u16::from_be_bytes));
            }
            tag::FILTER_MESSAGE_TYPE => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.filter_message_type = Some(MessageTypeFilter::new(b & 0x0F)?);
                }
            }
            tag::FILTER_PERIOD_BEGIN => {
                if !value.is_empty() {
                    self.filter_period_begin = Some(parse_period(value)?);
                }
            }
            tag::FILTER_PERIOD_END => {
                if !value.is_empty() {
                    self.filter_period_end = Some(parse_period(value)?);
                }
            }
            tag::FILTER_READ_STATUS => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.filter_read_status = Some(ReadStatusFilter::try_from(b & 0x03)?);
                }
            }
            tag::FILTER_RECIPIENT => self.filter_recipient = Some(parse_text(id, value)?),
            tag::FILTER_ORIGINATOR => self.filter_originator = Some(parse_text(id, value)?),
            tag::FILTER_PRIORITY => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.filter_priority = Some(PriorityFilter::try_from(b & 0x03)?);
                }
            }
            tag::ATTACHMENT => set(&mut self.attachment, flag(id, value)),
            tag::TRANSPARENT => set(&mut self.transparent, flag(id, value)),
            tag::RETRY => set(&mut self.retry, flag(id, value)),
            tag::NEW_MESSAGE => set(&mut self.new_message, flag(id, value)),
            tag::NOTIFICATION_STATUS => set(&mut self.notification_status, flag(id, value)),
            tag::MAS_INSTANCE_ID => {
                set(&mut self.mas_instance_id, fixed(id, value).map(u8::from_be_bytes));
            }
            tag::PARAMETER_MASK => {
                set(&mut self.parameter_mask, fixed(id, value).map(u32::from_be_bytes));
            }
            tag::FOLDER_LISTING_SIZE => {
                set(&mut self.folder_listing_size, fixed(id, value).map(u16::from_be_bytes));
            }
            tag::MESSAGES_LISTING_SIZE => {
                set(&mut self.messages_listing_size, fixed(id, value).map(u16::from_be_bytes));
            }
            tag::SUBJECT_LENGTH => {
                if let Some([b]) = fixed::<1>(id, value) {
                    let length = NonZeroU8::new(b)
                        .ok_or_else(|| Error::Range("subject length 0".to_string()))?;
                    self.subject_length = Some(length);
                }
            }
            tag::CHARSET => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.charset = Some(Charset::try_from(b)?);
                }
            }
            tag::FRACTION_REQUEST => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.fraction_request = Some(FractionRequest::try_from(b)?);
                }
            }
            tag::FRACTION_DELIVER => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.fraction_deliver = Some(FractionDeliver::try_from(b)?);
                }
            }
            tag::STATUS_INDICATOR => {
                if let Some([b]) = fixed::<1>(id, value) {
                    self.status_indicator = Some(StatusIndicator::try_from(b)?);
                }
            }
            tag::STATUS_VALUE => set(&mut self.status_value, flag(id, value)),
            tag::MSE_TIME => {
                let text = parse_text(id, value)?;
                let time = DateTime::parse_from_str(&text, MSE_TIME_FORMAT)
                    .map_err(|e| Error::Format(format!("mse time {text:?}: {e}")))?;
                self.mse_time = Some(time);
            }
            tag::MAP_SUPPORTED_FEATURES => {
                set(&mut self.map_supported_features, fixed(id, value).map(u32::from_be_bytes));
            }
            other => debug!(tag = other, len = value.len(), "skipping unknown app parameter"),
        }
        Ok(())
    }

    /// Encodes the set fields in ascending tag order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Range`] if a string value does not fit the one-byte
    /// length field.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();

        if let Some(v) = self.max_list_count {
            put_entry(&mut buf, tag::MAX_LIST_COUNT, &v.to_be_bytes())?;
        }
        if let Some(v) = self.start_offset {
            put_entry(&mut buf, tag::START_OFFSET, &v.to_be_bytes())?;
        }
        if let Some(v) = self.filter_message_type {
            put_entry(&mut buf, tag::FILTER_MESSAGE_TYPE, &[v.bits()])?;
        }
        if let Some(v) = self.filter_period_begin {
            let text = v.format(PERIOD_FORMAT).to_string();
            put_entry(&mut buf, tag::FILTER_PERIOD_BEGIN, text.as_bytes())?;
        }
        if let Some(v) = self.filter_period_end {
            let text = v.format(PERIOD_FORMAT).to_string();
            put_entry(&mut buf, tag::FILTER_PERIOD_END, text.as_bytes())?;
        }
        if let Some(v) = self.filter_read_status {
            put_entry(&mut buf, tag::FILTER_READ_STATUS, &[v.as_u8()])?;
        }
        if let Some(v) = &self.filter_recipient {
            put_entry(&mut buf, tag::FILTER_RECIPIENT, &nul_terminated(v))?;
        }
        if let Some(v) = &self.filter_originator {
            put_entry(&mut buf, tag::FILTER_ORIGINATOR, &nul_terminated(v))?;
        }
        if let Some(v) = self.filter_priority {
            put_entry(&mut buf, tag::FILTER_PRIORITY, &[v.as_u8()])?;
        }

        let flags = [
            (tag::ATTACHMENT, self.attachment),
            (tag::TRANSPARENT, self.transparent),
            (tag::RETRY, self.retry),
            (tag::NEW_MESSAGE, self.new_message),
            (tag::NOTIFICATION_STATUS, self.notification_status),
        ];
        for (id, value) in flags {
            if let Some(v) = value {
                put_entry(&mut buf, id, &[u8::from(v)])?;
            }
        }

        if let Some(v) = self.mas_instance_id {
            put_entry(&mut buf, tag::MAS_INSTANCE_ID, &[v])?;
        }
        if let Some(v) = self.parameter_mask {
            put_entry(&mut buf, tag::PARAMETER_MASK, &v.to_be_bytes())?;
        }
        if let Some(v) = self.folder_listing_size {
            put_entry(&mut buf, tag::FOLDER_LISTING_SIZE, &v.to_be_bytes())?;
        }
        if let Some(v) = self.messages_listing_size {
            put_entry(&mut buf, tag::MESSAGES_LISTING_SIZE, &v.to_be_bytes())?;
        }
        if let Some(v) = self.subject_length {
            put_entry(&mut buf, tag::SUBJECT_LENGTH, &[v.get()])?;
        }
        if let Some(v) = self.charset {
            put_entry(&mut buf, tag::CHARSET, &[v.as_u8()])?;
        }
        if let Some(v) = self.fraction_request {
            put_entry(&mut buf, tag::FRACTION_REQUEST, &[v.as_u8()])?;
        }
        if let Some(v) = self.fraction_deliver {
            put_entry(&mut buf, tag::FRACTION_DELIVER, &[v.as_u8()])?;
        }
        if let Some(v) = self.status_indicator {
            put_entry(&mut buf, tag::STATUS_INDICATOR, &[v.as_u8()])?;
        }
        if let Some(v) = self.status_value {
            put_entry(&mut buf, tag::STATUS_VALUE, &[u8::from(v)])?;
        }
        if let Some(v) = self.mse_time {
            let text = v.format(MSE_TIME_FORMAT).to_string();
            put_entry(&mut buf, tag::MSE_TIME, text.as_bytes())?;
        }
        if let Some(v) = self.map_supported_features {
            put_entry(&mut buf, tag::MAP_SUPPORTED_FEATURES, &v.to_be_bytes())?;
        }

        Ok(buf.freeze())
    }
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Reads a fixed-width value, logging and ignoring a length mismatch.
fn fixed<const N: usize>(id: u8, value: &[u8]) -> Option<[u8; N]> {
    let array = <[u8; N]>::try_from(value).ok();
    if array.is_none() {
        debug!(
            tag = id,
            len = value.len(),
            expected = N,
            "ignoring app parameter with wrong length"
        );
    }
    array
}

fn flag(id: u8, value: &[u8]) -> Option<bool> {
    fixed::<1>(id, value).map(|[b]| b & 0x01 != 0)
}

fn parse_text(id: u8, value: &[u8]) -> Result<String> {
    let value = value.strip_suffix(&[0]).unwrap_or(value);
    String::from_utf8(value.to_vec())
        .map_err(|e| Error::Format(format!("app parameter 0x{id:02X} is not UTF-8: {e}")))
}

fn parse_period(value: &[u8]) -> Result<NaiveDateTime> {
    let text = parse_text(tag::FILTER_PERIOD_BEGIN, value)?;
    NaiveDateTime::parse_from_str(&text, PERIOD_FORMAT)
        .map_err(|e| Error::Format(format!("filter period {text:?}: {e}")))
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

fn put_entry(buf: &mut BytesMut, id: u8, value: &[u8]) -> Result<()> {
    let len = u8::try_from(value.len()).map_err(|_| {
        Error::Range(format!(
            "app parameter 0x{id:02X} value of {} bytes",
            value.len()
        ))
    })?;
    buf.put_u8(id);
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
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
    use chrono::NaiveDate;
    use proptest::prelude::*;

    #[test]
    fn test_decode_max_list_count() {
        let params = AppParams::decode(&[0x01, 0x02, 0x00, 0x0A]).unwrap();
        assert_eq!(params.max_list_count, Some(10));
        assert_eq!(params.start_offset, None);
    }

    #[test]
    fn test_decode_empty() {
        assert!(AppParams::decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_overrun_is_format_error() {
        let err = AppParams::decode(&[0x01, 0x04, 0x00, 0x0A]).unwrap_err();
        assert!(matches!(err, Error::Format(_)));

        let err = AppParams::decode(&[0x02]).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_decode_wrong_fixed_length_is_skipped() {
        let bytes = [0x01, 0x01, 0x05, 0x02, 0x02, 0x00, 0x03];
        let params = AppParams::decode(&bytes).unwrap();
        assert_eq!(params.max_list_count, None);
        assert_eq!(params.start_offset, Some(3));
    }

    #[test]
    fn test_decode_unknown_tag_is_skipped() {
        let bytes = [0x7E, 0x03, 1, 2, 3, 0x0F, 0x01, 0x02];
        let params = AppParams::decode(&bytes).unwrap();
        assert_eq!(params.mas_instance_id, Some(2));
    }

    #[test]
    fn test_decode_read_status_out_of_range() {
        let err = AppParams::decode(&[0x06, 0x01, 0x03]).unwrap_err();
        assert!(matches!(err, Error::Range(_)));
    }

    #[test]
    fn test_decode_masks_flags() {
        let params = AppParams::decode(&[0x0A, 0x01, 0xFE, 0x03, 0x01, 0xF5]).unwrap();
        assert_eq!(params.attachment, Some(false));
        assert_eq!(params.filter_message_type.map(MessageTypeFilter::bits), Some(0x05));
    }

    #[test]
    fn test_decode_subject_length_zero_is_range_error() {
        let err = AppParams::decode(&[0x13, 0x01, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Range(_)));
    }

    #[test]
    fn test_decode_period_and_text() {
        let mut bytes = vec![0x04, 15];
        bytes.extend_from_slice(b"20240305T140709");
        bytes.extend_from_slice(&[0x05, 0]);
        bytes.extend_from_slice(&[0x08, 6]);
        bytes.extend_from_slice(b"*5551\0");

        let params = AppParams::decode(&bytes).unwrap();
        assert_eq!(
            params.filter_period_begin,
            NaiveDate::from_ymd_opt(2024, 3, 5).and_then(|d| d.and_hms_opt(14, 7, 9))
        );
        assert_eq!(params.filter_period_end, None);
        assert_eq!(params.filter_originator.as_deref(), Some("*5551"));
    }

    #[test]
    fn test_decode_bad_period_is_format_error() {
        let mut bytes = vec![0x04, 8];
        bytes.extend_from_slice(b"20240305");
        assert!(matches!(AppParams::decode(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_encode_order_and_layout() {
        let params = AppParams {
            charset: Some(Charset::Utf8),
            max_list_count: Some(0x0102),
            filter_recipient: Some("bob".to_string()),
            ..AppParams::default()
        };
        let bytes = params.encode().unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x01, 0x02, 0x01, 0x02, 0x07, 0x04, b'b', b'o', b'b', 0x00, 0x14, 0x01, 0x01]
        );
    }

    #[test]
    fn test_encode_rejects_oversized_text() {
        let params = AppParams {
            filter_originator: Some("x".repeat(255)),
            ..AppParams::default()
        };
        assert!(matches!(params.encode(), Err(Error::Range(_))));
    }

    #[test]
    fn test_mse_time_roundtrip() {
        let params = AppParams {
            mse_time: DateTime::parse_from_rfc3339("2024-03-05T14:07:09-05:30").ok(),
            ..AppParams::default()
        };
        let bytes = params.encode().unwrap();
        assert_eq!(&bytes[2..], b"20240305T140709-0530");
        assert_eq!(AppParams::decode(&bytes).unwrap(), params);
    }

    fn naive_time() -> impl Strategy<Value = NaiveDateTime> {
        (0i64..4_102_444_800).prop_map(|secs| {
            DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
        })
    }

    fn mse_time() -> impl Strategy<Value = DateTime<FixedOffset>> {
        (naive_time(), -47i32..=47).prop_map(|(t, quarter_hours)| {
            let offset = FixedOffset::east_opt(quarter_hours * 15 * 60).unwrap();
            DateTime::from_naive_utc_and_offset(t, offset)
        })
    }

    prop_compose! {
        fn filters()(
            max_list_count in any::<Option<u16>>(),
            start_offset in any::<Option<u16>>(),
            filter_message_type in proptest::option::of(0u8..=0x0F),
            filter_period_begin in proptest::option::of(naive_time()),
            filter_period_end in proptest::option::of(naive_time()),
            filter_read_status in proptest::option::of(0u8..=2),
            filter_recipient in proptest::option::of("[a-z0-9*@.+ ]{0,40}"),
            filter_originator in proptest::option::of("[A-Za-z0-9*@.+ ]{0,40}"),
            filter_priority in proptest::option::of(0u8..=2),
        ) -> AppParams {
            AppParams {
                max_list_count,
                start_offset,
                filter_message_type: filter_message_type
                    .map(|b| MessageTypeFilter::new(b).unwrap()),
                filter_period_begin,
                filter_period_end,
                filter_read_status: filter_read_status
                    .map(|b| ReadStatusFilter::try_from(b).unwrap()),
                filter_recipient,
                filter_originator,
                filter_priority: filter_priority.map(|b| PriorityFilter::try_from(b).unwrap()),
                ..AppParams::default()
            }
        }
    }

    prop_compose! {
        fn app_params()(
            base in filters(),
            flags in any::<[Option<bool>; 6]>(),
            mas_instance_id in any::<Option<u8>>(),
            parameter_mask in any::<Option<u32>>(),
            sizes in any::<(Option<u16>, Option<u16>)>(),
            subject_length in proptest::option::of(1u8..=255),
            enums in any::<[Option<bool>; 4]>(),
            mse_time in proptest::option::of(mse_time()),
            map_supported_features in any::<Option<u32>>(),
        ) -> AppParams {
            let pick = |v: Option<bool>| v.map(u8::from);
            AppParams {
                attachment: flags[0],
                transparent: flags[1],
                retry: flags[2],
                new_message: flags[3],
                notification_status: flags[4],
                status_value: flags[5],
                mas_instance_id,
                parameter_mask,
                folder_listing_size: sizes.0,
                messages_listing_size: sizes.1,
                subject_length: subject_length.and_then(NonZeroU8::new),
                charset: pick(enums[0]).map(|b| Charset::try_from(b).unwrap()),
                fraction_request: pick(enums[1]).map(|b| FractionRequest::try_from(b).unwrap()),
                fraction_deliver: pick(enums[2]).map(|b| FractionDeliver::try_from(b).unwrap()),
                status_indicator: pick(enums[3]).map(|b| StatusIndicator::try_from(b).unwrap()),
                mse_time,
                map_supported_features,
                ..base
            }
        }
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(params in app_params()) {
            let bytes = params.encode().unwrap();
            prop_assert_eq!(AppParams::decode(&bytes).unwrap(), params);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = AppParams::decode(&bytes);
        }
    }
}
