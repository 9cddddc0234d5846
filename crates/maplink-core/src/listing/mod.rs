//! Message listing builder.
//!
//! Turns filtered [`ListingEntry`] rows into the `x-bt/MAP-msg-listing`
//! XML object. Which attributes appear is controlled by the request's
//! parameter mask; `handle` and `datetime` are always present.

mod entry;
mod filter;

pub use entry::{ListingEntry, ReceptionStatus};
pub use filter::MessageFilter;

use maplink_obex::AppParams;
use maplink_obex::app_params::PERIOD_FORMAT;
use xml::writer::{EmitterConfig, XmlEvent};

use crate::error::Result;

/// Parameter mask bits.
pub mod mask {
    /// `subject`
    pub const SUBJECT: u32 = 0x0001;
    /// `datetime`
    pub const DATETIME: u32 = 0x0002;
    /// `sender_name`
    pub const SENDER_NAME: u32 = 0x0004;
    /// `sender_addressing`
    pub const SENDER_ADDRESSING: u32 = 0x0008;
    /// `recipient_name`
    pub const RECIPIENT_NAME: u32 = 0x0010;
    /// `recipient_addressing`
    pub const RECIPIENT_ADDRESSING: u32 = 0x0020;
    /// `type`
    pub const TYPE: u32 = 0x0040;
    /// `size`
    pub const SIZE: u32 = 0x0080;
    /// `reception_status`
    pub const RECEPTION_STATUS: u32 = 0x0100;
    /// `text`
    pub const TEXT: u32 = 0x0200;
    /// `attachment_size`
    pub const ATTACHMENT_SIZE: u32 = 0x0400;
    /// `priority`
    pub const PRIORITY: u32 = 0x0800;
    /// `read`
    pub const READ: u32 = 0x1000;
    /// `sent`
    pub const SENT: u32 = 0x2000;
    /// `protected`
    pub const PROTECTED: u32 = 0x4000;
    /// `replyto_addressing`
    pub const REPLYTO_ADDRESSING: u32 = 0x8000;
    /// Every attribute.
    pub const ALL: u32 = 0xFFFF;
}

/// Default `max-list-count`.
pub const DEFAULT_MAX_LIST_COUNT: u16 = 1024;

/// Default subject truncation in characters.
pub const DEFAULT_SUBJECT_LENGTH: usize = 256;

/// Windowing and rendering options of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    /// Largest number of entries rendered; 0 renders none.
    pub max_list_count: u16,
    /// Number of leading entries skipped.
    pub start_offset: u16,
    /// Attribute selection.
    pub parameter_mask: u32,
    /// Subject truncation in characters.
    pub subject_length: usize,
    /// Whether `thread_id` attributes are written.
    pub include_thread_id: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            max_list_count: DEFAULT_MAX_LIST_COUNT,
            start_offset: 0,
            parameter_mask: mask::ALL,
            subject_length: DEFAULT_SUBJECT_LENGTH,
            include_thread_id: false,
        }
    }
}

impl ListingOptions {
    /// Reads the listing parameters of a request. An absent or zero
    /// parameter mask selects every attribute.
    #[must_use]
    pub fn from_params(params: &AppParams, include_thread_id: bool) -> Self {
        Self {
            max_list_count: params.max_list_count.unwrap_or(DEFAULT_MAX_LIST_COUNT),
            start_offset: params.start_offset.unwrap_or(0),
            parameter_mask: params
                .parameter_mask
                .filter(|&m| m != 0)
                .unwrap_or(mask::ALL),
            subject_length: params
                .subject_length
                .map_or(DEFAULT_SUBJECT_LENGTH, |n| usize::from(n.get())),
            include_thread_id,
        }
    }
}

/// A windowed message listing.
#[derive(Debug, Clone)]
pub struct MessageListing {
    entries: Vec<ListingEntry>,
    total: usize,
    has_unread: bool,
    options: ListingOptions,
}

impl MessageListing {
    /// Windows already-filtered entries.
    ///
    /// `total` and `has_unread` cover every entry, not just the window.
    #[must_use]
    pub fn build(entries: Vec<ListingEntry>, options: ListingOptions) -> Self {
        let total = entries.len();
        let has_unread = entries.iter().any(|e| !e.read);
        let entries = entries
            .into_iter()
            .skip(usize::from(options.start_offset))
            .take(usize::from(options.max_list_count))
            .collect();
        Self {
            entries,
            total,
            has_unread,
            options,
        }
    }

    /// Entries inside the window.
    #[must_use]
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Number of matching entries before windowing.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Whether any matching entry is unread.
    #[must_use]
    pub const fn has_unread(&self) -> bool {
        self.has_unread
    }

    /// Renders the listing XML.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML writer fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .create_writer(&mut buf);
        writer.write(XmlEvent::start_element("MAP-msg-listing").attr("version", "1.0"))?;
        for entry in &self.entries {
            let attributes = self.attributes(entry);
            let mut element = XmlEvent::start_element("msg");
            for (name, value) in &attributes {
                element = element.attr(*name, value.as_str());
            }
            writer.write(element)?;
            writer.write(XmlEvent::end_element())?;
        }
        writer.write(XmlEvent::end_element())?;
        Ok(buf)
    }

    fn attributes(&self, entry: &ListingEntry) -> Vec<(&'static str, String)> {
        let selected = self.options.parameter_mask;
        let on = |bit: u32| selected & bit != 0;
        let mut attrs = vec![("handle", entry.handle.to_string())];

        if on(mask::SUBJECT) {
            let subject: String = entry.subject.chars().take(self.options.subject_length).collect();
            attrs.push(("subject", xml_text(&subject)));
        }
        attrs.push(("datetime", entry.datetime.format(PERIOD_FORMAT).to_string()));
        if on(mask::SENDER_NAME) {
            attrs.push(("sender_name", xml_text(&entry.sender_name)));
        }
        if on(mask::SENDER_ADDRESSING) {
            attrs.push(("sender_addressing", xml_text(&entry.sender_addressing)));
        }
        if on(mask::REPLYTO_ADDRESSING) && !entry.replyto_addressing.is_empty() {
            attrs.push(("replyto_addressing", xml_text(&entry.replyto_addressing)));
        }
        if on(mask::RECIPIENT_NAME) {
            attrs.push(("recipient_name", xml_text(&entry.recipient_name)));
        }
        if on(mask::RECIPIENT_ADDRESSING) {
            attrs.push(("recipient_addressing", xml_text(&entry.recipient_addressing)));
        }
        if on(mask::TYPE) {
            attrs.push(("type", entry.msg_type().as_str().to_string()));
        }
        if on(mask::SIZE) {
            attrs.push(("size", entry.size.to_string()));
        }
        if on(mask::TEXT) {
            attrs.push(("text", yes_no(entry.text)));
        }
        if on(mask::RECEPTION_STATUS) {
            attrs.push(("reception_status", entry.reception_status.as_str().to_string()));
        }
        if on(mask::ATTACHMENT_SIZE) {
            attrs.push(("attachment_size", entry.attachment_size.to_string()));
        }
        if on(mask::PRIORITY) {
            attrs.push(("priority", yes_no(entry.priority)));
        }
        if on(mask::READ) {
            attrs.push(("read", yes_no(entry.read)));
        }
        if on(mask::SENT) {
            attrs.push(("sent", yes_no(entry.sent)));
        }
        if on(mask::PROTECTED) {
            attrs.push(("protected", yes_no(entry.protected)));
        }
        if self.options.include_thread_id {
            if let Some(thread) = entry.thread_id {
                attrs.push(("thread_id", thread.to_string()));
            }
        }
        attrs
    }
}

fn yes_no(flag: bool) -> String {
    String::from(if flag { "yes" } else { "no" })
}

/// Drops characters XML 1.0 cannot carry.
fn xml_text(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c,
                '\t' | '\n' | '\r'
                | '\u{20}'..='\u{D7FF}'
                | '\u{E000}'..='\u{FFFD}'
                | '\u{10000}'..='\u{10FFFF}')
        })
        .collect()
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
    use crate::types::{MessageHandle, MessageType};
    use chrono::NaiveDate;
    use std::num::NonZeroU8;

    fn entries(n: u64) -> Vec<ListingEntry> {
        (1..=n)
            .map(|i| {
                let when = NaiveDate::from_ymd_opt(2024, 3, 5)
                    .unwrap()
                    .and_hms_opt(14, 7, 9)
                    .unwrap();
                let mut entry = ListingEntry::new(
                    MessageHandle::new(i, MessageType::SmsGsm).unwrap(),
                    format!("subject {i}"),
                    when,
                );
                entry.read = i != 3;
                entry.thread_id = Some(77);
                entry
            })
            .collect()
    }

    fn xml(listing: &MessageListing) -> String {
        String::from_utf8(listing.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_window_offset_and_max() {
        let options = ListingOptions {
            start_offset: 2,
            max_list_count: 2,
            ..ListingOptions::default()
        };
        let listing = MessageListing::build(entries(5), options);
        assert_eq!(listing.total(), 5);
        assert!(listing.has_unread());
        let ids: Vec<u64> = listing.entries().iter().map(|e| e.handle.id()).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let options = ListingOptions {
            start_offset: 9,
            ..ListingOptions::default()
        };
        let listing = MessageListing::build(entries(5), options);
        assert!(listing.entries().is_empty());
        assert_eq!(listing.total(), 5);
    }

    #[test]
    fn test_unread_counts_outside_window() {
        let options = ListingOptions {
            max_list_count: 1,
            ..ListingOptions::default()
        };
        let listing = MessageListing::build(entries(5), options);
        assert!(listing.entries()[0].read);
        assert!(listing.has_unread());
    }

    #[test]
    fn test_full_attributes() {
        let listing = MessageListing::build(entries(1), ListingOptions::default());
        let text = xml(&listing);
        assert!(text.contains("<MAP-msg-listing version=\"1.0\">"));
        assert!(text.contains("handle=\"2000000000000001\""));
        assert!(text.contains("subject=\"subject 1\""));
        assert!(text.contains("datetime=\"20240305T140709\""));
        assert!(text.contains("type=\"SMS_GSM\""));
        assert!(text.contains("reception_status=\"complete\""));
        assert!(text.contains("read=\"yes\""));
        assert!(!text.contains("replyto_addressing"));
        assert!(!text.contains("thread_id"));
    }

    #[test]
    fn test_mask_limits_attributes() {
        let params = AppParams {
            parameter_mask: Some(mask::READ),
            subject_length: NonZeroU8::new(3),
            ..AppParams::default()
        };
        let options = ListingOptions::from_params(&params, true);
        let text = xml(&MessageListing::build(entries(1), options));
        assert!(text.contains("handle="));
        assert!(text.contains("datetime="));
        assert!(text.contains("read=\"yes\""));
        assert!(text.contains("thread_id=\"77\""));
        assert!(!text.contains("subject="));
        assert!(!text.contains("type="));
    }

    #[test]
    fn test_subject_truncation_and_sanitising() {
        let mut rows = entries(1);
        rows[0].subject = "ab\u{1}cdef".into();
        let options = ListingOptions {
            subject_length: 4,
            ..ListingOptions::default()
        };
        let text = xml(&MessageListing::build(rows, options));
        assert!(text.contains("subject=\"abc\""));
    }

    #[test]
    fn test_option_defaults() {
        let options = ListingOptions::from_params(&AppParams::default(), false);
        assert_eq!(options, ListingOptions::default());

        let params = AppParams {
            parameter_mask: Some(0),
            ..AppParams::default()
        };
        assert_eq!(ListingOptions::from_params(&params, false).parameter_mask, mask::ALL);
    }
}
