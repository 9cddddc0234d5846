//! The bMessage object codec.
//!
//! A bMessage is the textual message object MAP exchanges for GET and push:
//!
//! ```text
//! BEGIN:BMSG
//! VERSION:1.0
//! STATUS:UNREAD
//! TYPE:SMS_GSM
//! FOLDER:telecom/msg/inbox
//! BEGIN:VCARD ... END:VCARD        originators
//! BEGIN:BENV
//!   BEGIN:VCARD ... END:VCARD      recipients
//!   BEGIN:BBODY
//!   CHARSET:UTF-8
//!   LENGTH:33
//!   BEGIN:MSG
//!   hello world
//!   END:MSG
//!   END:BBODY
//! END:BENV
//! END:BMSG
//! ```
//!
//! SMS content is a list of text fragments. MMS and email content is a MIME
//! message handled by `maplink-mime`.

mod encode;
mod parse;
mod reader;
mod vcard;

use maplink_mime::MimeMessage;

pub use vcard::{VCard, VCardVersion, network_portion};

use crate::types::{MessageType, ReadStatus};

/// Optional `BBODY` header lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyProperties {
    /// Fragment number of a multi-part message.
    pub part_id: Option<u32>,
    /// Content encoding (e.g. `8BIT`).
    pub encoding: Option<String>,
    /// Body charset (e.g. `UTF-8`).
    pub charset: Option<String>,
    /// Body language.
    pub language: Option<String>,
}

/// SMS text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmsBody {
    /// One entry per `BEGIN:MSG` block.
    pub fragments: Vec<String>,
}

impl SmsBody {
    /// Creates a single-fragment body.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
        }
    }

    /// All fragments joined.
    #[must_use]
    pub fn text(&self) -> String {
        self.fragments.concat()
    }
}

/// Message content.
#[derive(Debug, Clone, PartialEq)]
pub enum BMessageBody {
    /// SMS text.
    Sms(SmsBody),
    /// MMS or email MIME message.
    Mime(MimeMessage),
}

/// A parsed or to-be-encoded bMessage.
#[derive(Debug, Clone, PartialEq)]
pub struct BMessage {
    /// Read status.
    pub status: ReadStatus,
    /// Message type.
    pub msg_type: MessageType,
    /// Folder path, e.g. `telecom/msg/inbox`.
    pub folder: String,
    /// Originator vCards.
    pub originators: Vec<VCard>,
    /// Recipient vCards with their envelope levels.
    pub recipients: Vec<VCard>,
    /// Body header lines.
    pub properties: BodyProperties,
    /// Content.
    pub body: BMessageBody,
}

impl BMessage {
    /// Creates a message with no vCards and default body properties.
    #[must_use]
    pub fn new(msg_type: MessageType, folder: impl Into<String>, body: BMessageBody) -> Self {
        Self {
            status: ReadStatus::Unread,
            msg_type,
            folder: folder.into(),
            originators: Vec::new(),
            recipients: Vec::new(),
            properties: BodyProperties::default(),
            body,
        }
    }

    /// Plain text of the message, if it has any.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match &self.body {
            BMessageBody::Sms(sms) => Some(sms.text()),
            BMessageBody::Mime(mime) => mime.text().ok(),
        }
    }
}

/// Prefixes every `END:MSG` with `/` so it cannot end a block.
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace("END:MSG", "/END:MSG")
}

/// Reverses [`escape`].
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("/END:MSG", "END:MSG")
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
    use maplink_mime::{Address, MimePart};
    use maplink_obex::Charset;
    use proptest::prelude::*;

    const SCENARIO_SMS: &str = "BEGIN:BMSG\r\nVERSION:1.0\r\nTYPE:SMS_GSM\r\n\
        FOLDER:telecom/msg/inbox\r\nBEGIN:BENV\r\nBEGIN:BBODY\r\nLENGTH:20\r\n\
        BEGIN:MSG\r\nhello world\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n";

    #[test]
    fn test_parse_minimal_sms() {
        let msg = BMessage::parse(SCENARIO_SMS.as_bytes(), Charset::Utf8).unwrap();
        assert_eq!(msg.msg_type, MessageType::SmsGsm);
        assert_eq!(msg.folder, "telecom/msg/inbox");
        assert_eq!(msg.status, ReadStatus::Unread);
        assert!(msg.originators.is_empty());
        assert!(msg.recipients.is_empty());
        assert_eq!(
            msg.body,
            BMessageBody::Sms(SmsBody {
                fragments: vec!["hello world".to_string()]
            })
        );
    }

    #[test]
    fn test_parse_nested_envelopes() {
        let text = "BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:READ\r\nTYPE:SMS_CDMA\r\nFOLDER:\r\n\
            BEGIN:VCARD\r\nVERSION:2.1\r\nN:Alice\r\nTEL:+1555\r\nEND:VCARD\r\n\
            BEGIN:BENV\r\nBEGIN:VCARD\r\nVERSION:2.1\r\nTEL:100\r\nEND:VCARD\r\n\
            BEGIN:BENV\r\nBEGIN:VCARD\r\nVERSION:2.1\r\nTEL:200\r\nEND:VCARD\r\n\
            BEGIN:BBODY\r\nCHARSET:UTF-8\r\nBEGIN:MSG\r\npart one\r\nEND:MSG\r\n\
            BEGIN:MSG\r\npart two\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BENV\r\nEND:BMSG\r\n";
        let msg = BMessage::parse(text.as_bytes(), Charset::Native).unwrap();
        assert_eq!(msg.status, ReadStatus::Read);
        assert_eq!(msg.originators[0].name.as_deref(), Some("Alice"));
        assert_eq!(msg.recipients.len(), 2);
        assert_eq!(msg.recipients[0].env_level, 0);
        assert_eq!(msg.recipients[1].env_level, 1);
        assert_eq!(msg.properties.charset.as_deref(), Some("UTF-8"));
        assert_eq!(msg.text().unwrap(), "part onepart two");
    }

    #[test]
    fn test_structural_errors() {
        let cases = [
            "",
            "BEGIN:BMSG\r\nVERSION:2.0\r\n",
            "BEGIN:BMSG\r\nVERSION:1.0\r\nFOLDER:x\r\nBEGIN:BENV\r\n",
            "BEGIN:BMSG\r\nVERSION:1.0\r\nTYPE:SMS_GSM\r\nBEGIN:BBODY\r\n",
            "BEGIN:BMSG\r\nVERSION:1.0\r\nTYPE:SMS_GSM\r\nBEGIN:BENV\r\nBEGIN:BBODY\r\n\
             BEGIN:MSG\r\nhi\r\nEND:MSG\r\nEND:BBODY\r\nEND:BMSG\r\n",
            "BEGIN:BMSG\r\nVERSION:1.0\r\nTYPE:SMS_GSM\r\nBEGIN:BENV\r\nBEGIN:BBODY\r\n\
             BEGIN:MSG\r\nno terminator\r\n",
            "BEGIN:BMSG\r\nVERSION:1.0\r\nTYPE:FAX\r\nBEGIN:BENV\r\n",
        ];
        for case in cases {
            assert!(
                BMessage::parse(case.as_bytes(), Charset::Utf8).is_err(),
                "accepted {case:?}"
            );
        }
    }

    #[test]
    fn test_native_charset_requires_sms() {
        let text = SCENARIO_SMS.replace("SMS_GSM", "MMS");
        let err = BMessage::parse(text.as_bytes(), Charset::Native).unwrap_err();
        assert!(matches!(err, crate::Error::Format(_)));
    }

    #[test]
    fn test_end_msg_literal_survives() {
        let body = "line\r\nEND:MSG\r\nstill body";
        let msg = BMessage::new(
            MessageType::SmsGsm,
            "telecom/msg/outbox",
            BMessageBody::Sms(SmsBody::new(body)),
        );
        let encoded = String::from_utf8(msg.encode()).unwrap();
        assert!(encoded.contains("\r\n/END:MSG\r\n"));

        let parsed = BMessage::parse(encoded.as_bytes(), Charset::Utf8).unwrap();
        assert_eq!(parsed.text().unwrap(), body);
    }

    #[test]
    fn test_encode_length_and_layout() {
        let mut msg = BMessage::new(
            MessageType::SmsGsm,
            "telecom/msg/inbox",
            BMessageBody::Sms(SmsBody::new("hello world")),
        );
        msg.status = ReadStatus::Read;
        msg.properties.charset = Some("UTF-8".into());
        msg.recipients.push(VCard::phone(None, "12345"));

        let encoded = String::from_utf8(msg.encode()).unwrap();
        assert_eq!(
            encoded,
            "BEGIN:BMSG\r\nVERSION:1.0\r\nSTATUS:READ\r\nTYPE:SMS_GSM\r\n\
             FOLDER:telecom/msg/inbox\r\nBEGIN:BENV\r\nBEGIN:VCARD\r\nVERSION:2.1\r\nN:\r\n\
             TEL:12345\r\nEND:VCARD\r\nBEGIN:BBODY\r\nCHARSET:UTF-8\r\nLENGTH:33\r\n\
             BEGIN:MSG\r\nhello world\r\nEND:MSG\r\nEND:BBODY\r\nEND:BENV\r\nEND:BMSG\r\n"
        );
    }

    #[test]
    fn test_email_round_trip() {
        let mut mime = MimeMessage::new();
        mime.subject = Some("Status".into());
        mime.from = vec![Address::new(Some("Ann"), "ann@example.com")];
        mime.to = vec![Address::new(None, "bob@example.com")];
        mime.parts = vec![MimePart::text("See attached\r\nEND:MSG inside")];

        let mut msg = BMessage::new(
            MessageType::Email,
            "telecom/msg/outbox",
            BMessageBody::Mime(mime),
        );
        msg.originators.push(VCard::email(Some("Ann"), "ann@example.com"));
        msg.recipients.push(VCard::email(None, "bob@example.com"));
        msg.properties.encoding = Some("8BIT".into());

        let parsed = BMessage::parse(&msg.encode(), Charset::Utf8).unwrap();
        assert_eq!(parsed.msg_type, MessageType::Email);
        assert_eq!(parsed.originators, msg.originators);
        assert_eq!(parsed.recipients, msg.recipients);
        assert_eq!(parsed.properties.encoding.as_deref(), Some("8BIT"));
        let BMessageBody::Mime(mime) = &parsed.body else {
            panic!("expected MIME body");
        };
        assert_eq!(mime.subject.as_deref(), Some("Status"));
        assert_eq!(mime.to[0].email, "bob@example.com");
        assert_eq!(parsed.text().unwrap(), "See attached\r\nEND:MSG inside");
    }

    #[test]
    fn test_escape_is_transparent() {
        for text in ["", "END:MSG", "/END:MSG", "a END:MSG b //END:MSG"] {
            assert_eq!(unescape(&escape(text)), text);
        }
    }

    fn any_type() -> impl Strategy<Value = MessageType> {
        prop_oneof![Just(MessageType::SmsGsm), Just(MessageType::SmsCdma)]
    }

    proptest! {
        #[test]
        fn sms_round_trip(
            msg_type in any_type(),
            read in any::<bool>(),
            folder in "[a-z/]{0,40}",
            fragments in prop::collection::vec("([a-zA-Z0-9 ,.:/]|\r\n|END:MSG){0,30}", 0..4),
            numbers in prop::collection::vec("[0-9]{1,12}", 0..3),
        ) {
            let mut msg = BMessage::new(
                msg_type,
                folder,
                BMessageBody::Sms(SmsBody { fragments }),
            );
            msg.status = if read { ReadStatus::Read } else { ReadStatus::Unread };
            msg.originators = numbers.iter().map(|n| VCard::phone(Some("x"), n)).collect();

            let parsed = BMessage::parse(&msg.encode(), Charset::Utf8).unwrap();
            prop_assert_eq!(parsed, msg);
        }
    }
}
