//! bMessage parser.

use maplink_mime::MimeMessage;
use maplink_obex::Charset;
use tracing::debug;

use super::reader::LineReader;
use super::vcard::VCard;
use super::{BMessage, BMessageBody, BodyProperties, SmsBody, unescape};
use crate::error::{Error, Result};
use crate::types::{MessageType, ReadStatus};

impl BMessage {
    /// Parses a bMessage object.
    ///
    /// `charset` is the request's charset parameter; native encoding is only
    /// accepted for SMS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] on any structural violation and
    /// [`Error::Mime`] if an MMS or email body is not valid MIME.
    pub fn parse(data: &[u8], charset: Charset) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Format(format!("bMessage is not UTF-8: {e}")))?;
        let mut reader = LineReader::new(text);

        reader.expect("BEGIN:BMSG")?;
        reader.expect("VERSION:1.0")?;

        let mut status = ReadStatus::Unread;
        let mut msg_type = None;
        let mut folder = String::new();
        let mut line = reader.require("properties")?;
        while !is(line, "BEGIN:VCARD") && !is(line, "BEGIN:BENV") {
            let (key, value) = property(line)?;
            match key.to_ascii_uppercase().as_str() {
                "STATUS" => status = ReadStatus::parse(value)?,
                "TYPE" => msg_type = Some(MessageType::parse(value)?),
                "FOLDER" => folder = value.to_string(),
                other => debug!(property = other, "ignoring bMessage property"),
            }
            line = reader.require("properties")?;
        }
        let msg_type = msg_type.ok_or_else(|| Error::Format("bMessage without TYPE".into()))?;
        if charset == Charset::Native && !msg_type.is_sms() {
            return Err(Error::Format(format!(
                "native charset not allowed for {msg_type}"
            )));
        }

        let mut originators = Vec::new();
        while is(line, "BEGIN:VCARD") {
            originators.push(VCard::parse(&mut reader, 0)?);
            line = reader.require("originator")?;
        }
        if !is(line, "BEGIN:BENV") {
            return Err(Error::Format(format!("expected BEGIN:BENV, found {line:?}")));
        }

        let mut level = 0;
        let mut recipients = Vec::new();
        loop {
            let line = reader.require("envelope")?;
            if is(line, "BEGIN:VCARD") {
                recipients.push(VCard::parse(&mut reader, level)?);
            } else if is(line, "BEGIN:BENV") {
                level += 1;
            } else if is(line, "BEGIN:BBODY") {
                break;
            } else {
                return Err(Error::Format(format!("unexpected envelope line {line:?}")));
            }
        }

        let (properties, body) = if msg_type == MessageType::Email {
            parse_email_body(&mut reader)?
        } else {
            parse_blocks_body(&mut reader, msg_type)?
        };

        for _ in 0..=level {
            reader.expect("END:BENV")?;
        }
        reader.expect("END:BMSG")?;

        Ok(Self {
            status,
            msg_type,
            folder,
            originators,
            recipients,
            properties,
            body,
        })
    }
}

fn is(line: &str, token: &str) -> bool {
    line.eq_ignore_ascii_case(token)
}

fn property(line: &str) -> Result<(&str, &str)> {
    line.split_once(':')
        .map(|(k, v)| (k.trim(), v.trim()))
        .ok_or_else(|| Error::Format(format!("malformed bMessage line {line:?}")))
}

/// Applies one `KEY:value` line from the body header.
fn body_property(properties: &mut BodyProperties, line: &str) -> Result<()> {
    let (key, value) = property(line)?;
    match key.to_ascii_uppercase().as_str() {
        "PARTID" => match value.parse() {
            Ok(id) => properties.part_id = Some(id),
            Err(_) => debug!(value, "ignoring non-numeric PARTID"),
        },
        "ENCODING" => properties.encoding = Some(value.to_string()),
        "CHARSET" => properties.charset = Some(value.to_string()),
        "LANGUAGE" => properties.language = Some(value.to_string()),
        "LENGTH" => {
            if value.parse::<usize>().is_err() {
                debug!(value, "ignoring malformed LENGTH");
            }
        }
        other => debug!(property = other, "ignoring body property"),
    }
    Ok(())
}

/// SMS and MMS bodies: properties followed by `BEGIN:MSG` blocks.
fn parse_blocks_body(
    reader: &mut LineReader<'_>,
    msg_type: MessageType,
) -> Result<(BodyProperties, BMessageBody)> {
    let mut properties = BodyProperties::default();
    let mut blocks = Vec::new();
    loop {
        let line = reader.require("body")?;
        if is(line, "END:BBODY") {
            break;
        }
        if is(line, "BEGIN:MSG") {
            blocks.push(unescape(reader.read_until("END:MSG")?));
        } else if blocks.is_empty() {
            body_property(&mut properties, line)?;
        } else {
            return Err(Error::Format(format!("unexpected body line {line:?}")));
        }
    }

    let body = if msg_type.is_sms() {
        BMessageBody::Sms(SmsBody { fragments: blocks })
    } else {
        if blocks.is_empty() {
            return Err(Error::Format("MMS body without content".into()));
        }
        BMessageBody::Mime(MimeMessage::parse(&blocks.concat())?)
    };
    Ok((properties, body))
}

/// Email bodies: everything up to `END:BBODY`, with the content running to
/// the last `END:MSG`.
fn parse_email_body(reader: &mut LineReader<'_>) -> Result<(BodyProperties, BMessageBody)> {
    let section = reader.read_until("END:BBODY")?;
    let mut inner = LineReader::new(section);
    let mut properties = BodyProperties::default();
    loop {
        let line = inner.require("email body")?;
        if is(line, "BEGIN:MSG") {
            break;
        }
        body_property(&mut properties, line)?;
    }

    let rest = inner.rest();
    let end = rest
        .rfind("END:MSG")
        .ok_or_else(|| Error::Format("email body without END:MSG".into()))?;
    let content = &rest[..end];
    let content = content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content);
    let mime = MimeMessage::parse(&unescape(content))?;
    Ok((properties, BMessageBody::Mime(mime)))
}
