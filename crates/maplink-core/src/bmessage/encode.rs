//! bMessage encoder.

use std::fmt::Write;

use super::{BMessage, BMessageBody, escape};

/// Longest FOLDER value written; longer paths keep their tail.
const MAX_FOLDER_CHARS: usize = 512;

/// Bytes added around each fragment: `BEGIN:MSG\r\n` and `\r\nEND:MSG\r\n`.
const MSG_WRAPPER_LEN: usize = 22;

impl BMessage {
    /// Encodes the bMessage object.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("BEGIN:BMSG\r\nVERSION:1.0\r\n");
        let _ = write!(out, "STATUS:{}\r\n", self.status.as_str());
        let _ = write!(out, "TYPE:{}\r\n", self.msg_type.as_str());
        let _ = write!(out, "FOLDER:{}\r\n", folder_tail(&self.folder));

        for card in &self.originators {
            card.encode(&mut out);
        }

        let levels = self.recipients.iter().map(|r| r.env_level).max().unwrap_or(0);
        for level in 0..=levels {
            out.push_str("BEGIN:BENV\r\n");
            for card in self.recipients.iter().filter(|r| r.env_level == level) {
                card.encode(&mut out);
            }
        }

        out.push_str("BEGIN:BBODY\r\n");
        let props = &self.properties;
        if let Some(id) = props.part_id {
            let _ = write!(out, "PARTID:{id}\r\n");
        }
        if let Some(encoding) = &props.encoding {
            let _ = write!(out, "ENCODING:{encoding}\r\n");
        }
        if let Some(charset) = &props.charset {
            let _ = write!(out, "CHARSET:{charset}\r\n");
        }
        if let Some(language) = &props.language {
            let _ = write!(out, "LANGUAGE:{language}\r\n");
        }

        let fragments: Vec<String> = match &self.body {
            BMessageBody::Sms(sms) => sms.fragments.iter().map(|f| escape(f)).collect(),
            BMessageBody::Mime(mime) => vec![escape(&mime.encode())],
        };
        let length: usize = fragments.iter().map(|f| f.len() + MSG_WRAPPER_LEN).sum();
        let _ = write!(out, "LENGTH:{length}\r\n");
        for fragment in &fragments {
            let _ = write!(out, "BEGIN:MSG\r\n{fragment}\r\nEND:MSG\r\n");
        }
        out.push_str("END:BBODY\r\n");

        for _ in 0..=levels {
            out.push_str("END:BENV\r\n");
        }
        out.push_str("END:BMSG\r\n");
        out.into_bytes()
    }
}

fn folder_tail(folder: &str) -> &str {
    let chars = folder.chars().count();
    if chars <= MAX_FOLDER_CHARS {
        return folder;
    }
    let skip = chars - MAX_FOLDER_CHARS;
    folder
        .char_indices()
        .nth(skip)
        .map_or(folder, |(i, _)| &folder[i..])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_tail() {
        assert_eq!(folder_tail("telecom/msg/inbox"), "telecom/msg/inbox");
        let long = format!("x{}", "y".repeat(MAX_FOLDER_CHARS));
        assert_eq!(folder_tail(&long), "y".repeat(MAX_FOLDER_CHARS));
    }
}
