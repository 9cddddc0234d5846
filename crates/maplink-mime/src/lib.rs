//! # maplink-mime
//!
//! MIME body codec for the email and MMS content carried inside a MAP
//! `bMessage`.
//!
//! ## Features
//!
//! - **Header parsing**: Unfolding, case-insensitive lookup, RFC 2047 subjects
//! - **Address lists**: `name <addr>` tokens with RFC 2822 line folding
//! - **Multipart bodies**: Boundary splitting and generation
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 header words
//!
//! ## Quick Start
//!
//! ### Parsing a body
//!
//! ```ignore
//! use maplink_mime::MimeMessage;
//!
//! let raw = "Subject: Hi\r\n\
//!            To: Bob <bob@example.com>;\r\n\
//!            Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
//!            \r\n\
//!            --b1\r\n\
//!            Content-Type: text/plain; charset=\"UTF-8\"\r\n\
//!            \r\n\
//!            Hello\r\n\
//!            --b1--\r\n";
//!
//! let message = MimeMessage::parse(raw)?;
//! assert_eq!(message.subject.as_deref(), Some("Hi"));
//! assert_eq!(message.text()?, "Hello");
//! ```
//!
//! ### Building a body
//!
//! ```ignore
//! use maplink_mime::{Address, MimeMessage, MimePart};
//!
//! let mut message = MimeMessage::new();
//! message.subject = Some("Hi".to_string());
//! message.to.push(Address::new(Some("Bob"), "bob@example.com"));
//! message.parts.push(MimePart::text("Hello"));
//!
//! let wire = message.encode();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Address, encode_address_header, parse_address_list};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{MimeMessage, MimePart, TransferEncoding};

/// Maximum line length allowed by RFC 2822, excluding the CRLF.
pub const MAX_LINE_LENGTH: usize = 998;
