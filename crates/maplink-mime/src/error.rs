//! Errors raised while reading or writing MIME bodies of bMessages.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the MIME sub-codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header line without a `name: value` shape.
    #[error("malformed header line: {0}")]
    InvalidHeader(String),

    /// `Content-Type` value that is not `type/subtype`.
    #[error("malformed content type: {0}")]
    InvalidContentType(String),

    /// Unknown transfer encoding or broken encoded-word.
    #[error("bad encoding: {0}")]
    InvalidEncoding(String),

    /// Body declared base64 that does not decode.
    #[error("base64 body: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Decoded text that is not UTF-8.
    #[error("decoded text is not UTF-8: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// Multipart body without its boundary or closing delimiter.
    #[error("broken multipart body: {0}")]
    InvalidMultipart(String),

    /// Address token that has no usable mailbox.
    #[error("bad address: {0}")]
    InvalidAddress(String),

    /// Message with no part a bMessage can carry as text.
    #[error("no text part in message")]
    MissingTextPart,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::InvalidHeader("Subject".into()).to_string(),
            "malformed header line: Subject"
        );
        assert_eq!(Error::MissingTextPart.to_string(), "no text part in message");
    }
}
