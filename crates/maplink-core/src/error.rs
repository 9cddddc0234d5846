//! Error types for the MAP server core.

use std::time::Duration;

use maplink_obex::ResponseCode;
use thiserror::Error;

/// Errors that can occur while serving MAP requests.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input from the peer.
    #[error("Format error: {0}")]
    Format(String),

    /// A value outside its allowed range.
    #[error("Value out of range: {0}")]
    Range(String),

    /// A required parameter was not supplied.
    #[error("Missing parameter: {0}")]
    Precondition(String),

    /// The backing store is not reachable.
    #[error("Store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A store call did not complete in time.
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// The request is understood but not allowed.
    #[error("Not allowed: {0}")]
    Forbidden(String),

    /// Folder or message does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not supported by this instance.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// OBEX codec error.
    #[error("OBEX error: {0}")]
    Obex(#[from] maplink_obex::Error),

    /// MIME codec error.
    #[error("MIME error: {0}")]
    Mime(#[from] maplink_mime::Error),

    /// XML writer error.
    #[error("XML error: {0}")]
    Xml(#[from] xml::writer::Error),

    /// Invalid address filter pattern.
    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The OBEX response code reported to the peer for this error.
    #[must_use]
    pub const fn response_code(&self) -> ResponseCode {
        match self {
            Self::Format(_)
            | Self::Range(_)
            | Self::Mime(_)
            | Self::Regex(_)
            | Self::Obex(
                maplink_obex::Error::Format(_)
                | maplink_obex::Error::Range(_)
                | maplink_obex::Error::InvalidHeader { .. },
            ) => ResponseCode::BadRequest,
            Self::Precondition(_) => ResponseCode::PreconditionFailed,
            Self::RemoteUnavailable(_) | Self::Timeout(_) => ResponseCode::ServiceUnavailable,
            Self::Forbidden(_) => ResponseCode::NotAcceptable,
            Self::NotFound(_) => ResponseCode::NotFound,
            Self::Unsupported(_) => ResponseCode::NotImplemented,
            Self::Obex(_) | Self::Xml(_) | Self::Io(_) | Self::Serde(_) | Self::Config(_) => {
                ResponseCode::InternalServerError
            }
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_mapping() {
        let cases = [
            (Error::Format("x".into()), ResponseCode::BadRequest),
            (Error::Range("x".into()), ResponseCode::BadRequest),
            (Error::Precondition("x".into()), ResponseCode::PreconditionFailed),
            (Error::RemoteUnavailable("x".into()), ResponseCode::ServiceUnavailable),
            (Error::Timeout(Duration::from_secs(1)), ResponseCode::ServiceUnavailable),
            (Error::Forbidden("x".into()), ResponseCode::NotAcceptable),
            (Error::NotFound("x".into()), ResponseCode::NotFound),
            (Error::Unsupported("x".into()), ResponseCode::NotImplemented),
            (Error::Config("x".into()), ResponseCode::InternalServerError),
            (
                Error::Obex(maplink_obex::Error::Range("x".into())),
                ResponseCode::BadRequest,
            ),
            (
                Error::Obex(maplink_obex::Error::Protocol("x".into())),
                ResponseCode::InternalServerError,
            ),
        ];
        for (error, code) in cases {
            assert_eq!(error.response_code(), code, "{error}");
        }
    }
}
