//! Error types for the OBEX and application-parameter codecs.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or transporting OBEX data.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input: truncated TLV, bad length field, unparsable date.
    #[error("Format error: {0}")]
    Format(String),

    /// A value outside the range allowed for its field.
    #[error("Value out of range: {0}")]
    Range(String),

    /// A packet larger than the negotiated maximum.
    #[error("Packet of {size} bytes exceeds maximum of {max}")]
    PacketTooLarge {
        /// Declared packet length.
        size: usize,
        /// Negotiated maximum.
        max: usize,
    },

    /// Header with an invalid encoding or length.
    #[error("Invalid header 0x{id:02X}: {message}")]
    InvalidHeader {
        /// Header identifier byte.
        id: u8,
        /// Description of the problem.
        message: String,
    },

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
