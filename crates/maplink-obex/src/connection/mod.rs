//! Packet transport over async byte streams.
//!
//! OBEX runs over RFCOMM or L2CAP in production and over TCP for tests and
//! tooling. Anything implementing `AsyncRead + AsyncWrite` works.

mod framed;

pub use framed::{DEFAULT_MAX_PACKET_SIZE, MIN_PACKET_SIZE, PacketStream};
