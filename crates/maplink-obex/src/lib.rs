//! # maplink-obex
//!
//! OBEX wire types and the MAP application-parameter codec.
//!
//! ## Features
//!
//! - **Application parameters**: Typed decode/encode of the MAP TLV block
//!   with range-checked values
//! - **Headers**: Unicode, byte-sequence, one-byte and four-byte headers
//! - **Packets**: Request/response codec including CONNECT and SETPATH fields
//! - **Framing**: Whole-packet reads and writes over any tokio stream
//!
//! ## Quick Start
//!
//! ```ignore
//! use maplink_obex::{AppParams, PacketStream, Response, ResponseCode};
//!
//! let mut stream = PacketStream::new(socket, 0xFFFE);
//! while let Some(request) = stream.read_request().await? {
//!     let params = match request.headers.app_params() {
//!         Some(raw) => AppParams::decode(raw)?,
//!         None => AppParams::new(),
//!     };
//!     println!("max list count: {:?}", params.max_list_count);
//!     stream.write_response(&Response::new(ResponseCode::Ok)).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod app_params;
pub mod connection;
mod error;
pub mod header;
pub mod map;
pub mod packet;
mod state;

pub use app_params::{
    AppParams, Charset, FractionDeliver, FractionRequest, MessageTypeFilter, PriorityFilter,
    ReadStatusFilter, StatusIndicator,
};
pub use connection::PacketStream;
pub use error::{Error, Result};
pub use header::{HeaderId, HeaderSet, HeaderValue};
pub use packet::{ConnectFields, Opcode, Request, Response, ResponseCode};
pub use state::{ConnectedState, SessionState};
