//! # maplink-core
//!
//! Server side of the Bluetooth Message Access Profile: exposes SMS, MMS
//! and email stores to a peer over OBEX.
//!
//! ## Features
//!
//! - **Folder tree**: The virtual `telecom/msg` hierarchy, built from the
//!   SMS/MMS layout or an email account's folders
//! - **bMessage**: Parser and encoder for the MAP message object, including
//!   nested envelopes and MIME bodies
//! - **Listings**: Filtered, windowed `MAP-msg-listing` documents
//! - **Request handler**: CONNECT, SETPATH, GET and PUT with MAP response
//!   codes, chunked bodies and abort support
//! - **MAS registry**: One instance per shared account, with event reports
//!   routed to a notification client
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use maplink_core::{
//!     AccountKey, MasRegistry, MemoryProvider, MemoryStore, NotificationHub, ServerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> maplink_core::Result<()> {
//!     let store = Arc::new(MemoryStore::new(AccountKey::SmsMms));
//!     let (hub, mut reports) = NotificationHub::new(64);
//!
//!     let registry = MasRegistry::builder(ServerConfig::default())
//!         .notifier(Arc::new(hub))
//!         .sms_mms(Arc::new(MemoryProvider::new(store)))
//!         .build()?;
//!
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     tokio::spawn(async move {
//!         while let Some(report) = reports.recv().await {
//!             println!("event for MAS {}: {:?}", report.mas_id, report.event.kind);
//!         }
//!     });
//!     registry.run(shutdown).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod bmessage;
pub mod config;
mod error;
pub mod folder;
pub mod listing;
pub mod mas;
pub mod server;
pub mod store;
pub mod time;
pub mod types;

pub use bmessage::{BMessage, BMessageBody, SmsBody, VCard};
pub use config::{EmailAccountConfig, PhoneType, ServerConfig, ServerConfigBuilder, SmsMmsConfig};
pub use error::{Error, Result};
pub use folder::{FolderId, FolderRef, FolderTree};
pub use listing::{ListingEntry, ListingOptions, MessageFilter, MessageListing};
pub use mas::{
    AccountKey, InstanceKind, MapEvent, MasInstance, MasRegistry, NotificationClient,
    NotificationHub, StoreEvent,
};
pub use server::{BufferedOperation, Operation, RequestHandler, serve_session};
pub use store::{MemoryProvider, MemoryStore, MessageStore, StoreProvider, StoreSnapshot};
pub use types::{MessageHandle, MessageType, ReadStatus};
