//! Backing message store abstraction.
//!
//! The handler never touches message data directly. It talks to a
//! [`MessageStore`] obtained from a [`StoreProvider`], and may drop and
//! re-acquire the store after a failure.

mod memory;

use std::future::Future;
use std::sync::Arc;

use maplink_obex::Charset;
use serde::{Deserialize, Serialize};

pub use memory::{EmailAccountSnapshot, MemoryProvider, MemoryStore, StoreSnapshot, StoredMessage};

use crate::bmessage::BMessage;
use crate::error::Result;
use crate::folder::FolderRef;
use crate::listing::{ListingEntry, MessageFilter};
use crate::types::MessageHandle;

/// An email folder as known to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFolder {
    /// Store id; never 0.
    pub id: u64,
    /// Parent folder id; 0 for top-level folders.
    pub parent_id: u64,
    /// Folder name.
    pub name: String,
}

/// Options of a message fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Requested charset.
    pub charset: Charset,
    /// Whether attachments are wanted.
    pub attachments: bool,
}

/// Options of a message push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOptions {
    /// Do not keep a copy in the sent folder.
    pub transparent: bool,
    /// Retry sending on failure.
    pub retry: bool,
}

/// Message data backing a MAS instance.
pub trait MessageStore: Send + Sync {
    /// Lists the messages of a folder that pass the filter, in store order.
    fn list_messages(
        &self,
        folder: &FolderRef,
        filter: &MessageFilter,
    ) -> impl Future<Output = Result<Vec<ListingEntry>>> + Send;

    /// Fetches one message.
    fn get_message(
        &self,
        handle: MessageHandle,
        options: FetchOptions,
    ) -> impl Future<Output = Result<BMessage>> + Send;

    /// Stores a pushed message and returns its new id.
    fn push_message(
        &self,
        folder: &FolderRef,
        message: &BMessage,
        options: PushOptions,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Sets the read flag; `false` if the message was not changed.
    fn set_read(
        &self,
        handle: MessageHandle,
        read: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Moves a message to or from the deleted folder; `false` if the
    /// message was not changed.
    fn set_deleted(
        &self,
        handle: MessageHandle,
        deleted: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Email folders whose parent is `parent_id`.
    fn email_folders(
        &self,
        parent_id: u64,
    ) -> impl Future<Output = Result<Vec<EmailFolder>>> + Send;

    /// Asks the store to synchronise the inbox with the server.
    fn update_inbox(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Hands out store clients.
pub trait StoreProvider: Send + Sync + 'static {
    /// Store type.
    type Store: MessageStore + 'static;

    /// Acquires a store client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteUnavailable`](crate::Error::RemoteUnavailable)
    /// if the store cannot be reached.
    fn acquire(&self) -> Result<Arc<Self::Store>>;
}
