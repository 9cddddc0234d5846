//! Notification client seam.
//!
//! The MAS side only decides *what* to report. Delivering reports to the
//! peer's notification service is left to a [`NotificationClient`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::events::MapEvent;
use crate::error::{Error, Result};

/// Receives registration changes and event reports.
pub trait NotificationClient: Send + Sync + 'static {
    /// Turns notifications for a MAS instance on or off.
    fn set_registration(
        &self,
        mas_id: u8,
        enabled: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delivers an event report for a MAS instance.
    fn send_event(&self, mas_id: u8, event: &MapEvent) -> impl Future<Output = Result<()>> + Send;
}

/// An encoded event report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Reporting instance.
    pub mas_id: u8,
    /// The event.
    pub event: MapEvent,
    /// `x-bt/MAP-event-report` body.
    pub report: Vec<u8>,
}

/// Tracks registrations and queues reports of registered instances.
#[derive(Debug)]
pub struct NotificationHub {
    registered: Mutex<HashSet<u8>>,
    outbox: mpsc::Sender<Notification>,
}

impl NotificationHub {
    /// Creates a hub and the receiver its reports are queued on.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                registered: Mutex::new(HashSet::new()),
                outbox,
            },
            rx,
        )
    }

    /// Whether an instance has notifications on.
    #[must_use]
    pub fn is_registered(&self, mas_id: u8) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&mas_id)
    }
}

impl NotificationClient for NotificationHub {
    async fn set_registration(&self, mas_id: u8, enabled: bool) -> Result<()> {
        {
            let mut registered = self.registered.lock().unwrap_or_else(PoisonError::into_inner);
            if enabled {
                registered.insert(mas_id);
            } else {
                registered.remove(&mas_id);
            }
        }
        info!(mas_id, enabled, "notification registration changed");
        Ok(())
    }

    async fn send_event(&self, mas_id: u8, event: &MapEvent) -> Result<()> {
        if !self.is_registered(mas_id) {
            debug!(mas_id, kind = event.kind.as_str(), "no registration, dropping event");
            return Ok(());
        }
        let notification = Notification {
            mas_id,
            event: event.clone(),
            report: event.encode()?,
        };
        self.outbox
            .send(notification)
            .await
            .map_err(|_| Error::RemoteUnavailable("notification outbox closed".into()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mas::events::EventKind;
    use crate::types::{MessageHandle, MessageType};

    fn event() -> MapEvent {
        MapEvent {
            kind: EventKind::NewMessage,
            handle: MessageHandle::new(1, MessageType::Email).unwrap(),
            folder: "telecom/msg/inbox".into(),
            old_folder: None,
        }
    }

    #[tokio::test]
    async fn test_only_registered_instances_are_reported() {
        let (hub, mut rx) = NotificationHub::new(4);
        hub.send_event(1, &event()).await.unwrap();
        assert!(rx.try_recv().is_err());

        hub.set_registration(1, true).await.unwrap();
        assert!(hub.is_registered(1));
        hub.send_event(1, &event()).await.unwrap();
        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.mas_id, 1);
        assert!(String::from_utf8(queued.report).unwrap().contains("NewMessage"));

        hub.set_registration(1, false).await.unwrap();
        assert!(!hub.is_registered(1));
    }

    #[tokio::test]
    async fn test_closed_outbox() {
        let (hub, rx) = NotificationHub::new(1);
        drop(rx);
        hub.set_registration(0, true).await.unwrap();
        assert!(matches!(
            hub.send_event(0, &event()).await,
            Err(Error::RemoteUnavailable(_))
        ));
    }
}
