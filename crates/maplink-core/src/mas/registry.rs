//! The set of MAS instances served by one device.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::events::{AccountKey, MapEvent, StoreEvent};
use super::instance::{InstanceKind, MasInstance};
use super::mns::NotificationClient;
use crate::config::{EmailAccountConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::store::StoreProvider;
use crate::time::{Clock, SystemClock};

/// Capacity of the store event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Id of the shared SMS/MMS instance.
pub const SMS_MMS_INSTANCE_ID: u8 = 0;

/// Builder for [`MasRegistry`].
pub struct MasRegistryBuilder<P: StoreProvider, N: NotificationClient> {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<N>>,
    sms_mms: Option<Arc<P>>,
    email: Vec<(EmailAccountConfig, Arc<P>)>,
    events_tx: mpsc::Sender<StoreEvent>,
    events_rx: mpsc::Receiver<StoreEvent>,
}

impl<P: StoreProvider, N: NotificationClient> MasRegistryBuilder<P, N> {
    /// Starts a registry for `config`.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            clock: Arc::new(SystemClock),
            notifier: None,
            sms_mms: None,
            email: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    /// Channel the content observers publish on; available before the
    /// stores are created.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<StoreEvent> {
        self.events_tx.clone()
    }

    /// Replaces the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the notification client shared by all instances.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<N>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Serves the SMS/MMS store, unless disabled in the configuration.
    #[must_use]
    pub fn sms_mms(mut self, provider: Arc<P>) -> Self {
        self.sms_mms = Some(provider);
        self
    }

    /// Serves an email account, unless the account is disabled.
    #[must_use]
    pub fn email_account(mut self, account: EmailAccountConfig, provider: Arc<P>) -> Self {
        self.email.push((account, provider));
        self
    }

    /// Assigns instance ids and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or there
    /// are more email accounts than instance ids.
    pub fn build(self) -> Result<MasRegistry<P, N>> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let mut instances = Vec::new();

        if let Some(provider) = self.sms_mms {
            if config.sms_mms.enabled {
                instances.push(Arc::new(MasInstance::new(
                    SMS_MMS_INSTANCE_ID,
                    InstanceKind::SmsMms {
                        phone_type: config.sms_mms.phone_type,
                    },
                    Arc::clone(&config),
                    provider,
                    self.notifier.clone(),
                    Arc::clone(&self.clock),
                )));
            } else {
                debug!("SMS/MMS instance disabled");
            }
        }

        let mut next_id: Option<u8> = Some(1);
        for (account, provider) in self.email {
            if !account.enabled {
                debug!(account_id = account.account_id, "email account not shared");
                continue;
            }
            let id = next_id.ok_or_else(|| Error::Config("too many email accounts".into()))?;
            next_id = id.checked_add(1);
            instances.push(Arc::new(MasInstance::new(
                id,
                InstanceKind::Email {
                    account_id: account.account_id,
                    display_name: account.display_name,
                },
                Arc::clone(&config),
                provider,
                self.notifier.clone(),
                Arc::clone(&self.clock),
            )));
        }

        info!(instances = instances.len(), "MAS registry built");
        Ok(MasRegistry {
            instances,
            notifier: self.notifier,
            events_tx: self.events_tx,
            events_rx: Some(self.events_rx),
        })
    }
}

/// Owns the MAS instances and routes store events to notifications.
pub struct MasRegistry<P: StoreProvider, N: NotificationClient> {
    instances: Vec<Arc<MasInstance<P, N>>>,
    notifier: Option<Arc<N>>,
    events_tx: mpsc::Sender<StoreEvent>,
    events_rx: Option<mpsc::Receiver<StoreEvent>>,
}

impl<P: StoreProvider, N: NotificationClient> MasRegistry<P, N> {
    /// Starts a registry builder.
    #[must_use]
    pub fn builder(config: ServerConfig) -> MasRegistryBuilder<P, N> {
        MasRegistryBuilder::new(config)
    }

    /// All instances, SMS/MMS first.
    #[must_use]
    pub fn instances(&self) -> &[Arc<MasInstance<P, N>>] {
        &self.instances
    }

    /// Instance by id.
    #[must_use]
    pub fn instance(&self, mas_id: u8) -> Option<&Arc<MasInstance<P, N>>> {
        self.instances.iter().find(|i| i.id() == mas_id)
    }

    /// Instance serving an account.
    #[must_use]
    pub fn instance_for(&self, account: AccountKey) -> Option<&Arc<MasInstance<P, N>>> {
        self.instances.iter().find(|i| i.kind().account() == account)
    }

    /// Number of email accounts served.
    #[must_use]
    pub fn enabled_account_count(&self) -> usize {
        self.instances
            .iter()
            .filter(|i| matches!(i.kind(), InstanceKind::Email { .. }))
            .count()
    }

    /// Channel the content observers publish on.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<StoreEvent> {
        self.events_tx.clone()
    }

    /// Routes one store event.
    pub async fn handle_event(&self, event: StoreEvent) {
        let Some(account) = event.account() else {
            info!("account set changed, applies to new connections");
            return;
        };
        let Some(instance) = self.instance_for(account) else {
            debug!(?account, "event for an account that is not served");
            return;
        };
        let Some(report) = MapEvent::from_store_event(&event) else {
            info!(mas_id = instance.id(), "folders changed, applies to new connections");
            return;
        };
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.send_event(instance.id(), &report).await {
            warn!(mas_id = instance.id(), error = %e, "event report not delivered");
        }
    }

    /// Binds every instance and serves until `shutdown` changes.
    ///
    /// # Errors
    ///
    /// Returns an error if an instance cannot be bound, or if the registry
    /// is run twice.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut events = self
            .events_rx
            .take()
            .ok_or_else(|| Error::Config("registry already running".into()))?;

        let mut listeners = JoinSet::new();
        for instance in &self.instances {
            let listener = instance.bind().await?;
            listeners.spawn(Arc::clone(instance).serve(listener, shutdown.clone()));
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                Some(joined) = listeners.join_next() => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "instance listener stopped"),
                    Err(e) => warn!(error = %e, "instance task failed"),
                },
            }
        }

        while let Some(joined) = listeners.join_next().await {
            if let Ok(Err(e)) = joined {
                warn!(error = %e, "instance listener stopped");
            }
        }
        info!("MAS registry stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mas::NotificationHub;
    use crate::store::{MemoryProvider, MemoryStore};
    use crate::types::{MessageHandle, MessageType};

    fn provider(account: AccountKey) -> Arc<MemoryProvider> {
        Arc::new(MemoryProvider::new(Arc::new(MemoryStore::new(account))))
    }

    fn account(account_id: u64, enabled: bool) -> EmailAccountConfig {
        EmailAccountConfig {
            account_id,
            display_name: format!("Account {account_id}"),
            enabled,
        }
    }

    #[test]
    fn test_instance_ids() {
        let registry: MasRegistry<MemoryProvider, NotificationHub> =
            MasRegistry::builder(ServerConfig::default())
                .sms_mms(provider(AccountKey::SmsMms))
                .email_account(account(10, true), provider(AccountKey::Email(10)))
                .email_account(account(11, false), provider(AccountKey::Email(11)))
                .email_account(account(12, true), provider(AccountKey::Email(12)))
                .build()
                .unwrap();

        let ids: Vec<u8> = registry.instances().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(registry.enabled_account_count(), 2);
        assert_eq!(
            registry.instance_for(AccountKey::Email(12)).unwrap().id(),
            2
        );
        assert!(registry.instance_for(AccountKey::Email(11)).is_none());
        assert_eq!(registry.instance(1).unwrap().service_name(), "Account 10");
    }

    #[test]
    fn test_disabled_sms_mms() {
        let config = ServerConfig::builder()
            .sms_mms(false, crate::config::PhoneType::Gsm)
            .build();
        let registry: MasRegistry<MemoryProvider, NotificationHub> = MasRegistry::builder(config)
            .sms_mms(provider(AccountKey::SmsMms))
            .email_account(account(3, true), provider(AccountKey::Email(3)))
            .build()
            .unwrap();
        assert!(registry.instance(SMS_MMS_INSTANCE_ID).is_none());
        assert_eq!(registry.instances()[0].id(), 1);
    }

    fn with_email_accounts(count: u64) -> MasRegistryBuilder<MemoryProvider, NotificationHub> {
        (1..=count).fold(
            MasRegistry::builder(ServerConfig::default()),
            |builder, id| builder.email_account(account(id, true), provider(AccountKey::Email(id))),
        )
    }

    #[test]
    fn test_last_instance_id_is_usable() {
        let registry = with_email_accounts(255).build().unwrap();
        assert_eq!(registry.instances().len(), 255);
        assert_eq!(
            registry.instance_for(AccountKey::Email(255)).unwrap().id(),
            255
        );

        assert!(matches!(
            with_email_accounts(256).build(),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_events_reach_registered_instances() {
        let (hub, mut outbox) = NotificationHub::new(8);
        let hub = Arc::new(hub);
        let registry = MasRegistry::builder(ServerConfig::default())
            .notifier(Arc::clone(&hub))
            .sms_mms(provider(AccountKey::SmsMms))
            .email_account(account(4, true), provider(AccountKey::Email(4)))
            .build()
            .unwrap();

        let handle = MessageHandle::new(8, MessageType::Email).unwrap();
        let event = StoreEvent::NewMessage {
            account: AccountKey::Email(4),
            handle,
            folder: "telecom/msg/inbox".into(),
        };

        registry.handle_event(event.clone()).await;
        assert!(outbox.try_recv().is_err());

        hub.set_registration(1, true).await.unwrap();
        registry.handle_event(event).await;
        let notification = outbox.recv().await.unwrap();
        assert_eq!(notification.mas_id, 1);
        assert_eq!(notification.event.handle, handle);

        registry
            .handle_event(StoreEvent::FoldersChanged {
                account: AccountKey::Email(4),
            })
            .await;
        registry.handle_event(StoreEvent::AccountsChanged).await;
        assert!(outbox.try_recv().is_err());
    }
}
