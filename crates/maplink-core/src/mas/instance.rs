//! One MAS instance: its SDP description and its accept loop.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use maplink_obex::map::FEATURE_MESSAGES_LISTING_V11;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::events::AccountKey;
use super::mns::NotificationClient;
use crate::config::{PhoneType, ServerConfig};
use crate::error::{Error, Result};
use crate::server::{RequestHandler, serve_session};
use crate::store::StoreProvider;
use crate::time::Clock;
use crate::types::MessageType;

/// MAP features advertised by every instance: notification registration,
/// notification, browsing, uploading, delete, instance information,
/// extended event report 1.1 and messages-listing format 1.1.
pub const SUPPORTED_FEATURES: u32 = 0x7F | FEATURE_MESSAGES_LISTING_V11;

/// Accounts an instance can serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceKind {
    /// The shared SMS/MMS store.
    SmsMms {
        /// Network type, which decides the SMS message type.
        phone_type: PhoneType,
    },
    /// One email account.
    Email {
        /// Backing store account id.
        account_id: u64,
        /// Name shown to peers.
        display_name: String,
    },
}

impl InstanceKind {
    /// Account whose store events belong to this instance.
    #[must_use]
    pub const fn account(&self) -> AccountKey {
        match self {
            Self::SmsMms { .. } => AccountKey::SmsMms,
            Self::Email { account_id, .. } => AccountKey::Email(*account_id),
        }
    }

    /// Message types served.
    #[must_use]
    pub fn message_types(&self) -> Vec<MessageType> {
        match self {
            Self::SmsMms { phone_type } => vec![phone_type.sms_type(), MessageType::Mms],
            Self::Email { .. } => vec![MessageType::Email],
        }
    }

    /// Service name advertised in the SDP record.
    #[must_use]
    pub fn service_name(&self) -> String {
        match self {
            Self::SmsMms { .. } => "SMS/MMS".to_string(),
            Self::Email { display_name, .. } => display_name.clone(),
        }
    }
}

/// SDP description of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpRecord {
    /// Service name.
    pub service_name: String,
    /// MAS instance id.
    pub mas_instance_id: u8,
    /// Bitmask of supported message types.
    pub supported_message_types: u8,
    /// Channel the instance listens on.
    pub channel: u16,
    /// MAP feature bits.
    pub supported_features: u32,
}

/// Lifecycle of an instance listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Not accepting connections.
    Idle,
    /// Waiting for a peer.
    Listening,
    /// A session is running.
    Connected,
}

/// A Message Access Server instance.
pub struct MasInstance<P: StoreProvider, N: NotificationClient> {
    id: u8,
    kind: InstanceKind,
    config: Arc<ServerConfig>,
    provider: Arc<P>,
    notifier: Option<Arc<N>>,
    clock: Arc<dyn Clock>,
    state: Mutex<InstanceState>,
}

impl<P: StoreProvider, N: NotificationClient> MasInstance<P, N> {
    /// Creates an idle instance.
    #[must_use]
    pub fn new(
        id: u8,
        kind: InstanceKind,
        config: Arc<ServerConfig>,
        provider: Arc<P>,
        notifier: Option<Arc<N>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id,
            kind,
            config,
            provider,
            notifier,
            clock,
            state: Mutex::new(InstanceState::Idle),
        }
    }

    /// Instance id.
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    /// What the instance serves.
    #[must_use]
    pub const fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> InstanceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: InstanceState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Service name advertised for the instance.
    #[must_use]
    pub fn service_name(&self) -> String {
        self.kind.service_name()
    }

    /// SDP record for the instance on `channel`.
    #[must_use]
    pub fn sdp_record(&self, channel: u16) -> SdpRecord {
        SdpRecord {
            service_name: self.service_name(),
            mas_instance_id: self.id,
            supported_message_types: self
                .kind
                .message_types()
                .into_iter()
                .fold(0, |mask, t| mask | t.sdp_bit()),
            channel,
            supported_features: SUPPORTED_FEATURES,
        }
    }

    /// Port the instance binds to.
    #[must_use]
    pub fn port(&self) -> u16 {
        if self.config.base_port == 0 {
            0
        } else {
            self.config.base_port.saturating_add(u16::from(self.id))
        }
    }

    /// Readies the instance for the next peer.
    pub fn prepare_for_connection(&self) {
        self.set_state(InstanceState::Listening);
        debug!(mas_id = self.id, "listening for a peer");
    }

    fn begin_session(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == InstanceState::Listening {
            *state = InstanceState::Connected;
            true
        } else {
            false
        }
    }

    /// Binds the instance listener.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener =
            TcpListener::bind((self.config.bind_address.as_str(), self.port())).await?;
        info!(
            mas_id = self.id,
            service = %self.service_name(),
            addr = %listener.local_addr()?,
            "instance bound"
        );
        Ok(listener)
    }

    /// Accepts peers until `shutdown` changes.
    ///
    /// Only one session runs at a time. After an accept failure the listener
    /// is bound again; the loop gives up after `max_listener_restarts`
    /// consecutive failures.
    ///
    /// # Errors
    ///
    /// Returns the last accept error once the restart limit is exceeded, or
    /// a bind error while restarting.
    pub async fn serve(
        self: Arc<Self>,
        mut listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.prepare_for_connection();
        let mut failures = 0;
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(mas_id = self.id, "instance shutting down");
                    self.set_state(InstanceState::Idle);
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        failures = 0;
                        self.accept(socket, peer);
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(mas_id = self.id, error = %e, failures, "accept failed");
                        if failures > self.config.max_listener_restarts {
                            error!(mas_id = self.id, "giving up on listener");
                            self.set_state(InstanceState::Idle);
                            return Err(Error::Io(e));
                        }
                        drop(listener);
                        listener = self.bind().await?;
                    }
                }
            }
        }
    }

    fn accept(self: &Arc<Self>, socket: TcpStream, peer: SocketAddr) {
        if !self.begin_session() {
            warn!(mas_id = self.id, %peer, "instance busy, dropping connection");
            return;
        }
        info!(mas_id = self.id, %peer, "peer accepted");
        let instance = Arc::clone(self);
        tokio::spawn(async move {
            instance.run_session(socket).await;
        });
    }

    async fn run_session(self: Arc<Self>, socket: TcpStream) {
        let opened = RequestHandler::open(
            self.id,
            self.kind.clone(),
            &self.config,
            Arc::clone(&self.provider),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        )
        .await;
        match opened {
            Ok(mut handler) => {
                if let Err(e) =
                    serve_session(socket, &mut handler, self.config.max_packet_size).await
                {
                    warn!(mas_id = self.id, error = %e, "session failed");
                }
            }
            Err(e) => warn!(mas_id = self.id, error = %e, "could not open session"),
        }
        self.prepare_for_connection();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mas::NotificationHub;
    use crate::store::{MemoryProvider, MemoryStore};
    use crate::time::MockClock;

    fn instance(
        id: u8,
        kind: InstanceKind,
        base_port: u16,
    ) -> MasInstance<MemoryProvider, NotificationHub> {
        let config = ServerConfig::builder().base_port(base_port).build();
        let store = Arc::new(MemoryStore::new(kind.account()));
        MasInstance::new(
            id,
            kind,
            Arc::new(config),
            Arc::new(MemoryProvider::new(store)),
            None,
            MockClock::shared(),
        )
    }

    #[test]
    fn test_sdp_record() {
        let sms = instance(
            0,
            InstanceKind::SmsMms {
                phone_type: PhoneType::Cdma,
            },
            4200,
        );
        let record = sms.sdp_record(17);
        assert_eq!(record.service_name, "SMS/MMS");
        assert_eq!(record.mas_instance_id, 0);
        assert_eq!(record.supported_message_types, 0x04 | 0x08);
        assert_eq!(record.channel, 17);
        assert_ne!(record.supported_features & FEATURE_MESSAGES_LISTING_V11, 0);

        let email = instance(
            2,
            InstanceKind::Email {
                account_id: 9,
                display_name: "Work".into(),
            },
            4200,
        );
        let record = email.sdp_record(18);
        assert_eq!(record.service_name, "Work");
        assert_eq!(record.supported_message_types, 0x01);
        assert_eq!(email.port(), 4202);
    }

    #[test]
    fn test_single_session_per_prepare() {
        let sms = instance(
            0,
            InstanceKind::SmsMms {
                phone_type: PhoneType::Gsm,
            },
            0,
        );
        assert_eq!(sms.state(), InstanceState::Idle);
        assert!(!sms.begin_session());

        sms.prepare_for_connection();
        assert!(sms.begin_session());
        assert_eq!(sms.state(), InstanceState::Connected);
        assert!(!sms.begin_session());

        sms.prepare_for_connection();
        assert_eq!(sms.state(), InstanceState::Listening);
        assert_eq!(sms.port(), 0);
    }
}
