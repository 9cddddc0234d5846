//! Server configuration types.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::MessageType;

/// Radio technology of the SMS service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    /// GSM network; SMS is advertised as `SMS_GSM`.
    #[default]
    Gsm,
    /// CDMA network; SMS is advertised as `SMS_CDMA`.
    Cdma,
}

impl PhoneType {
    /// The SMS message type for this network.
    #[must_use]
    pub const fn sms_type(self) -> MessageType {
        match self {
            Self::Gsm => MessageType::SmsGsm,
            Self::Cdma => MessageType::SmsCdma,
        }
    }
}

/// Shared SMS/MMS instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsMmsConfig {
    /// Whether the SMS/MMS instance is served.
    pub enabled: bool,
    /// Network type of the phone.
    pub phone_type: PhoneType,
}

impl Default for SmsMmsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phone_type: PhoneType::Gsm,
        }
    }
}

/// An email account exposed through its own MAS instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAccountConfig {
    /// Backing store account id.
    pub account_id: u64,
    /// Name shown in the SDP record.
    pub display_name: String,
    /// Whether the account is shared.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_true() -> bool {
    true
}

/// MAP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the instance listeners bind to.
    pub bind_address: String,
    /// Port of instance 0; instance `n` listens on `base_port + n`.
    /// Port 0 binds every instance to an ephemeral port.
    pub base_port: u16,
    /// Largest OBEX packet the server accepts.
    pub max_packet_size: u16,
    /// Upper bound on each store call.
    #[serde(rename = "provider_timeout_ms", with = "duration_ms")]
    pub provider_timeout: Duration,
    /// SMS text longer than this many bytes is delivered in fractions.
    pub fraction_threshold: usize,
    /// Maximum depth of email folder recursion.
    pub max_folder_depth: usize,
    /// Consecutive accept failures tolerated before an instance gives up.
    pub max_listener_restarts: u32,
    /// SMS/MMS instance settings.
    pub sms_mms: SmsMmsConfig,
    /// Email accounts to expose.
    pub email_accounts: Vec<EmailAccountConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            base_port: 4200,
            max_packet_size: 0xFFFE,
            provider_timeout: Duration::from_secs(5),
            fraction_threshold: 1024,
            max_folder_depth: 32,
            max_listener_restarts: 5,
            sms_mms: SmsMmsConfig::default(),
            email_accounts: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON, or
    /// if the resulting configuration fails [`ServerConfig::validate`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_size < 255 {
            return Err(Error::Config(format!(
                "max_packet_size {} below OBEX minimum of 255",
                self.max_packet_size
            )));
        }
        if self.provider_timeout.is_zero() {
            return Err(Error::Config("provider_timeout_ms must be positive".into()));
        }
        if self.fraction_threshold == 0 {
            return Err(Error::Config("fraction_threshold must be positive".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for account in &self.email_accounts {
            if !seen.insert(account.account_id) {
                return Err(Error::Config(format!(
                    "duplicate email account id {}",
                    account.account_id
                )));
            }
        }
        Ok(())
    }
}

/// Builder for server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Creates a builder populated with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// Sets the port of instance 0.
    #[must_use]
    pub const fn base_port(mut self, port: u16) -> Self {
        self.config.base_port = port;
        self
    }

    /// Sets the maximum OBEX packet size.
    #[must_use]
    pub const fn max_packet_size(mut self, size: u16) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Sets the store call timeout.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = timeout;
        self
    }

    /// Sets the SMS fraction threshold in bytes.
    #[must_use]
    pub const fn fraction_threshold(mut self, bytes: usize) -> Self {
        self.config.fraction_threshold = bytes;
        self
    }

    /// Sets the email folder recursion bound.
    #[must_use]
    pub const fn max_folder_depth(mut self, depth: usize) -> Self {
        self.config.max_folder_depth = depth;
        self
    }

    /// Sets the tolerated number of consecutive accept failures.
    #[must_use]
    pub const fn max_listener_restarts(mut self, restarts: u32) -> Self {
        self.config.max_listener_restarts = restarts;
        self
    }

    /// Enables or disables the SMS/MMS instance.
    #[must_use]
    pub const fn sms_mms(mut self, enabled: bool, phone_type: PhoneType) -> Self {
        self.config.sms_mms = SmsMmsConfig {
            enabled,
            phone_type,
        };
        self
    }

    /// Adds an email account.
    #[must_use]
    pub fn email_account(mut self, account_id: u64, display_name: impl Into<String>) -> Self {
        self.config.email_accounts.push(EmailAccountConfig {
            account_id,
            display_name: display_name.into(),
            enabled: true,
        });
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.base_port, 4200);
        assert_eq!(config.max_packet_size, 0xFFFE);
        assert_eq!(config.provider_timeout, Duration::from_secs(5));
        assert_eq!(config.fraction_threshold, 1024);
        assert_eq!(config.max_folder_depth, 32);
        assert!(config.sms_mms.enabled);
        assert!(config.email_accounts.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .base_port(0)
            .provider_timeout(Duration::from_millis(250))
            .sms_mms(true, PhoneType::Cdma)
            .email_account(7, "Work")
            .build();

        assert_eq!(config.base_port, 0);
        assert_eq!(config.provider_timeout, Duration::from_millis(250));
        assert_eq!(config.sms_mms.phone_type.sms_type(), MessageType::SmsCdma);
        assert_eq!(config.email_accounts[0].display_name, "Work");
    }

    #[test]
    fn test_json_partial_and_timeout_in_ms() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "base_port": 5000,
                "provider_timeout_ms": 1500,
                "email_accounts": [{ "account_id": 3, "display_name": "Home" }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.base_port, 5000);
        assert_eq!(config.provider_timeout, Duration::from_millis(1500));
        assert!(config.email_accounts[0].enabled);
        assert_eq!(config.max_folder_depth, 32);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["provider_timeout_ms"], 1500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServerConfig::builder().max_packet_size(100).build();
        assert!(config.validate().is_err());

        config.max_packet_size = 1024;
        config.provider_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let config = ServerConfig::builder()
            .email_account(1, "a")
            .email_account(1, "b")
            .build();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = ServerConfig::load("/nonexistent/maplink/config.json").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
