//! Server and client configuration.
//!
//! All types deserialize with serde so they can come from any config file
//! format the caller prefers. Nothing is persisted.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default connect and I/O timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Host name announced in SMTP EHLO unless configured.
pub const DEFAULT_CLIENT_HOSTNAME: &str = "localhost";

/// Transport security for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// TLS from the first byte (SMTP 465, IMAP 993).
    Implicit,
    /// Plaintext connect, then upgrade with STARTTLS.
    StartTls,
    /// No encryption. Only sensible for local test servers.
    None,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Implicit => "SSL/TLS",
            Self::StartTls => "STARTTLS",
            Self::None => "None (insecure)",
        }
    }

    /// Guesses the mode from a well-known port: 465 and 993 are implicit
    /// TLS, anything else starts in plaintext and upgrades.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        match port {
            465 | 993 => Self::Implicit,
            _ => Self::StartTls,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Address and transport settings of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    #[serde(alias = "server")]
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode. When unset it follows the port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
    /// Connect and per-response timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Creates a config with the security mode derived from the port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the security mode explicitly.
    #[must_use]
    pub const fn with_security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Effective security mode.
    #[must_use]
    pub const fn security(&self) -> Security {
        match self.security {
            Some(security) => security,
            None => Security::for_port(self.port),
        }
    }

    /// Effective timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects an empty host or port 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the bad field.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidInput("server host is required".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidInput("server port must be 1-65535".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidInput("timeout must be at least one second".to_string()));
        }
        Ok(())
    }
}

fn default_client_hostname() -> String {
    DEFAULT_CLIENT_HOSTNAME.to_string()
}

/// Configuration of a [`Sender`](crate::Sender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// SMTP server.
    pub smtp: ServerConfig,
    /// Cap on successful sends within any one-hour window.
    #[serde(default)]
    pub max_emails_per_hour: Option<u32>,
    /// Name announced in EHLO.
    #[serde(default = "default_client_hostname")]
    pub client_hostname: String,
}

impl SenderConfig {
    /// Creates a config without a rate limit.
    #[must_use]
    pub fn new(smtp: ServerConfig) -> Self {
        Self {
            smtp,
            max_emails_per_hour: None,
            client_hostname: default_client_hostname(),
        }
    }

    /// Limits successful sends per hour.
    #[must_use]
    pub const fn with_max_emails_per_hour(mut self, max: u32) -> Self {
        self.max_emails_per_hour = Some(max);
        self
    }

    /// Validates the server settings and the EHLO name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for any bad field.
    pub fn validate(&self) -> Result<()> {
        self.smtp.validate()?;
        if self.client_hostname.trim().is_empty() || self.client_hostname.contains(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "invalid client hostname {:?}",
                self.client_hostname
            )));
        }
        Ok(())
    }
}

/// Configuration of a [`Reader`](crate::Reader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// IMAP server.
    pub imap: ServerConfig,
}

impl ReaderConfig {
    /// Creates a config.
    #[must_use]
    pub const fn new(imap: ServerConfig) -> Self {
        Self { imap }
    }

    /// Validates the server settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for any bad field.
    pub fn validate(&self) -> Result<()> {
        self.imap.validate()
    }

    /// Connection settings for the IMAP client.
    pub(crate) fn imap_config(&self) -> ezmail_imap::Config {
        let security = match self.imap.security() {
            Security::Implicit => ezmail_imap::Security::Implicit,
            Security::StartTls => ezmail_imap::Security::StartTls,
            Security::None => ezmail_imap::Security::None,
        };
        ezmail_imap::Config::builder(&self.imap.host)
            .port(self.imap.port)
            .security(security)
            .connect_timeout(self.imap.timeout())
            .io_timeout(Some(self.imap.timeout()))
            .build()
    }
}

/// Runs `fut`, mapping an elapsed `limit` to [`Error::Connection`].
pub(crate) async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Connection(format!("{what} timed out after {}s", limit.as_secs())))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_security_follows_port() {
        assert_eq!(ServerConfig::new("smtp.example.com", 465).security(), Security::Implicit);
        assert_eq!(ServerConfig::new("smtp.example.com", 587).security(), Security::StartTls);
        assert_eq!(ServerConfig::new("imap.example.com", 993).security(), Security::Implicit);
        assert_eq!(
            ServerConfig::new("localhost", 2525)
                .with_security(Security::None)
                .security(),
            Security::None
        );
    }

    #[test]
    fn test_validate() {
        assert!(ServerConfig::new("smtp.example.com", 587).validate().is_ok());
        assert!(matches!(
            ServerConfig::new(" ", 587).validate(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ServerConfig::new("smtp.example.com", 0).validate(),
            Err(Error::InvalidInput(_))
        ));

        let mut config = SenderConfig::new(ServerConfig::new("smtp.example.com", 587));
        config.client_hostname = "my host".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: SenderConfig = serde_json::from_str(
            r#"{"smtp": {"server": "smtp.example.com", "port": 587}, "max_emails_per_hour": 100}"#,
        )
        .unwrap();
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.timeout(), Duration::from_secs(30));
        assert_eq!(config.smtp.security, None);
        assert_eq!(config.max_emails_per_hour, Some(100));
        assert_eq!(config.client_hostname, "localhost");

        let config: ReaderConfig = serde_json::from_str(
            r#"{"imap": {"host": "imap.example.com", "port": 143, "security": "starttls", "timeout_secs": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.imap.security(), Security::StartTls);
        assert_eq!(config.imap.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_imap_config_conversion() {
        let config = ReaderConfig::new(ServerConfig::new("imap.example.com", 143)).imap_config();
        assert_eq!(config.port, 143);
        assert_eq!(config.security, ezmail_imap::Security::StartTls);
        assert_eq!(config.io_timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(Duration::from_secs(1), "greeting", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Connection(ref msg)) if msg.contains("greeting")));
    }
}
