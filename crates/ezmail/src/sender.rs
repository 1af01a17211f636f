//! SMTP sending with an optional hourly cap.

use ezmail_smtp::connection::{connect, connect_tls};
use ezmail_smtp::{Address, AuthMechanism, Authenticated, Client, Connected, SmtpStream};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assembler::Envelope;
use crate::composer::Email;
use crate::config::{Security, SenderConfig, bounded};
use crate::credentials::{Credentials, Secret};
use crate::rate_limit::RateLimiter;
use crate::{Error, Result};

/// One or more recipient addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// The addresses in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Self(vec![address.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Self(vec![address])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Self(addresses)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(addresses: Vec<&str>) -> Self {
        Self(addresses.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Recipients {
    fn from(addresses: &[&str]) -> Self {
        Self(addresses.iter().map(|a| (*a).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(addresses: [&str; N]) -> Self {
        Self(addresses.iter().map(|a| (*a).to_string()).collect())
    }
}

/// Outcome of [`Sender::send_individually`].
#[derive(Debug, Default)]
pub struct SendReport {
    /// Recipients whose transaction succeeded.
    pub sent: Vec<String>,
    /// Recipients that failed, with the reason.
    pub failed: Vec<(String, Error)>,
}

impl SendReport {
    /// True when every recipient was sent to.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends composed messages through one authenticated SMTP session.
///
/// ```no_run
/// use ezmail::{Composer, Credentials, Sender, SenderConfig, ServerConfig};
///
/// # async fn run() -> ezmail::Result<()> {
/// let config = SenderConfig::new(ServerConfig::new("smtp.example.com", 587))
///     .with_max_emails_per_hour(100);
/// let mut sender = Sender::new(config, Credentials::password("me@example.com", "secret"));
/// sender.connect().await?;
///
/// let email = Composer::new().subject("Hi").add_text("<p>Hello</p>").finish()?;
/// sender.send(&email, ["you@example.com", "them@example.com"]).await?;
/// sender.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Sender<S = SmtpStream> {
    config: SenderConfig,
    credentials: Credentials,
    limiter: Option<RateLimiter>,
    client: Option<Client<S, Authenticated>>,
}

impl<S> Sender<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a sender. Nothing is contacted until `connect`.
    #[must_use]
    pub fn new(config: SenderConfig, credentials: Credentials) -> Self {
        let limiter = config.max_emails_per_hour.map(RateLimiter::new);
        Self {
            config,
            credentials,
            limiter,
            client: None,
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Sends left in the current hour, or `None` without a cap.
    #[must_use]
    pub fn remaining_quota(&mut self) -> Option<u32> {
        self.limiter.as_mut().map(|limiter| limiter.remaining(Instant::now()))
    }

    /// Greets, authenticates and keeps the session over a caller-provided
    /// stream. No TLS is negotiated.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for bad config, [`Error::Connection`] if the
    /// handshake fails, [`Error::Authentication`] if the server refuses.
    pub async fn connect_with_stream(&mut self, stream: S) -> Result<()> {
        self.config.validate()?;
        self.credentials.validate()?;
        let limit = self.config.smtp.timeout();
        let hostname = self.config.client_hostname.clone();

        let client = bounded(limit, "SMTP greeting", async {
            let client = Client::from_stream(stream).await.map_err(handshake_error)?;
            client.ehlo(&hostname).await.map_err(handshake_error)
        })
        .await?;
        self.finish_connect(client).await
    }

    async fn finish_connect(&mut self, client: Client<S, Connected>) -> Result<()> {
        let limit = self.config.smtp.timeout();
        let client = bounded(limit, "SMTP authentication", authenticate(client, &self.credentials)).await?;
        info!(
            host = %self.config.smtp.host,
            user = %self.credentials.email(),
            "SMTP session ready"
        );
        self.client = Some(client);
        Ok(())
    }

    /// Sends `email` to every recipient in one transaction.
    ///
    /// The rate limit is checked before anything else, so an exhausted
    /// quota never touches the connection.
    ///
    /// # Errors
    ///
    /// - [`Error::RateLimitExceeded`] when the hourly cap is reached
    /// - [`Error::InvalidInput`] for no recipients or a malformed address
    /// - [`Error::Connection`] when not connected or the session breaks
    /// - [`Error::Delivery`] when the server rejects MAIL, RCPT or DATA
    pub async fn send(&mut self, email: &Email, recipients: impl Into<Recipients>) -> Result<()> {
        let now = Instant::now();
        if let Some(limiter) = self.limiter.as_mut() {
            limiter.check(now).inspect_err(|_| {
                warn!(limit = limiter.limit(), "hourly send limit reached");
            })?;
        }

        let recipients = recipients.into();
        let (from, to) = self.addresses(&recipients)?;
        let envelope = Envelope::new(from.as_str(), to.iter().map(|a| a.as_str().to_string()).collect());
        let payload = email.to_bytes(&envelope)?;

        self.transmit(&from, &to, &payload).await?;
        if let Some(limiter) = self.limiter.as_mut() {
            limiter.record(Instant::now());
        }
        info!(recipients = to.len(), bytes = payload.len(), subject = email.subject(), "email sent");
        Ok(())
    }

    /// Sends a separate transaction to each recipient, with `To` naming only
    /// that recipient. Failures are collected and the loop keeps going.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `recipients` is empty. Per-recipient
    /// failures are reported in [`SendReport::failed`].
    pub async fn send_individually(&mut self, email: &Email, recipients: impl Into<Recipients>) -> Result<SendReport> {
        let recipients = recipients.into();
        if recipients.0.is_empty() {
            return Err(Error::InvalidInput("at least one recipient is required".to_string()));
        }

        let mut report = SendReport::default();
        for recipient in recipients.0 {
            match self.send(email, recipient.as_str()).await {
                Ok(()) => report.sent.push(recipient),
                Err(err) => {
                    warn!(recipient = %recipient, error = %err, "send failed");
                    report.failed.push((recipient, err));
                }
            }
        }
        debug!(sent = report.sent.len(), failed = report.failed.len(), "individual sends finished");
        Ok(report)
    }

    /// Sends QUIT and drops the session. A failed QUIT is only logged.
    pub async fn disconnect(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let limit = self.config.smtp.timeout();
        let quit = bounded(limit, "SMTP QUIT", async { client.quit().await.map_err(Error::from_smtp) });
        match quit.await {
            Ok(()) => info!(host = %self.config.smtp.host, "SMTP session closed"),
            Err(err) => warn!(error = %err, "QUIT failed, dropping connection"),
        }
    }

    fn addresses(&self, recipients: &Recipients) -> Result<(Address, Vec<Address>)> {
        if recipients.0.is_empty() {
            return Err(Error::InvalidInput("at least one recipient is required".to_string()));
        }
        let from = Address::new(self.credentials.email()).map_err(Error::from_smtp)?;
        let to = recipients
            .0
            .iter()
            .map(|r| Address::new(r.as_str()).map_err(Error::from_smtp))
            .collect::<Result<Vec<_>>>()?;
        Ok((from, to))
    }

    async fn transmit(&mut self, from: &Address, to: &[Address], payload: &[u8]) -> Result<()> {
        let limit = self.config.smtp.timeout();
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| Error::Connection("not connected, call connect() first".to_string()))?;

        let result = bounded(limit, "SMTP send", async {
            client.send_mail(from, to, payload).await.map_err(Error::from_smtp)
        })
        .await;

        if let Err(Error::Connection(reason)) = &result {
            warn!(%reason, "SMTP session lost");
            self.client = None;
        }
        result
    }
}

impl Sender<SmtpStream> {
    /// Connects over TCP, with TLS according to the configured security,
    /// then greets and authenticates.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for bad config, [`Error::Connection`] for
    /// network, TLS or timeout failures, [`Error::Authentication`] if the
    /// server refuses the credentials.
    pub async fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        self.credentials.validate()?;
        let smtp = &self.config.smtp;
        let security = smtp.security();
        info!(
            host = %smtp.host,
            port = smtp.port,
            security = security.display_name(),
            "connecting to SMTP server"
        );

        let client = bounded(smtp.timeout(), "SMTP connect", async {
            let stream = match security {
                Security::Implicit => connect_tls(&smtp.host, smtp.port).await,
                Security::StartTls | Security::None => connect(&smtp.host, smtp.port).await,
            }
            .map_err(handshake_error)?;

            let client = Client::from_stream(stream).await.map_err(handshake_error)?;
            let client = client.ehlo(&self.config.client_hostname).await.map_err(handshake_error)?;
            if security == Security::StartTls {
                client.starttls(&smtp.host).await.map_err(handshake_error)
            } else {
                Ok(client)
            }
        })
        .await?;
        self.finish_connect(client).await
    }
}

async fn authenticate<S>(client: Client<S, Connected>, credentials: &Credentials) -> Result<Client<S, Authenticated>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offered = client.server_info().auth_mechanisms();
    let result = match credentials.secret() {
        Secret::OAuth2(_) => {
            client
                .auth(AuthMechanism::XOAuth2, credentials.xoauth2_response())
                .await
        }
        Secret::Password(password) => {
            if offered.contains(&AuthMechanism::Login) && !offered.contains(&AuthMechanism::Plain) {
                client.auth_login(credentials.email(), password).await
            } else {
                client
                    .auth(AuthMechanism::Plain, credentials.plain_response())
                    .await
            }
        }
    };
    result.map_err(|err| match err {
        ezmail_smtp::Error::Rejected { code, message } => Error::Authentication(format!("{code} {message}")),
        other => Error::from_smtp(other),
    })
}

/// Errors before authentication: any rejection means the session is unusable.
fn handshake_error(err: ezmail_smtp::Error) -> Error {
    match err {
        ezmail_smtp::Error::Rejected { code, message } => {
            Error::Connection(format!("server replied {code}: {message}"))
        }
        other => Error::from_smtp(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::composer::Composer;
    use crate::config::ServerConfig;
    use tokio_test::io::{Builder, Mock};

    const EHLO_REPLY: &[u8] = b"250-smtp.example.com Hello\r\n250 AUTH PLAIN LOGIN XOAUTH2\r\n";

    fn config() -> SenderConfig {
        SenderConfig::new(ServerConfig::new("smtp.example.com", 587))
    }

    fn greeted() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(EHLO_REPLY);
        builder
    }

    fn authed() -> Builder {
        let mut builder = greeted();
        builder
            .write(b"AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20AcGFzcw==\r\n")
            .read(b"235 ok\r\n");
        builder
    }

    fn password() -> Credentials {
        Credentials::password("user@example.com", "pass")
    }

    fn email() -> Email {
        Composer::new().subject("Hi").add_text("<p>Hi</p>").finish().unwrap()
    }

    #[tokio::test]
    async fn test_connect_with_password() {
        let mut sender: Sender<Mock> = Sender::new(config(), password());
        sender.connect_with_stream(authed().build()).await.unwrap();
        assert!(sender.is_connected());
    }

    #[tokio::test]
    async fn test_xoauth2_rejection_is_authentication_error() {
        let credentials = Credentials::oauth2("user@example.com", "tok");
        let mut script = greeted();
        script
            .write(format!("AUTH XOAUTH2 {}\r\n", credentials.xoauth2_response()).as_bytes())
            .read(b"334 eyJzdGF0dXMiOiI0MDEifQ==\r\n")
            .write(b"\r\n")
            .read(b"535 5.7.8 bad token\r\n");

        let mut sender: Sender<Mock> = Sender::new(config(), credentials);
        let err = sender.connect_with_stream(script.build()).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(ref msg) if msg.contains("535")));
        assert!(!sender.is_connected());
    }

    #[tokio::test]
    async fn test_refused_greeting_is_connection_error() {
        let mock = Builder::new().read(b"554 go away\r\n").build();
        let mut sender: Sender<Mock> = Sender::new(config(), password());
        let err = sender.connect_with_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_send_without_connect() {
        let mut sender: Sender<Mock> = Sender::new(config(), password());
        let err = sender.send(&email(), "to@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_invalid_recipients_write_nothing() {
        let mut sender: Sender<Mock> = Sender::new(config(), password());
        sender.connect_with_stream(authed().build()).await.unwrap();

        let err = sender.send(&email(), Vec::<String>::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = sender.send(&email(), "not-an-address").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_checked_first() {
        let mut sender: Sender<Mock> = Sender::new(config().with_max_emails_per_hour(0), password());
        sender.connect_with_stream(authed().build()).await.unwrap();

        let err = sender.send(&email(), "to@example.com").await.unwrap_err();
        assert!(matches!(err, Error::RateLimitExceeded { limit: 0 }));
        assert_eq!(sender.remaining_quota(), Some(0));
    }

    #[tokio::test]
    async fn test_rejected_recipient_is_delivery_error() {
        let mut script = authed();
        script
            .write(b"MAIL FROM:<user@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 5.1.1 no such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 reset\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n");

        let mut sender: Sender<Mock> = Sender::new(config().with_max_emails_per_hour(5), password());
        sender.connect_with_stream(script.build()).await.unwrap();
        let err = sender.send(&email(), "nobody@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Delivery { code: Some(550), .. }));
        assert!(sender.is_connected());
        assert_eq!(sender.remaining_quota(), Some(5));
        sender.disconnect().await;
        assert!(!sender.is_connected());
    }

    #[tokio::test]
    async fn test_login_when_plain_not_offered() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-smtp.example.com\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlckBleGFtcGxlLmNvbQ==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();
        let mut sender: Sender<Mock> = Sender::new(config(), password());
        sender.connect_with_stream(mock).await.unwrap();
    }

    #[test]
    fn test_recipients_conversions() {
        assert_eq!(Recipients::from("a@x.com").as_slice(), ["a@x.com"]);
        assert_eq!(Recipients::from(["a@x.com", "b@x.com"]).as_slice().len(), 2);
        assert_eq!(Recipients::from(vec!["a@x.com".to_string()]).as_slice().len(), 1);
    }
}
