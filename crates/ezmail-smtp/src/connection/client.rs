//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::{Command, encode_data};
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Longest reply line accepted (RFC 5321 allows 512 octets).
const MAX_REPLY_LINE: usize = 4096;

/// Type-state marker: greeted, not yet authenticated.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: authenticated, ready for mail transactions.
#[derive(Debug)]
pub struct Authenticated;

/// SMTP client with type-state pattern.
///
/// `S` is the transport; any `AsyncRead + AsyncWrite` works, which lets
/// tests drive the client with scripted streams.
#[derive(Debug)]
pub struct Client<S, State> {
    stream: BufReader<S>,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns what the server advertised.
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!(command = %cmd.redacted(), "smtp >");
        let stream = self.stream.get_mut();
        stream.write_all(&cmd.serialize()).await?;
        stream.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut raw = Vec::new();
            let read = self.stream.read_until(b'\n', &mut raw).await?;
            if read == 0 {
                return Err(Error::ConnectionClosed);
            }
            if raw.len() > MAX_REPLY_LINE {
                return Err(Error::Protocol("reply line too long".into()));
            }

            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if line.is_empty() {
                continue;
            }
            tracing::trace!(%line, "smtp <");

            let is_last = is_last_reply_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }

        let reply = parse_reply(&lines)?;
        tracing::debug!(code = reply.code.as_u16(), "smtp reply");
        Ok(reply)
    }

    async fn expect_success(&mut self, cmd: &Command) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    /// Sends NOOP to keep the session alive or check it is still up.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 2xx.
    pub async fn noop(&mut self) -> Result<()> {
        self.expect_success(&Command::Noop).await.map(drop)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if reply.code != ReplyCode::CLOSING && !reply.is_success() {
            return Err(reply.into_error());
        }
        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server
    /// refuses service.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
            client_hostname: String::new(),
            _state: PhantomData,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        client.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %client.server_info.hostname, "smtp greeting");

        Ok(client)
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .expect_success(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        // The first line is the server's greeting, not an extension
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        self.client_hostname = client_hostname.to_string();
        Ok(self)
    }

    /// Authenticates with a single-step SASL mechanism such as PLAIN or
    /// XOAUTH2. `initial_response` is the Base64 payload.
    ///
    /// If the server answers with a 334 challenge (XOAUTH2 uses this to
    /// carry an error), an empty response is sent so the server can
    /// finish the exchange, and its final reply becomes the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the credentials are refused.
    pub async fn auth(
        mut self,
        mechanism: AuthMechanism,
        initial_response: String,
    ) -> Result<Client<S, Authenticated>> {
        let reply = self
            .send_command(&Command::Auth {
                mechanism,
                initial_response: Some(initial_response),
            })
            .await?;

        if reply.is_success() {
            tracing::debug!(mechanism = mechanism.as_str(), "smtp authenticated");
            return Ok(self.transition());
        }

        if reply.code == ReplyCode::AUTH_CONTINUE {
            let challenge = decode_challenge(&reply);
            let last = self
                .send_command(&Command::AuthResponse(String::new()))
                .await?;
            let message = if challenge.is_empty() {
                last.message_text()
            } else {
                format!("{} ({challenge})", last.message_text())
            };
            return Err(Error::rejected(last.code.as_u16(), message));
        }

        Err(reply.into_error())
    }

    /// Authenticates with the LOGIN challenge exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] if the server refuses either step.
    pub async fn auth_login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        let mut reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Login,
                initial_response: None,
            })
            .await?;

        for secret in [username, password] {
            if reply.code != ReplyCode::AUTH_CONTINUE {
                return Err(reply.into_error());
            }
            reply = self
                .send_command(&Command::AuthResponse(STANDARD.encode(secret)))
                .await?;
        }

        if reply.is_success() {
            tracing::debug!(mechanism = "LOGIN", "smtp authenticated");
            Ok(self.transition())
        } else {
            Err(reply.into_error())
        }
    }
}

impl Client<SmtpStream, Connected> {
    /// Upgrades the connection with STARTTLS, then repeats EHLO since the
    /// extension list may change once encrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, tls_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(&Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(reply.into_error());
        }

        // Bytes buffered before the handshake would be injected plaintext
        if !self.stream.buffer().is_empty() {
            return Err(Error::Protocol("unexpected data after STARTTLS".into()));
        }

        let upgraded = self.stream.into_inner().upgrade_to_tls(tls_hostname).await?;
        tracing::debug!(host = tls_hostname, "smtp upgraded to TLS");

        let client = Self {
            stream: BufReader::new(upgraded),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: std::collections::HashSet::new(),
            },
            client_hostname: String::new(),
            _state: PhantomData,
        };
        client.ehlo(&self.client_hostname).await
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs one mail transaction: MAIL FROM, one RCPT TO per recipient,
    /// then DATA with the dot-stuffed message.
    ///
    /// On any rejection the transaction is reset with RSET so the session
    /// stays usable for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] with the failing reply, or
    /// [`Error::MessageTooLarge`] before any command is sent.
    pub async fn send_mail(&mut self, from: &Address, recipients: &[Address], message: &[u8]) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::InvalidAddress("no recipients".into()));
        }
        if let Some(limit) = self.server_info.max_message_size()
            && limit > 0
            && message.len() > limit
        {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        match self.transaction(from, recipients, message).await {
            Ok(()) => Ok(()),
            Err(err @ Error::Rejected { .. }) => {
                if let Err(reset) = self.reset().await {
                    tracing::warn!(error = %reset, "RSET after failed transaction");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn transaction(&mut self, from: &Address, recipients: &[Address], message: &[u8]) -> Result<()> {
        let eight_bit = !message.is_ascii() && self.server_info.supports(&Extension::EightBitMime);
        let size = self.server_info.max_message_size().map(|_| message.len());

        self.expect_success(&Command::MailFrom {
            from: from.clone(),
            eight_bit,
            size,
        })
        .await?;

        for to in recipients {
            self.expect_success(&Command::RcptTo { to: to.clone() }).await?;
        }

        let reply = self.send_command(&Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply.into_error());
        }

        let stream = self.stream.get_mut();
        stream.write_all(&encode_data(message)).await?;
        stream.flush().await?;

        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        tracing::debug!(recipients = recipients.len(), bytes = message.len(), "smtp message accepted");
        Ok(())
    }

    /// Aborts the current transaction with RSET.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer 2xx.
    pub async fn reset(&mut self) -> Result<()> {
        self.expect_success(&Command::Rset).await.map(drop)
    }
}

/// Decodes the Base64 text of a 334 challenge, if any.
fn decode_challenge(reply: &Reply) -> String {
    STANDARD
        .decode(reply.message_text().trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const EHLO_REPLY: &[u8] = b"250-smtp.example.com Hello\r\n250-AUTH PLAIN LOGIN XOAUTH2\r\n250-SIZE 1000\r\n250 8BITMIME\r\n";

    fn greeted() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"220 smtp.example.com ESMTP ready\r\n")
            .write(b"EHLO client.local\r\n")
            .read(EHLO_REPLY);
        builder
    }

    #[tokio::test]
    async fn test_greeting_and_ehlo() {
        let mock = greeted().build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("client.local").await.unwrap();

        let info = client.server_info();
        assert_eq!(info.hostname, "smtp.example.com");
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(info.auth_mechanisms().contains(&AuthMechanism::XOAuth2));
        assert!(!info.supports_starttls());
    }

    #[tokio::test]
    async fn test_greeting_refused() {
        let mock = Builder::new().read(b"554 no service\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert_eq!(err.code(), Some(554));
    }

    #[tokio::test]
    async fn test_auth_plain_success() {
        let mock = greeted()
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Accepted\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("client.local").await.unwrap();
        client
            .auth(AuthMechanism::Plain, "AHVzZXIAcGFzcw==".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auth_xoauth2_challenge_then_failure() {
        let mock = greeted()
            .write(b"AUTH XOAUTH2 dG9rZW4=\r\n")
            .read(b"334 eyJzdGF0dXMiOiI0MDEifQ==\r\n")
            .write(b"\r\n")
            .read(b"535 5.7.8 Username and Password not accepted\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("client.local").await.unwrap();
        let err = client
            .auth(AuthMechanism::XOAuth2, "dG9rZW4=".to_string())
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(535));
        assert!(err.to_string().contains("{\"status\":\"401\"}"));
    }

    #[tokio::test]
    async fn test_auth_login() {
        let mock = greeted()
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("client.local").await.unwrap();
        client.auth_login("user", "pass").await.unwrap();
    }

    async fn authenticated(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, Authenticated> {
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("client.local").await.unwrap();
        client.auth(AuthMechanism::Plain, "eA==".to_string()).await.unwrap()
    }

    fn authed_script() -> Builder {
        let mut builder = greeted();
        builder.write(b"AUTH PLAIN eA==\r\n").read(b"235 ok\r\n");
        builder
    }

    #[tokio::test]
    async fn test_send_mail_multiple_recipients() {
        let mock = authed_script()
            .write(b"MAIL FROM:<me@example.com> SIZE=14\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<a@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: x\r\n\r\n..\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let mut client = authenticated(mock).await;
        let from = Address::new("me@example.com").unwrap();
        let to = [Address::new("a@example.com").unwrap(), Address::new("b@example.com").unwrap()];
        client.send_mail(&from, &to, b"Subject: x\n\n.\n").await.unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_mail_rejected_recipient_resets() {
        let mock = authed_script()
            .write(b"MAIL FROM:<me@example.com> SIZE=1\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 5.1.1 no such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 reset\r\n")
            .build();

        let mut client = authenticated(mock).await;
        let from = Address::new("me@example.com").unwrap();
        let to = [Address::new("nobody@example.com").unwrap()];
        let err = client.send_mail(&from, &to, b"x").await.unwrap_err();
        assert_eq!(err.code(), Some(550));
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_send_mail_too_large() {
        let mock = authed_script().build();
        let mut client = authenticated(mock).await;
        let from = Address::new("me@example.com").unwrap();
        let to = [Address::new("a@example.com").unwrap()];
        let err = client.send_mail(&from, &to, &[b'x'; 2000]).await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 2000, limit: 1000 }));
    }

    #[tokio::test]
    async fn test_send_mail_8bit() {
        let body = "Subject: é\r\n\r\n".as_bytes();
        let size = format!("MAIL FROM:<me@example.com> BODY=8BITMIME SIZE={}\r\n", body.len());
        let mock = authed_script()
            .write(size.as_bytes())
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<a@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write("Subject: é\r\n\r\n.\r\n".as_bytes())
            .read(b"250 ok\r\n")
            .build();

        let mut client = authenticated(mock).await;
        let from = Address::new("me@example.com").unwrap();
        let to = [Address::new("a@example.com").unwrap()];
        client.send_mail(&from, &to, body).await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let mock = Builder::new().read(b"220 hi\r\n").write(b"NOOP\r\n").build();
        let mut client = Client::from_stream(mock).await.unwrap();
        assert!(matches!(client.noop().await, Err(Error::ConnectionClosed)));
    }
}
