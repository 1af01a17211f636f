//! Implementation for the not-authenticated state.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::ImapStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it carries.
    pub async fn from_stream(stream: S) -> Result<Self> {
        Self::from_stream_with_timeout(stream, None).await
    }

    /// Like [`Client::from_stream`], with every server response bounded by
    /// `io_timeout`.
    pub async fn from_stream_with_timeout(stream: S, io_timeout: Option<Duration>) -> Result<Self> {
        let mut framed = FramedStream::new(stream, io_timeout);

        let greeting = framed.read_response().await?;
        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Ok | Status::PreAuth,
                code,
                text,
            }) => {
                debug!(greeting = %text, "connected to IMAP server");
                match code {
                    Some(ResponseCode::Capability(caps)) => caps,
                    _ => Vec::new(),
                }
            }
            Response::Untagged(UntaggedResponse::Condition {
                status: Status::Bye,
                text,
                ..
            }) => {
                return Err(Error::Bye(text));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// Consumes self and returns an authenticated client on success.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::InvalidState(
                "server disabled LOGIN on this connection".to_string(),
            ));
        }

        let completion = self
            .run_command(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        self.absorb_capabilities(&completion);

        debug!("authenticated with LOGIN");
        Ok(self.into_state(Authenticated))
    }

    /// Authenticates with a SASL mechanism whose client message is known
    /// up front (PLAIN, XOAUTH2, OAUTHBEARER). `initial_response` is the
    /// base64 client message.
    ///
    /// The response goes inline when the server supports SASL-IR and after
    /// the first continuation otherwise. A later challenge (XOAUTH2 error
    /// details) is answered with an empty line and its decoded text lands
    /// in the resulting error.
    pub async fn authenticate(
        mut self,
        mechanism: &str,
        initial_response: &str,
    ) -> Result<Client<S, Authenticated>> {
        let inline = self.has_capability(&Capability::SaslIr);
        let command = Command::Authenticate {
            mechanism: mechanism.to_string(),
            initial_response: inline.then(|| initial_response.to_string()),
        };
        let deferred = (!inline).then_some(initial_response);

        let completion = self.execute(&command, deferred).await?;
        self.absorb_capabilities(&completion);

        debug!(mechanism, "authenticated with AUTHENTICATE");
        Ok(self.into_state(Authenticated))
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Upgrades the connection with STARTTLS and refreshes capabilities,
    /// which servers may change once TLS is up.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.capabilities.is_empty() {
            self.capability().await?;
        }
        if !self.has_capability(&Capability::StartTls) {
            return Err(Error::InvalidState(
                "server does not advertise STARTTLS".to_string(),
            ));
        }

        self.run_command(&Command::StartTls).await?;
        if self.stream.has_buffered_data() {
            return Err(Error::Protocol(
                "server sent data before the TLS handshake".to_string(),
            ));
        }

        let io_timeout = self.stream.io_timeout();
        let upgrade = self.stream.into_inner().upgrade_to_tls(host);
        let stream = match io_timeout {
            Some(limit) => tokio::time::timeout(limit, upgrade)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => upgrade.await?,
        };
        debug!("TLS established after STARTTLS");

        let mut client = Self {
            stream: FramedStream::new(stream, io_timeout),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.capability().await?;
        Ok(client)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_greeting_with_capabilities() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] Dovecot ready.\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.has_capability(&Capability::StartTls));
        assert!(client.has_capability(&Capability::LoginDisabled));
    }

    #[tokio::test]
    async fn test_greeting_bye() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref text) if text == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_disabled() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LOGINDISABLED] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "pass").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_login_updates_capabilities() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user \"p w\"\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 LITERAL+] Logged in\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "p w").await.unwrap();
        assert!(client.has_capability(&Capability::LiteralPlus));
    }

    #[tokio::test]
    async fn test_login_with_literal_waits_for_continuation() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user {3}\r\n")
            .read(b"+ go ahead\r\n")
            .write("pä\r\n".as_bytes())
            .read(b"A0001 OK Logged in\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        client.login("user", "pä").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            Error::No {
                code: Some(ResponseCode::AuthenticationFailed),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_authenticate_inline_with_error_challenge() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 SASL-IR AUTH=XOAUTH2] ready\r\n")
            .write(b"A0001 AUTHENTICATE XOAUTH2 dG9rZW4=\r\n")
            .read(b"+ eyJzdGF0dXMiOiI0MDAifQ==\r\n")
            .write(b"\r\n")
            .read(b"A0001 NO SASL authentication failed\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.authenticate("XOAUTH2", "dG9rZW4=").await.unwrap_err();
        match err {
            Error::No { text, .. } => {
                assert_eq!(text, "SASL authentication failed ({\"status\":\"400\"})");
            }
            other => panic!("expected NO, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_authenticate_without_sasl_ir() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(b"AHVzZXIAcGFzcw==\r\n")
            .read(b"A0001 OK authenticated\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        client.authenticate("PLAIN", "AHVzZXIAcGFzcw==").await.unwrap();
    }
}
