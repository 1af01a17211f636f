//! Type-state IMAP client connection.
//!
//! Uses the type-state pattern to enforce valid state transitions at compile time.
//! The IMAP connection states are:
//!
//! - `NotAuthenticated`: Initial state after connection
//! - `Authenticated`: After successful LOGIN/AUTHENTICATE
//! - `Selected`: After successful SELECT
//!
//! Each state only exposes methods that are valid for that state.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

pub use self::authenticated::SelectRejected;
pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ListResponse, ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Longest prefix of a server response written to trace logs.
const TRACE_PREVIEW: usize = 256;

/// IMAP client connection with type-state.
///
/// The type parameter `State` tracks the connection state at compile time.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

// Manual Debug implementation since FramedStream doesn't implement Debug
impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A command the server completed with OK.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    /// Untagged data received while the command ran.
    pub untagged: Vec<UntaggedResponse>,
    /// Response code of the tagged OK.
    pub code: Option<ResponseCode>,
}

enum Step {
    Continuation(Option<String>),
    Done {
        status: Status,
        code: Option<ResponseCode>,
        text: String,
    },
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server advertises `AUTH=<mechanism>`.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, Capability::Auth(m) if m.eq_ignore_ascii_case(mechanism)))
    }

    /// Sets the per-response read timeout.
    pub const fn set_io_timeout(&mut self, io_timeout: Option<Duration>) {
        self.stream.set_io_timeout(io_timeout);
    }

    /// Sends CAPABILITY and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        let completion = self.run_command(&Command::Capability).await?;
        self.absorb_capabilities(&completion);
        Ok(self.capabilities.clone())
    }

    /// Sends NOOP, e.g. to keep the connection alive.
    pub async fn noop(&mut self) -> Result<()> {
        self.run_command(&Command::Noop).await?;
        Ok(())
    }

    /// Sends LOGOUT and shuts the connection down.
    pub async fn logout(mut self) -> Result<()> {
        match self.run_command(&Command::Logout).await {
            // Servers may close right after the untagged BYE
            Ok(_) | Err(Error::Bye(_)) => {}
            Err(e) => return Err(e),
        }
        debug!("logged out");
        self.stream.shutdown().await
    }

    pub(crate) fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    pub(crate) fn absorb_capabilities(&mut self, completion: &Completion) {
        for data in &completion.untagged {
            match data {
                UntaggedResponse::Capability(caps)
                | UntaggedResponse::Condition {
                    status: Status::Ok,
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                } => self.capabilities.clone_from(caps),
                _ => {}
            }
        }
        if let Some(ResponseCode::Capability(caps)) = &completion.code {
            self.capabilities.clone_from(caps);
        }
    }

    /// LIST is valid in both the authenticated and selected states.
    pub(crate) async fn run_list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let completion = self
            .run_command(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                UntaggedResponse::List(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// Runs a command to completion.
    pub(crate) async fn run_command(&mut self, command: &Command) -> Result<Completion> {
        self.execute(command, None).await
    }

    /// Runs a command to completion. `response` answers the first
    /// continuation request; any further ones get an empty line, which
    /// aborts a SASL exchange.
    pub(crate) async fn execute(
        &mut self,
        command: &Command,
        mut response: Option<&str>,
    ) -> Result<Completion> {
        let tag = self.tag_gen.next();
        if command.is_sensitive() {
            debug!(%tag, command = command.name(), "C: <credentials redacted>");
        } else {
            debug!(%tag, command = command.name(), "sending command");
        }

        let mut untagged = Vec::new();
        let parts = command.serialize_parts(tag.as_str());
        let Some((last, literals)) = parts.split_last() else {
            return Err(Error::InvalidState("empty command".to_string()));
        };

        for part in literals {
            self.stream.write_all(part).await?;
            match self.next_step(&tag, &mut untagged).await? {
                Step::Continuation(_) => {}
                Step::Done { status, code, text } => {
                    return Self::complete(status, code, text, untagged, None);
                }
            }
        }
        self.stream.write_all(last).await?;

        let mut challenge = None;
        loop {
            match self.next_step(&tag, &mut untagged).await? {
                Step::Continuation(text) => {
                    let reply = response.take().unwrap_or_default();
                    if reply.is_empty() {
                        debug!(%tag, "answering server challenge with an empty response");
                        challenge = text;
                    }
                    let mut line = reply.as_bytes().to_vec();
                    line.extend_from_slice(b"\r\n");
                    self.stream.write_all(&line).await?;
                }
                Step::Done { status, code, text } => {
                    debug!(%tag, ?status, "command completed");
                    return Self::complete(status, code, text, untagged, challenge);
                }
            }
        }
    }

    /// Reads responses until a continuation request or the tagged
    /// completion for `tag`, collecting untagged data on the way.
    async fn next_step(&mut self, tag: &Tag, untagged: &mut Vec<UntaggedResponse>) -> Result<Step> {
        loop {
            let raw = match self.stream.read_response().await {
                Ok(raw) => raw,
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // A BYE explains the closed connection better than EOF
                    let bye = untagged.iter().rev().find_map(|data| match data {
                        UntaggedResponse::Condition {
                            status: Status::Bye,
                            text,
                            ..
                        } => Some(text.clone()),
                        _ => None,
                    });
                    return Err(bye.map_or(Error::Io(e), Error::Bye));
                }
                Err(e) => return Err(e),
            };

            let preview = &raw[..raw.len().min(TRACE_PREVIEW)];
            trace!(response = %String::from_utf8_lossy(preview).trim_end(), "S:");

            match ResponseParser::parse(&raw) {
                Ok(Response::Untagged(data)) => untagged.push(data),
                Ok(Response::Continuation { text }) => return Ok(Step::Continuation(text)),
                Ok(Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                }) => {
                    if got == *tag {
                        return Ok(Step::Done { status, code, text });
                    }
                    warn!(tag = %got, "ignoring completion for unknown tag");
                }
                Err(e) => {
                    if tag.begins(&raw) {
                        return Err(e);
                    }
                    warn!(error = %e, "skipping unparseable response");
                }
            }
        }
    }

    fn complete(
        status: Status,
        code: Option<ResponseCode>,
        text: String,
        untagged: Vec<UntaggedResponse>,
        challenge: Option<String>,
    ) -> Result<Completion> {
        match status {
            Status::Ok | Status::PreAuth => Ok(Completion { untagged, code }),
            Status::No => Err(Error::No {
                code,
                text: with_challenge(text, challenge.as_deref()),
            }),
            Status::Bad => Err(Error::Bad(with_challenge(text, challenge.as_deref()))),
            Status::Bye => Err(Error::Bye(text)),
        }
    }
}

/// Appends a decoded SASL challenge (XOAUTH2 sends its error details
/// there) to the server's failure text.
fn with_challenge(text: String, challenge: Option<&str>) -> String {
    let Some(challenge) = challenge.filter(|c| !c.is_empty()) else {
        return text;
    };
    let decoded = STANDARD
        .decode(challenge)
        .map_or_else(|_| challenge.to_string(), |bytes| String::from_utf8_lossy(&bytes).into_owned());
    format!("{text} ({decoded})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    async fn client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, NotAuthenticated> {
        Client::from_stream(mock).await.unwrap()
    }

    #[tokio::test]
    async fn test_noop_collects_untagged() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"A0001 OK NOOP completed\r\n")
            .build();
        let mut client = client(mock).await;

        let completion = client.run_command(&Command::Noop).await.unwrap();
        assert_eq!(completion.untagged, vec![UntaggedResponse::Exists(3)]);
    }

    #[tokio::test]
    async fn test_capability_updates_state() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=XOAUTH2 SASL-IR\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = client(mock).await;

        let caps = client.capability().await.unwrap();
        assert_eq!(caps.len(), 3);
        assert!(client.supports_auth("xoauth2"));
        assert!(client.has_capability(&Capability::SaslIr));
    }

    #[tokio::test]
    async fn test_bad_completion() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"A0001 BAD unknown command\r\n")
            .build();
        let mut client = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Bad(ref text) if text == "unknown command"));
        assert!(err.is_command_failure());
    }

    #[tokio::test]
    async fn test_unparseable_untagged_is_skipped() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* 0 FETCH (UID 1)\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut client = client(mock).await;

        let completion = client.run_command(&Command::Noop).await.unwrap();
        assert!(completion.untagged.is_empty());
    }

    #[tokio::test]
    async fn test_bye_then_close() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 NOOP\r\n")
            .read(b"* BYE idle for too long\r\n")
            .build();
        let mut client = client(mock).await;

        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref text) if text == "idle for too long"));
    }

    #[tokio::test]
    async fn test_logout_accepts_bye() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0001 OK LOGOUT completed\r\n")
            .build();
        let client = client(mock).await;
        client.logout().await.unwrap();
    }

    #[test]
    fn test_with_challenge() {
        assert_eq!(with_challenge("failed".to_string(), None), "failed");
        assert_eq!(
            with_challenge("failed".to_string(), Some("eyJzdGF0dXMiOiI0MDAifQ==")),
            "failed ({\"status\":\"400\"})"
        );
        assert_eq!(with_challenge("failed".to_string(), Some("not base64!")), "failed (not base64!)");
    }
}
