//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::states::{Authenticated, Selected};
use super::{Client, Completion};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{ListResponse, Mailbox, MailboxStatus, ResponseCode, Status};
use crate::{Error, Result};

/// A SELECT that did not succeed. Per RFC 3501 no mailbox is selected
/// afterwards, so the session comes back in the authenticated state.
pub struct SelectRejected<S> {
    /// The session, usable again unless `error` is fatal.
    pub client: Client<S, Authenticated>,
    /// Why SELECT failed.
    pub error: Error,
}

impl<S> std::fmt::Debug for SelectRejected<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectRejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<S> std::fmt::Display for SelectRejected<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SELECT failed: {}", self.error)
    }
}

impl<S> std::error::Error for SelectRejected<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S> SelectRejected<S> {
    /// Returns true if the server refused the mailbox (NO or BAD) and the
    /// session is still usable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.error.is_command_failure()
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.run_list(reference, pattern).await
    }

    /// Selects a mailbox for read-write access.
    ///
    /// Consumes self. On failure the session is handed back inside
    /// [`SelectRejected`].
    pub async fn select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<Client<S, Selected>, SelectRejected<S>> {
        let mailbox = Mailbox::new(mailbox);
        let command = Command::Select {
            mailbox: mailbox.clone(),
        };

        match self.run_command(&command).await {
            Ok(completion) => {
                let status = mailbox_status(&completion);
                debug!(%mailbox, exists = status.exists, read_only = status.read_only, "mailbox selected");
                Ok(self.into_state(Selected { mailbox, status }))
            }
            Err(error) => Err(SelectRejected {
                client: self,
                error,
            }),
        }
    }
}

/// Builds the mailbox status from a SELECT completion.
pub(super) fn mailbox_status(completion: &Completion) -> MailboxStatus {
    let mut status = MailboxStatus {
        read_only: matches!(completion.code, Some(ResponseCode::ReadOnly)),
        ..MailboxStatus::default()
    };

    for data in &completion.untagged {
        match data {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Recent(n) => status.recent = *n,
            UntaggedResponse::Flags(flags) => status.flags = flags.clone(),
            UntaggedResponse::Condition {
                status: Status::Ok,
                code: Some(code),
                ..
            } => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
                ResponseCode::UidNext(v) => status.uid_next = Some(*v),
                ResponseCode::Unseen(v) => status.unseen = Some(*v),
                _ => {}
            },
            _ => {}
        }
    }

    status
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;

    async fn authenticated(mock: Mock) -> Client<Mock, Authenticated> {
        Client::from_stream(mock)
            .await
            .unwrap()
            .login("user", "pass")
            .await
            .unwrap()
    }

    fn builder() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user pass\r\n")
            .read(b"A0001 OK done\r\n");
        builder
    }

    #[tokio::test]
    async fn test_list() {
        let mock = builder()
            .write(b"A0002 LIST \"\" \"*\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Items\"\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();
        let mut client = authenticated(mock).await;

        let names: Vec<_> = client
            .list("", "*")
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.mailbox.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["INBOX", "Sent Items"]);
    }

    #[tokio::test]
    async fn test_select_status() {
        let mock = builder()
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 172 EXISTS\r\n")
            .read(b"* 1 RECENT\r\n")
            .read(b"* OK [UNSEEN 12] Message 12 is first unseen\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let client = authenticated(mock).await;

        let client = client.select("inbox").await.unwrap();
        let status = client.state.status();
        assert_eq!(client.state.mailbox(), &Mailbox::inbox());
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.unseen.unwrap().get(), 12);
        assert_eq!(status.uid_validity.unwrap().get(), 3_857_529_045);
        assert_eq!(status.uid_next.unwrap().get(), 4392);
        assert_eq!(status.flags.len(), 5);
        assert!(!status.read_only);
    }

    #[tokio::test]
    async fn test_select_rejected_hands_back_session() {
        let mock = builder()
            .write(b"A0002 SELECT Nope\r\n")
            .read(b"A0002 NO [NONEXISTENT] Mailbox doesn't exist\r\n")
            .write(b"A0003 NOOP\r\n")
            .read(b"A0003 OK NOOP completed\r\n")
            .build();
        let client = authenticated(mock).await;

        let rejected = client.select("Nope").await.unwrap_err();
        assert!(rejected.is_recoverable());
        assert!(matches!(
            rejected.error,
            Error::No {
                code: Some(ResponseCode::NonExistent),
                ..
            }
        ));

        let mut client = rejected.client;
        client.noop().await.unwrap();
    }
}
