//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::authenticated::SelectRejected;
use super::states::{Authenticated, Selected};
use super::{Client, Completion};
use crate::Result;
use crate::command::{Command, FetchAttribute, SearchCriteria};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{ListResponse, Mailbox, MailboxStatus, SeqNum, SequenceSet};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        self.state.mailbox()
    }

    /// Returns the status of the selected mailbox.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        self.run_list(reference, pattern).await
    }

    /// Searches for messages matching the criteria. Returns sequence
    /// numbers in the order the server sent them.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<SeqNum>> {
        let completion = self
            .run_command(&Command::Search {
                criteria: criteria.clone(),
            })
            .await?;
        self.track(&completion);

        let ids: Vec<SeqNum> = completion
            .untagged
            .into_iter()
            .filter_map(|data| match data {
                UntaggedResponse::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect();
        debug!(matches = ids.len(), "search completed");
        Ok(ids)
    }

    /// Fetches message data for the given sequence set.
    ///
    /// Returns one entry per message, in server order. Items a server
    /// splits over several FETCH responses for the same message are merged.
    pub async fn fetch(
        &mut self,
        sequence: &SequenceSet,
        items: &[FetchAttribute],
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let completion = self
            .run_command(&Command::Fetch {
                sequence: sequence.clone(),
                items: items.to_vec(),
            })
            .await?;
        self.track(&completion);

        let mut results: Vec<(SeqNum, Vec<FetchItem>)> = Vec::new();
        for data in completion.untagged {
            if let UntaggedResponse::Fetch { seq, items } = data {
                match results.iter_mut().find(|(s, _)| *s == seq) {
                    Some((_, existing)) => existing.extend(items),
                    None => results.push((seq, items)),
                }
            }
        }
        Ok(results)
    }

    /// Selects a different mailbox.
    pub async fn select(
        self,
        mailbox: &str,
    ) -> std::result::Result<Self, SelectRejected<S>> {
        self.into_state(Authenticated).select(mailbox).await
    }

    /// Closes the mailbox and returns to the authenticated state.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.run_command(&Command::Close).await?;
        debug!(mailbox = %self.state.mailbox, "mailbox closed");
        Ok(self.into_state(Authenticated))
    }

    /// Applies mailbox size updates that arrived with a response.
    fn track(&mut self, completion: &Completion) {
        let status = &mut self.state.status;
        for data in &completion.untagged {
            match data {
                UntaggedResponse::Exists(n) => status.exists = *n,
                UntaggedResponse::Recent(n) => status.recent = *n,
                UntaggedResponse::Expunge(_) => status.exists = status.exists.saturating_sub(1),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::types::Flag;

    async fn selected(mock: Mock) -> Client<Mock, Selected> {
        Client::from_stream(mock)
            .await
            .unwrap()
            .login("user", "pass")
            .await
            .unwrap()
            .select("INBOX")
            .await
            .unwrap()
    }

    fn builder() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN user pass\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 2 EXISTS\r\n")
            .read(b"A0002 OK [READ-WRITE] done\r\n");
        builder
    }

    #[tokio::test]
    async fn test_search_tracks_exists() {
        let mock = builder()
            .write(b"A0003 SEARCH UNSEEN\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"* SEARCH 2 3\r\n")
            .read(b"A0003 OK SEARCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let ids = client.search(&SearchCriteria::Unseen).await.unwrap();
        assert_eq!(ids.iter().map(|s| s.get()).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(client.status().exists, 3);
    }

    #[tokio::test]
    async fn test_fetch_merges_split_responses() {
        let mock = builder()
            .write(b"A0003 FETCH 2 (FLAGS BODY.PEEK[])\r\n")
            .read(b"* 2 FETCH (BODY[] {4}\r\nabcd)\r\n")
            .read(b"* 2 FETCH (FLAGS (\\Seen))\r\n")
            .read(b"A0003 OK FETCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let results = client
            .fetch(
                &SequenceSet::single(2).unwrap(),
                &[FetchAttribute::Flags, FetchAttribute::full_body(true)],
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let (seq, items) = &results[0];
        assert_eq!(seq.get(), 2);
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| matches!(i, FetchItem::Flags(f) if f.contains(&Flag::Seen))));
    }

    #[tokio::test]
    async fn test_select_other_then_close() {
        let mock = builder()
            .write(b"A0003 SELECT Archive\r\n")
            .read(b"* 10 EXISTS\r\n")
            .read(b"A0003 OK [READ-ONLY] done\r\n")
            .write(b"A0004 CLOSE\r\n")
            .read(b"A0004 OK CLOSE completed\r\n")
            .build();
        let client = selected(mock).await;

        let client = client.select("Archive").await.unwrap();
        assert_eq!(client.mailbox().as_str(), "Archive");
        assert_eq!(client.status().exists, 10);
        assert!(client.status().read_only);

        client.close().await.unwrap();
    }
}
