//! Blocking wrappers around [`crate::Sender`] and [`crate::Reader`].
//!
//! Each wrapper owns a current-thread tokio runtime and blocks the calling
//! thread for every operation. Dropping a connected wrapper sends QUIT or
//! LOGOUT. Do not use these from inside an async context; the runtime
//! refuses to block there.

use ezmail_imap::ImapStream;
use ezmail_smtp::SmtpStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::runtime::Runtime;

use crate::composer::Email;
use crate::config::{ReaderConfig, SenderConfig};
use crate::credentials::Credentials;
use crate::filters::FetchFilters;
use crate::mail::FetchedMail;
use crate::reader::MessageStream;
use crate::sender::{Recipients, SendReport};
use crate::Result;

fn runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

/// Blocking [`crate::Sender`].
///
/// ```no_run
/// use ezmail::blocking::Sender;
/// use ezmail::{Composer, Credentials, SenderConfig, ServerConfig};
///
/// let config = SenderConfig::new(ServerConfig::new("smtp.example.com", 465));
/// let mut sender = Sender::new(config, Credentials::password("me@example.com", "secret"))?;
/// sender.connect()?;
/// let email = Composer::new().subject("Hi").add_plain_text("Hello").finish()?;
/// sender.send(&email, "you@example.com")?;
/// # Ok::<(), ezmail::Error>(())
/// ```
#[derive(Debug)]
pub struct Sender<S = SmtpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    runtime: Runtime,
    inner: crate::Sender<S>,
}

impl<S> Sender<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a sender and its runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the runtime cannot start.
    pub fn new(config: SenderConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: crate::Sender::new(config, credentials),
        })
    }

    /// See [`crate::Sender::connect_with_stream`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn connect_with_stream(&mut self, stream: S) -> Result<()> {
        self.runtime.block_on(self.inner.connect_with_stream(stream))
    }

    /// See [`crate::Sender::send`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn send(&mut self, email: &Email, recipients: impl Into<Recipients>) -> Result<()> {
        self.runtime.block_on(self.inner.send(email, recipients))
    }

    /// See [`crate::Sender::send_individually`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn send_individually(&mut self, email: &Email, recipients: impl Into<Recipients>) -> Result<SendReport> {
        self.runtime.block_on(self.inner.send_individually(email, recipients))
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Sends left in the current hour, or `None` without a cap.
    #[must_use]
    pub fn remaining_quota(&mut self) -> Option<u32> {
        self.inner.remaining_quota()
    }

    /// Sends QUIT and drops the session.
    pub fn disconnect(&mut self) {
        self.runtime.block_on(self.inner.disconnect());
    }
}

impl Sender<SmtpStream> {
    /// See [`crate::Sender::connect`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn connect(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.connect())
    }
}

impl<S> Drop for Sender<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn drop(&mut self) {
        if self.inner.is_connected() {
            self.disconnect();
        }
    }
}

/// Blocking [`crate::Reader`].
#[derive(Debug)]
pub struct Reader<S = ImapStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    runtime: Runtime,
    inner: crate::Reader<S>,
}

impl<S> Reader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a reader and its runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Io`](crate::Error::Io) if the runtime cannot start.
    pub fn new(config: ReaderConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            runtime: runtime()?,
            inner: crate::Reader::new(config, credentials),
        })
    }

    /// See [`crate::Reader::connect_with_stream`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn connect_with_stream(&mut self, stream: S) -> Result<()> {
        self.runtime.block_on(self.inner.connect_with_stream(stream))
    }

    /// Whether a session is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// See [`crate::Reader::list_mailboxes`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        self.runtime.block_on(self.inner.list_mailboxes())
    }

    /// See [`crate::Reader::select_mailbox`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn select_mailbox(&mut self, name: &str) -> Result<u32> {
        self.runtime.block_on(self.inner.select_mailbox(name))
    }

    /// Searches and returns an iterator that fetches one message per step.
    ///
    /// # Errors
    ///
    /// As [`crate::Reader::fetch_messages`].
    pub fn fetch_messages(&mut self, filters: &FetchFilters) -> Result<MessageIter<'_, S>> {
        let stream = self.runtime.block_on(self.inner.fetch_messages(filters))?;
        Ok(MessageIter {
            runtime: &self.runtime,
            stream,
        })
    }

    /// See [`crate::Reader::fetch_unread`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn fetch_unread(&mut self, limit: Option<usize>) -> Result<Vec<FetchedMail>> {
        self.runtime.block_on(self.inner.fetch_unread(limit))
    }

    /// Closes the mailbox and logs out.
    pub fn disconnect(&mut self) {
        self.runtime.block_on(self.inner.disconnect());
    }
}

impl Reader<ImapStream> {
    /// See [`crate::Reader::connect`].
    ///
    /// # Errors
    ///
    /// As the async version.
    pub fn connect(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.connect())
    }
}

impl<S> Drop for Reader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn drop(&mut self) {
        if self.inner.is_connected() {
            self.disconnect();
        }
    }
}

/// Iterator over fetched messages. Each step blocks on one FETCH.
#[derive(Debug)]
pub struct MessageIter<'a, S> {
    runtime: &'a Runtime,
    stream: MessageStream<'a, S>,
}

impl<S> Iterator for MessageIter<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<FetchedMail>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.stream.remaining();
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::{Composer, Error};
    use tokio_test::io::{Builder, Mock};

    #[test]
    fn test_sender_quits_on_drop() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-smtp.example.com\r\n250 AUTH PLAIN\r\n")
            .write(b"AUTH PLAIN AHVAZXhhbXBsZS5jb20AcA==\r\n")
            .read(b"235 ok\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let config = SenderConfig::new(ServerConfig::new("smtp.example.com", 587)).with_max_emails_per_hour(0);
        let mut sender: Sender<Mock> = Sender::new(config, Credentials::password("u@example.com", "p")).unwrap();
        sender.connect_with_stream(mock).unwrap();

        let email = Composer::new().add_text("x").finish().unwrap();
        assert!(matches!(sender.send(&email, "to@example.com"), Err(Error::RateLimitExceeded { .. })));
        drop(sender);
    }

    #[test]
    fn test_reader_iterates() {
        let message = b"From: a@example.com\r\nSubject: One\r\n\r\nbody\r\n";
        let mut fetch = format!("* 1 FETCH (UID 7 BODY[] {{{}}}\r\n", message.len()).into_bytes();
        fetch.extend_from_slice(message);
        fetch.extend_from_slice(b")\r\n");

        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u@example.com p\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"A0002 OK done\r\n")
            .write(b"A0003 SEARCH UNSEEN\r\n")
            .read(b"* SEARCH 1\r\nA0003 OK done\r\n")
            .write(b"A0004 FETCH 1 (FLAGS UID INTERNALDATE BODY.PEEK[])\r\n")
            .read(&fetch)
            .read(b"A0004 OK done\r\n")
            .write(b"A0005 CLOSE\r\n")
            .read(b"A0005 OK done\r\n")
            .write(b"A0006 LOGOUT\r\n")
            .read(b"A0006 OK done\r\n")
            .build();

        let config = ReaderConfig::new(ServerConfig::new("imap.example.com", 993));
        let mut reader: Reader<Mock> = Reader::new(config, Credentials::password("u@example.com", "p")).unwrap();
        reader.connect_with_stream(mock).unwrap();

        let filters = FetchFilters::new().status(crate::StatusFilter::Unseen);
        let iter = reader.fetch_messages(&filters).unwrap();
        assert_eq!(iter.size_hint(), (1, Some(1)));
        let mails: Vec<FetchedMail> = iter.collect::<Result<_>>().unwrap();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].uid, Some(7));
        assert_eq!(mails[0].subject, "One");
        reader.disconnect();
        assert!(!reader.is_connected());
    }
}
